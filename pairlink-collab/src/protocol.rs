//! JSON wire protocol for the realtime room channel.
//!
//! Every frame is a UTF-8 text frame holding one JSON object whose `type`
//! field selects the variant:
//! ```text
//! {"type":"sync","code":"print(1)","users":["ada_x1","bob_k9"]}
//! {"type":"code_change","code":"print(12)","user_id":"bob_k9"}
//! {"type":"cursor_position","position":7,"user_id":"bob_k9"}
//! {"type":"user_joined","user_id":"eve_q2","users":["ada_x1","bob_k9","eve_q2"]}
//! {"type":"user_left","user_id":"bob_k9"}
//! ```
//!
//! Synchronization is full-text broadcast: a `code_change` carries the whole
//! document, never a diff. The tag decides which optional fields matter; a
//! field that is absent is reported as `None` and the receiver decides
//! whether that is a no-op for the variant.

use serde::{Deserialize, Serialize};

use crate::error::CollabError;

/// A single message on the room channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelMessage {
    /// Initial room state, sent by the server right after the channel opens.
    Sync {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        users: Option<Vec<String>>,
    },
    /// Full-text replacement of the shared buffer.
    CodeChange {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    /// A peer's caret offset (in characters).
    CursorPosition {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    /// A peer joined; `users` is the complete membership after the join.
    UserJoined {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        users: Option<Vec<String>>,
    },
    /// A peer left the room.
    UserLeft {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        users: Option<Vec<String>>,
    },
}

impl ChannelMessage {
    /// Outbound full-text edit.
    pub fn code_change(code: impl Into<String>) -> Self {
        Self::CodeChange {
            code: Some(code.into()),
            user_id: None,
        }
    }

    /// Outbound caret update.
    pub fn cursor_position(position: usize) -> Self {
        Self::CursorPosition {
            position: Some(position),
            user_id: None,
        }
    }

    /// The wire tag of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sync { .. } => "sync",
            Self::CodeChange { .. } => "code_change",
            Self::CursorPosition { .. } => "cursor_position",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, CollabError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON text frame.
    pub fn decode(text: &str) -> Result<Self, CollabError> {
        Ok(serde_json::from_str(text)?)
    }
}
