//! Per-editor session identity.
//!
//! A [`Session`] is built once when the editor mounts and handed to the
//! channel client and the document controller. Nothing in this crate reads
//! identity from ambient storage.

use uuid::Uuid;

/// Separator between the display name and the random suffix of a user id.
pub const USER_ID_SEPARATOR: char = '_';

/// Length of the random user id suffix.
const SUFFIX_LEN: usize = 11;

/// Immutable identity of one connected editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    room_id: String,
    user_id: String,
}

impl Session {
    /// Create a session with a fresh user id of the form `name_suffix`.
    pub fn new(room_id: impl Into<String>, display_name: &str) -> Self {
        let suffix: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(SUFFIX_LEN)
            .collect();
        Self {
            room_id: room_id.into(),
            user_id: format!("{display_name}{USER_ID_SEPARATOR}{suffix}"),
        }
    }

    /// Create with an explicit user id (for reconnecting or testing).
    pub fn from_parts(room_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Display name derived from the user id.
    pub fn display_name(&self) -> &str {
        display_name_of(&self.user_id)
    }

    /// Whether both identifiers are present.
    pub fn is_complete(&self) -> bool {
        !self.room_id.is_empty() && !self.user_id.is_empty()
    }
}

/// Prefix of a user id before the first separator.
pub fn display_name_of(user_id: &str) -> &str {
    user_id
        .split(USER_ID_SEPARATOR)
        .next()
        .unwrap_or(user_id)
}
