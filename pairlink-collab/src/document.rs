//! Document sync controller: the single writer of the shared buffer.
//!
//! ```text
//!  keystroke ──► apply_local_edit() ──► buffer ──► code_change ──► MessageSink
//!                                         ▲
//!  ChannelEvent::Message ──► apply_inbound() (sync / code_change /
//!                                             user_joined / user_left /
//!                                             cursor_position)
//! ```
//!
//! Consistency is last-writer-wins over full-text broadcast: every inbound
//! `code_change` replaces the buffer wholesale and no merge is attempted.
//! Replacing the buffer with identical text is a no-op, so an echo of our own
//! edit is harmless whatever its origin.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::client::ChannelHandle;
use crate::protocol::ChannelMessage;
use crate::session::Session;

/// Minimum interval between outbound caret updates (30 per second).
pub const CURSOR_PUBLISH_INTERVAL: Duration = Duration::from_millis(33);

/// Outbound side of the controller.
///
/// Implemented by [`ChannelHandle`]; a plain `mpsc` sender stands in for
/// the channel in tests and offline tools.
pub trait MessageSink {
    fn send(&self, message: ChannelMessage);
}

impl MessageSink for ChannelHandle {
    fn send(&self, message: ChannelMessage) {
        ChannelHandle::send(self, message);
    }
}

impl MessageSink for mpsc::UnboundedSender<ChannelMessage> {
    fn send(&self, message: ChannelMessage) {
        let _ = mpsc::UnboundedSender::send(self, message);
    }
}

/// What an inbound message changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncUpdate {
    pub text_changed: bool,
    pub members_changed: bool,
    pub carets_changed: bool,
}

impl SyncUpdate {
    pub fn is_empty(&self) -> bool {
        !(self.text_changed || self.members_changed || self.carets_changed)
    }
}

/// Local authoritative view of the room: buffer, membership and peer carets.
pub struct DocumentSync<S> {
    session: Session,
    text: String,
    /// Active user ids in server arrival order
    members: Vec<String>,
    /// Remote caret offsets by user id
    carets: HashMap<String, usize>,
    sink: S,
    last_cursor_publish: Option<Instant>,
    /// Latest caret offset held back by the throttle
    pending_cursor: Option<usize>,
    cursor_interval: Duration,
}

impl<S: MessageSink> DocumentSync<S> {
    pub fn new(session: Session, sink: S) -> Self {
        Self {
            session,
            text: String::new(),
            members: Vec::new(),
            carets: HashMap::new(),
            sink,
            last_cursor_publish: None,
            pending_cursor: None,
            cursor_interval: CURSOR_PUBLISH_INTERVAL,
        }
    }

    /// Create with a custom caret publish interval (for testing).
    pub fn with_cursor_interval(session: Session, sink: S, interval: Duration) -> Self {
        let mut doc = Self::new(session, sink);
        doc.cursor_interval = interval;
        doc
    }

    /// Apply one inbound message, in arrival order.
    pub fn apply_inbound(&mut self, message: &ChannelMessage) -> SyncUpdate {
        let mut update = SyncUpdate::default();
        match message {
            ChannelMessage::Sync { code, users } => {
                if let Some(code) = code {
                    update.text_changed = self.replace_text(code);
                }
                if let Some(users) = users {
                    (update.members_changed, update.carets_changed) = self.replace_members(users);
                }
            }
            ChannelMessage::CodeChange { code, .. } => {
                if let Some(code) = code {
                    update.text_changed = self.replace_text(code);
                }
            }
            ChannelMessage::UserJoined { users, .. } => {
                if let Some(users) = users {
                    (update.members_changed, update.carets_changed) = self.replace_members(users);
                }
            }
            ChannelMessage::UserLeft { user_id, .. } => {
                if let Some(user_id) = user_id {
                    let before = self.members.len();
                    self.members.retain(|member| member != user_id);
                    update.members_changed = self.members.len() != before;
                    update.carets_changed = self.carets.remove(user_id).is_some();
                }
            }
            ChannelMessage::CursorPosition { position, user_id } => {
                if let (Some(position), Some(user_id)) = (position, user_id) {
                    if user_id != self.session.user_id() {
                        let previous = self.carets.insert(user_id.clone(), *position);
                        update.carets_changed = previous != Some(*position);
                    }
                }
            }
        }
        update
    }

    /// Set the buffer from a local edit and broadcast the full text.
    ///
    /// Every call emits exactly one `code_change`; edits are never debounced.
    pub fn apply_local_edit(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.sink.send(ChannelMessage::code_change(self.text.clone()));
    }

    /// Broadcast the local caret offset, at most once per publish interval.
    ///
    /// Returns `false` if the update was throttled. A throttled offset is kept
    /// (latest wins) and sent by [`flush_cursor`](Self::flush_cursor) once
    /// [`cursor_flush_deadline`](Self::cursor_flush_deadline) has passed.
    pub fn publish_cursor(&mut self, position: usize) -> bool {
        if self.cursor_throttled() {
            self.pending_cursor = Some(position);
            return false;
        }
        self.send_cursor(position);
        true
    }

    /// When a held-back caret offset becomes due, if there is one.
    pub fn cursor_flush_deadline(&self) -> Option<Instant> {
        self.pending_cursor?;
        Some(
            self.last_cursor_publish
                .map_or_else(Instant::now, |last| last + self.cursor_interval),
        )
    }

    /// Send the held-back caret offset if the interval has passed.
    pub fn flush_cursor(&mut self) -> bool {
        let Some(position) = self.pending_cursor else {
            return false;
        };
        if self.cursor_throttled() {
            return false;
        }
        self.send_cursor(position);
        true
    }

    fn cursor_throttled(&self) -> bool {
        self.last_cursor_publish
            .is_some_and(|last| last.elapsed() < self.cursor_interval)
    }

    fn send_cursor(&mut self, position: usize) {
        self.pending_cursor = None;
        self.last_cursor_publish = Some(Instant::now());
        self.sink.send(ChannelMessage::cursor_position(position));
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn remote_carets(&self) -> &HashMap<String, usize> {
        &self.carets
    }

    pub fn caret_of(&self, user_id: &str) -> Option<usize> {
        self.carets.get(user_id).copied()
    }

    fn replace_text(&mut self, code: &str) -> bool {
        if self.text == code {
            return false;
        }
        self.text.clear();
        self.text.push_str(code);
        true
    }

    /// Returns (members changed, carets pruned).
    fn replace_members(&mut self, users: &[String]) -> (bool, bool) {
        let changed = self.members != users;
        self.members = users.to_vec();
        let before = self.carets.len();
        let members = &self.members;
        self.carets.retain(|user, _| members.contains(user));
        (changed, self.carets.len() != before)
    }
}
