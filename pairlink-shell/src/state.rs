//! Editor state: the caret plus the two coordinators it routes between.
//!
//! `EditorState` is the single owner of everything the terminal surface
//! mutates. Typed text and accepted suggestions re-enter through
//! `DocumentSync::apply_local_edit`; keys go to the completion popup first
//! and fall through to the surface only when it declines them.

use std::fmt::Write as _;

use pairlink_assist::{
    CompletionBackend, CompletionConfig, CompletionCoordinator, CompletionEvent, InputOutcome, Key,
    SurfaceGeometry,
};
use pairlink_collab::{
    display_name_of, ChannelEvent, ConnectionState, DocumentSync, MessageSink, Session,
};

/// Inserted by Tab when no popup is showing.
pub const INDENT: &str = "  ";

pub struct EditorState<S, B> {
    doc: DocumentSync<S>,
    completion: CompletionCoordinator<B>,
    /// Character offset into the buffer
    caret: usize,
    connection: ConnectionState,
    geometry: SurfaceGeometry,
}

impl<S: MessageSink, B: CompletionBackend> EditorState<S, B> {
    pub fn new(session: Session, sink: S, backend: B, config: CompletionConfig) -> Self {
        Self {
            doc: DocumentSync::new(session, sink),
            completion: CompletionCoordinator::new(backend, config),
            caret: 0,
            connection: ConnectionState::Connecting,
            geometry: SurfaceGeometry::default(),
        }
    }

    /// Type `text` at the caret and restart the completion debounce.
    pub fn type_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.insert_at_caret(text);
        self.completion.trigger(self.doc.text(), self.caret);
    }

    /// Offer a key to the popup, then to the surface. Returns `true` if consumed.
    pub fn handle_key(&mut self, key: Key) -> bool {
        match self.completion.handle_key(key) {
            InputOutcome::Selected(suggestion) => {
                self.insert_suggestion(&suggestion);
                true
            }
            InputOutcome::Handled => true,
            InputOutcome::NotHandled if key == Key::Tab => {
                self.insert_at_caret(INDENT);
                true
            }
            InputOutcome::NotHandled => false,
        }
    }

    /// A mouse press at viewport pixels.
    pub fn click(&mut self, x: f64, y: f64) -> bool {
        match self.completion.click(x, y) {
            InputOutcome::Selected(suggestion) => {
                self.insert_suggestion(&suggestion);
                true
            }
            InputOutcome::Handled => true,
            InputOutcome::NotHandled => false,
        }
    }

    /// Splice an accepted suggestion at the caret and move past it.
    pub fn insert_suggestion(&mut self, suggestion: &str) {
        self.insert_at_caret(suggestion);
    }

    pub fn move_caret(&mut self, offset: usize) {
        self.caret = offset.min(self.doc.text().chars().count());
        self.doc.publish_cursor(self.caret);
    }

    /// When a throttled caret update should be flushed to peers.
    pub fn cursor_flush_deadline(&self) -> Option<tokio::time::Instant> {
        self.doc.cursor_flush_deadline()
    }

    pub fn flush_cursor(&mut self) -> bool {
        self.doc.flush_cursor()
    }

    pub fn set_language(&mut self, language: &str) {
        self.completion.set_language(language);
    }

    /// Route one channel event. Returns `true` if anything visible changed.
    pub fn apply_channel_event(&mut self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::StateChanged(state) => {
                let changed = self.connection != state;
                self.connection = state;
                changed
            }
            ChannelEvent::Message(message) => {
                let update = self.doc.apply_inbound(&message);
                if update.text_changed {
                    self.caret = self.caret.min(self.doc.text().chars().count());
                }
                !update.is_empty()
            }
        }
    }

    pub async fn next_completion_event(&mut self) -> Option<CompletionEvent> {
        self.completion.next_event().await
    }

    /// Returns `true` if the popup changed.
    pub fn apply_completion_event(&mut self, event: CompletionEvent) -> bool {
        self.completion.handle_event(event, &self.geometry)
    }

    pub fn text(&self) -> &str {
        self.doc.text()
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn completion(&self) -> &CompletionCoordinator<B> {
        &self.completion
    }

    fn insert_at_caret(&mut self, inserted: &str) {
        let text = self.doc.text();
        let at = byte_offset(text, self.caret);
        let mut updated = String::with_capacity(text.len() + inserted.len());
        updated.push_str(&text[..at]);
        updated.push_str(inserted);
        updated.push_str(&text[at..]);

        self.caret += inserted.chars().count();
        self.doc.apply_local_edit(updated);
        self.doc.publish_cursor(self.caret);
    }

    /// Header, membership, buffer with the caret marked, and the popup.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let members: Vec<&str> = self
            .doc
            .members()
            .iter()
            .map(|id| display_name_of(id))
            .collect();
        let _ = writeln!(
            out,
            "── room {} · {} · {} ──",
            self.doc.session().room_id(),
            connection_label(self.connection),
            members.join(", ")
        );

        let text = self.doc.text();
        let at = byte_offset(text, self.caret);
        let _ = writeln!(out, "{}│{}", &text[..at], &text[at..]);

        let mut carets: Vec<(&str, usize)> = self
            .doc
            .remote_carets()
            .iter()
            .map(|(id, pos)| (display_name_of(id), *pos))
            .collect();
        carets.sort();
        for (name, pos) in carets {
            let _ = writeln!(out, "  {name} @ {pos}");
        }

        out.push_str(&self.render_popup());
        out
    }

    pub fn render_popup(&self) -> String {
        let popup = self.completion.popup();
        let mut out = String::new();
        if !popup.is_visible() {
            return out;
        }
        for (index, suggestion) in popup.suggestions().iter().enumerate() {
            let marker = if index == popup.selected_index() { '>' } else { ' ' };
            let _ = writeln!(out, " {marker} ⚡ {suggestion}");
        }
        out.push_str("   ↑↓ navigate · ↵ select · esc close\n");
        out
    }
}

fn connection_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connecting => "connecting",
        ConnectionState::Open => "connected",
        ConnectionState::ClosedRetrying => "reconnecting",
        ConnectionState::ClosedClean | ConnectionState::ClosedGivenUp => "disconnected",
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(at, _)| at)
}
