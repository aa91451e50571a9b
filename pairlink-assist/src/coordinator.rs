//! Completion coordinator: debounce, one request per firing, and the
//! popup selection state machine.
//!
//! ```text
//!            trigger()                  timer fires              reply (latest seq)
//!   Idle ───────────────► Debouncing ───────────────► Awaiting ─────────────────► Showing
//!    ▲                      │   ▲ trigger() restarts     │                          │
//!    │                      │   └────────────────────────┘                          │
//!    └──── empty/failed reply, Escape, selection, click outside ◄────────────────────┘
//! ```
//!
//! The coordinator is driven by its owner: `next_event()` yields timer and
//! reply events that are fed back through `handle_event()`, so all state is
//! mutated from a single task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AssistError;
use crate::popup::{place_popup, AutocompleteState, PopupHit, PopupMetrics, SurfaceGeometry};
use crate::request::{CompletionBackend, CompletionRequest};

/// Quiet period before a completion request is issued.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(600);

/// Language sent when none has been chosen.
pub const DEFAULT_LANGUAGE: &str = "python";

/// Coordinator settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub debounce: Duration,
    pub language: String,
    pub metrics: PopupMetrics,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            language: DEFAULT_LANGUAGE.to_string(),
            metrics: PopupMetrics::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Debouncing,
    AwaitingResponse,
    Showing,
}

/// Keys the popup may intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    Tab,
    Enter,
    Escape,
    Other,
}

/// Result of offering a key or click to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// Not intercepted; the editing surface handles it.
    NotHandled,
    Handled,
    /// A suggestion was chosen; the popup is already hidden.
    Selected(String),
}

/// Timer and reply events, produced by background tasks.
#[derive(Debug)]
pub enum CompletionEvent {
    Fired {
        seq: u64,
    },
    Reply {
        seq: u64,
        result: Result<Vec<String>, AssistError>,
    },
}

struct Snapshot {
    code: String,
    cursor: usize,
}

pub struct CompletionCoordinator<B> {
    backend: Arc<B>,
    config: CompletionConfig,
    phase: Phase,
    popup: AutocompleteState,
    /// Latest debounce generation; replies for any other value are stale
    seq: u64,
    snapshot: Option<Snapshot>,
    timer: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<CompletionEvent>,
    events_rx: mpsc::UnboundedReceiver<CompletionEvent>,
}

impl<B: CompletionBackend> CompletionCoordinator<B> {
    pub fn new(backend: B, config: CompletionConfig) -> Self {
        Self::with_shared_backend(Arc::new(backend), config)
    }

    pub fn with_shared_backend(backend: Arc<B>, config: CompletionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            config,
            phase: Phase::Idle,
            popup: AutocompleteState::hidden(),
            seq: 0,
            snapshot: None,
            timer: None,
            events_tx,
            events_rx,
        }
    }

    /// Restart the debounce for a new text/caret snapshot.
    ///
    /// Cancels the pending timer and hides the popup at once. Must be called
    /// inside a tokio runtime.
    pub fn trigger(&mut self, code: &str, cursor: usize) {
        self.cancel_timer();
        self.popup.hide();

        self.seq += 1;
        self.snapshot = Some(Snapshot {
            code: code.to_string(),
            cursor,
        });
        self.phase = Phase::Debouncing;

        let seq = self.seq;
        let delay = self.config.debounce;
        let events = self.events_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(CompletionEvent::Fired { seq });
        }));
    }

    /// Wait for the next timer or reply event.
    ///
    /// Cancel-safe; pends forever while nothing is outstanding.
    pub async fn next_event(&mut self) -> Option<CompletionEvent> {
        self.events_rx.recv().await
    }

    /// Apply a timer or reply event. Returns `true` if the popup changed.
    pub fn handle_event(&mut self, event: CompletionEvent, geometry: &SurfaceGeometry) -> bool {
        match event {
            CompletionEvent::Fired { seq } => {
                if seq == self.seq && self.phase == Phase::Debouncing {
                    self.timer = None;
                    self.issue_request();
                }
                false
            }
            CompletionEvent::Reply { seq, result } => {
                if seq != self.seq || self.phase != Phase::AwaitingResponse {
                    log::debug!("Discarding stale completion reply #{seq} (latest #{})", self.seq);
                    return false;
                }
                self.apply_reply(result, geometry)
            }
        }
    }

    fn issue_request(&mut self) {
        let Some(snapshot) = &self.snapshot else {
            self.phase = Phase::Idle;
            return;
        };
        let request = CompletionRequest {
            code: snapshot.code.clone(),
            cursor_position: snapshot.cursor,
            language: self.config.language.clone(),
            seq: self.seq,
        };
        self.phase = Phase::AwaitingResponse;

        // In-flight requests are never cancelled; the seq check drops late replies.
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let seq = request.seq;
            let result = backend.complete(request).await;
            let _ = events.send(CompletionEvent::Reply { seq, result });
        });
    }

    fn apply_reply(
        &mut self,
        result: Result<Vec<String>, AssistError>,
        geometry: &SurfaceGeometry,
    ) -> bool {
        let suggestions = match result {
            Ok(suggestions) => suggestions,
            Err(e) => {
                log::error!("Error fetching autocomplete: {e}");
                self.phase = Phase::Idle;
                return false;
            }
        };
        if suggestions.is_empty() {
            self.phase = Phase::Idle;
            return false;
        }
        let Some(snapshot) = &self.snapshot else {
            self.phase = Phase::Idle;
            return false;
        };

        let position = place_popup(
            &snapshot.code,
            snapshot.cursor,
            suggestions.len(),
            geometry,
            &self.config.metrics,
        );
        self.popup.show(suggestions, position);
        self.phase = Phase::Showing;
        true
    }

    /// Offer a key to the popup. Only intercepts while it is visible.
    pub fn handle_key(&mut self, key: Key) -> InputOutcome {
        if !self.popup.is_visible() {
            return InputOutcome::NotHandled;
        }
        match key {
            Key::ArrowDown => {
                self.popup.select_next();
                InputOutcome::Handled
            }
            Key::ArrowUp => {
                self.popup.select_previous();
                InputOutcome::Handled
            }
            Key::Tab | Key::Enter => match self.popup.selected().map(str::to_string) {
                Some(choice) => {
                    self.hide();
                    InputOutcome::Selected(choice)
                }
                None => {
                    self.hide();
                    InputOutcome::Handled
                }
            },
            Key::Escape => {
                self.hide();
                InputOutcome::Handled
            }
            Key::Other => InputOutcome::NotHandled,
        }
    }

    /// A mouse press at viewport coordinates.
    ///
    /// A row selects its suggestion; anywhere outside the popup hides it and
    /// the click continues to the surface.
    pub fn click(&mut self, x: f64, y: f64) -> InputOutcome {
        if !self.popup.is_visible() {
            return InputOutcome::NotHandled;
        }
        match self.popup.hit_test(x, y, &self.config.metrics) {
            PopupHit::Row(index) => {
                let choice = self.popup.suggestions().get(index).cloned();
                self.hide();
                choice.map_or(InputOutcome::Handled, InputOutcome::Selected)
            }
            PopupHit::Chrome => InputOutcome::Handled,
            PopupHit::Outside => {
                self.hide();
                InputOutcome::NotHandled
            }
        }
    }

    /// Hide the popup without selecting.
    pub fn hide(&mut self) {
        self.popup.hide();
        if self.phase == Phase::Showing {
            self.phase = Phase::Idle;
        }
    }

    /// Language tag for subsequent requests.
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.config.language = language.into();
    }

    pub fn language(&self) -> &str {
        &self.config.language
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// A timer or request is outstanding.
    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Debouncing | Phase::AwaitingResponse)
    }

    pub fn popup(&self) -> &AutocompleteState {
        &self.popup
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl<B> Drop for CompletionCoordinator<B> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
