//! # pairlink-assist — Inline code completion for Pairlink
//!
//! Turns a stream of keystrokes into bounded-rate completion requests and
//! drives the suggestion popup.
//!
//! ```text
//! trigger(code, cursor) ──► debounce (600ms) ──► CompletionBackend ──► reply #seq
//!                                                                        │
//!                          popup (placed + clamped) ◄── latest seq only ◄┘
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`] — debounce timer, request sequencing, key/click handling
//! - [`popup`] — caret geometry, viewport clamp, selection state
//! - [`request`] — request type, backend trait, HTTP backend

pub mod coordinator;
pub mod error;
pub mod popup;
pub mod request;

pub use coordinator::{
    CompletionConfig, CompletionCoordinator, CompletionEvent, InputOutcome, Key, Phase,
    DEFAULT_DEBOUNCE, DEFAULT_LANGUAGE,
};
pub use error::AssistError;
pub use popup::{
    caret_line_column, place_popup, AutocompleteState, Point, PopupHit, PopupMetrics,
    SurfaceGeometry,
};
pub use request::{CompletionBackend, CompletionRequest, HttpCompletionBackend};
