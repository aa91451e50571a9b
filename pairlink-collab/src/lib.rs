//! # pairlink-collab — Realtime room synchronization for Pairlink
//!
//! Keeps one editor's view of a shared code buffer in step with a room
//! backend over a persistent WebSocket channel.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   JSON text frames   ┌──────────────┐
//! │ChannelClient │ ◄──────────────────► │ Room backend │
//! │ (per editor) │   /ws/{room}/{user}  │  (external)  │
//! └──────┬───────┘                      └──────────────┘
//!        │ ChannelEvent (ordered)
//!        ▼
//! ┌──────────────┐
//! │ DocumentSync │  buffer + membership + peer carets
//! │ (one writer) │ ──code_change──► ChannelHandle
//! └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — `ChannelMessage` tagged union and JSON codec
//! - [`client`] — channel task with bounded exponential reconnect
//! - [`document`] — document sync controller (last writer wins)
//! - [`session`] — per-editor identity
//! - [`rooms`] — room creation over HTTP
//! - [`profile`] — persisted display name

pub mod client;
pub mod document;
pub mod error;
pub mod profile;
pub mod protocol;
pub mod rooms;
pub mod session;

// Re-exports for convenience
pub use client::{
    ChannelClient, ChannelConfig, ChannelEvent, ChannelHandle, ConnectionState, ReconnectPolicy,
    MANUAL_DISCONNECT_REASON,
};
pub use document::{DocumentSync, MessageSink, SyncUpdate, CURSOR_PUBLISH_INTERVAL};
pub use error::CollabError;
pub use profile::{ProfileStore, DEFAULT_DISPLAY_NAME, DISPLAY_NAME_KEY};
pub use protocol::ChannelMessage;
pub use rooms::{parse_room_id, RoomsClient};
pub use session::{display_name_of, Session};
