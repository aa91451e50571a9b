//! Error type shared by the collaboration client.

use thiserror::Error;

/// Errors surfaced by channel, room and profile operations.
///
/// Transport drops and malformed frames are handled inside the channel task
/// and never reach callers as errors; see [`crate::client`].
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("cannot connect: room id and user id are both required")]
    MissingIdentity,

    #[error("channel is not connected")]
    NotConnected,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid profile: {0}")]
    Profile(String),
}
