//! Errors from completion requests.

use thiserror::Error;

/// A failed completion round trip.
///
/// Never fatal: the coordinator logs it and the popup stays hidden.
#[derive(Debug, Error)]
pub enum AssistError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service responded with status {0}")]
    Status(u16),

    #[error("malformed completion response: {0}")]
    Decode(#[from] serde_json::Error),
}
