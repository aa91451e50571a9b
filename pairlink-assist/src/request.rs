//! Completion request/response types and the backend seam.
//!
//! Wire format (`POST {base}/autocomplete`):
//! ```text
//! → {"code":"def f(","cursor_position":6,"language":"python"}
//! ← {"suggestions":["x)","self)","*args)"]}
//! ```

use std::future::Future;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AssistError;

/// One snapshot sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionRequest {
    pub code: String,
    /// Character offset into `code`
    pub cursor_position: usize,
    pub language: String,
    /// Debounce generation this request belongs to; not sent on the wire
    #[serde(skip)]
    pub seq: u64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    suggestions: Option<Vec<String>>,
}

/// Anything that turns a snapshot into a ranked suggestion list.
pub trait CompletionBackend: Send + Sync + 'static {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Vec<String>, AssistError>> + Send;
}

/// Completion service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCompletionBackend {
    endpoint: String,
    http_client: Client,
}

impl HttpCompletionBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http_client: Client) -> Self {
        let base = base_url.into();
        Self {
            endpoint: format!("{}/autocomplete", base.trim_end_matches('/')),
            http_client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl CompletionBackend for HttpCompletionBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<Vec<String>, AssistError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssistError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: CompletionResponse = serde_json::from_str(&body)?;
        Ok(parsed.suggestions.unwrap_or_default())
    }
}
