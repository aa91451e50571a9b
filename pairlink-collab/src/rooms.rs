//! HTTP client for room creation.

use reqwest::Client;
use serde::Deserialize;

use crate::error::CollabError;

#[derive(Debug, Deserialize)]
struct RoomResponse {
    room_id: String,
}

/// Client for the room endpoints of the backend.
#[derive(Debug, Clone)]
pub struct RoomsClient {
    base_url: String,
    http_client: Client,
}

impl RoomsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http_client: Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST {base}/rooms` with no body; returns the new room id.
    pub async fn create_room(&self) -> Result<String, CollabError> {
        let url = format!("{}/rooms", self.base_url);
        let response = self.http_client.post(&url).send().await?;

        if !response.status().is_success() {
            log::error!("Room creation failed with status {}", response.status());
            return Err(CollabError::Status(response.status().as_u16()));
        }

        let room = response.json::<RoomResponse>().await?;
        log::info!("Created room {}", room.room_id);
        Ok(room.room_id)
    }

    /// Shareable path for a room, e.g. `/room/abc123`.
    pub fn room_path(room_id: &str) -> String {
        format!("/room/{room_id}")
    }
}

/// Normalize a user-entered room id for joining; `None` if blank.
///
/// Accepts a bare id or a pasted share link ending in `/room/{id}`.
pub fn parse_room_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let id = match trimmed.rfind("/room/") {
        Some(at) => trimmed[at + "/room/".len()..].trim_end_matches('/'),
        None => trimmed,
    };
    (!id.is_empty()).then(|| id.to_string())
}
