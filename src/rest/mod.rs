//! REST Collaborators
//!
//! Thin async clients for the HTTP endpoints the realtime core depends
//! on. The wider REST surface (users, contacts, chats, messages) lives
//! with its consumers; the core only needs the presence bootstrap.

use crate::shared::error::RealtimeError;
use crate::shared::{RealtimeConfig, UserId};
use serde::Deserialize;
use tracing::debug;

/// Response of `GET /api/presence/online/ids`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OnlineIdsResponse {
    success: bool,
    #[serde(default)]
    online_user_ids: Vec<UserId>,
}

/// Client for the presence REST endpoints
#[derive(Clone)]
pub struct PresenceApi {
    base_url: String,
    client: reqwest::Client,
}

impl PresenceApi {
    /// Create a client for the configured backend
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            base_url: config.api_base_url.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the ids of every currently online user
    pub async fn fetch_online_ids(&self) -> Result<Vec<UserId>, RealtimeError> {
        let url = format!("{}/api/presence/online/ids", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RealtimeError::rest(format!(
                "presence bootstrap failed: {}",
                status
            )));
        }

        let body: OnlineIdsResponse = response
            .json()
            .await
            .map_err(|e| RealtimeError::rest(format!("presence bootstrap parse failed: {}", e)))?;
        if !body.success {
            return Err(RealtimeError::rest("presence bootstrap rejected"));
        }

        debug!(
            "[Presence] Bootstrap returned {} online users",
            body.online_user_ids.len()
        );
        Ok(body.online_user_ids)
    }
}
