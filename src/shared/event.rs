//! Inbound Frames and Event Payloads
//!
//! This module defines the shapes delivered over subscribed topics. A
//! `Frame` is one discrete message from the transport; the typed payloads
//! (`ChatMessage`, `PresenceUpdate`, `ProfileUpdate`) decode from its JSON
//! body. All wire fields are camelCase, matching the backend contract.

use crate::shared::error::RealtimeError;
use crate::shared::{ChatId, UserId};
use serde::{Deserialize, Serialize};

/// One discrete message delivered over a subscribed topic
#[derive(Debug, Clone)]
pub struct Frame {
    /// Wire name of the topic the frame arrived on
    pub topic: String,
    /// Parsed JSON payload
    pub payload: serde_json::Value,
}

impl Frame {
    /// Create a new frame
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Decode the payload into a typed event
    ///
    /// Fails with `RealtimeError::MalformedFrame` when the payload does not
    /// match the expected shape.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, RealtimeError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| RealtimeError::malformed_frame(&self.topic, e.to_string()))
    }
}

/// Online/offline transition for one user, delivered on the presence topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    /// User whose status changed
    pub user_id: UserId,
    /// New status
    pub is_online: bool,
}

/// Profile picture change for one user, delivered on the profile-update topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    /// User whose picture changed
    pub user_id: UserId,
    /// New picture URL; `None` clears the picture
    #[serde(default)]
    pub profile_picture_url: Option<String>,
}

/// Kind of content a chat message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Text,
    Image,
    File,
    Audio,
    Video,
    Location,
    System,
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Text
    }
}

/// A chat message delivered on a chat topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Backend-assigned message id; absent on locally echoed messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    /// Chat the message belongs to
    pub chat_id: ChatId,
    /// Author of the message
    pub sender_id: UserId,
    /// Message text, or a URL for media messages
    pub content: String,
    /// Content kind
    #[serde(default)]
    pub message_type: MessageType,
    /// Type-specific extra data (file name, duration, coordinates)
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Backend timestamp (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    /// Avatar of the sender at send time, for group rendering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_profile_picture_url: Option<String>,
}
