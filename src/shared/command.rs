//! Outbound Commands
//!
//! User-initiated commands sent to `/app/..` destinations. Each variant
//! maps to one destination and serializes its body with camelCase keys.
//! Commands are stateless and constructed per call; the session token in
//! `Connect` must be fresh on every (re)connect so the backend can tell
//! reconnects apart.

use crate::shared::event::MessageType;
use crate::shared::topic::{
    JOIN_DESTINATION, LEAVE_DESTINATION, SEND_MESSAGE_DESTINATION, TYPING_DESTINATION,
    USER_CONNECT_DESTINATION,
};
use crate::shared::{ChatId, UserId};
use serde_json::json;

/// Generate a fresh session token for one connect handshake
///
/// Tokens embed the identity and a timestamp-derived nonce, so two
/// announcements from the same user never collide backend-side.
pub fn session_token(user_id: UserId) -> String {
    format!(
        "session-{}-{}",
        user_id,
        chrono::Utc::now().timestamp_millis()
    )
}

/// A user-initiated realtime command
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundCommand {
    /// Announce identity so the backend can register presence
    Connect {
        user_id: UserId,
        session_id: String,
    },
    /// Send a chat message
    SendMessage {
        chat_id: ChatId,
        sender_id: UserId,
        content: String,
        message_type: MessageType,
        metadata: Option<serde_json::Value>,
    },
    /// Typing notification (wire contract; unused by the current UI)
    Typing {
        chat_id: ChatId,
        user_id: UserId,
        username: String,
    },
    /// Chat join notification (wire contract; unused by the current UI)
    Join {
        chat_id: ChatId,
        user_id: UserId,
        username: String,
    },
    /// Chat leave notification (wire contract; unused by the current UI)
    Leave {
        chat_id: ChatId,
        user_id: UserId,
        username: String,
    },
}

impl OutboundCommand {
    /// Build a `Connect` command with a freshly generated session token
    pub fn connect_for(user_id: UserId) -> Self {
        Self::Connect {
            user_id,
            session_id: session_token(user_id),
        }
    }

    /// The destination this command is sent to
    pub fn destination(&self) -> &'static str {
        match self {
            Self::Connect { .. } => USER_CONNECT_DESTINATION,
            Self::SendMessage { .. } => SEND_MESSAGE_DESTINATION,
            Self::Typing { .. } => TYPING_DESTINATION,
            Self::Join { .. } => JOIN_DESTINATION,
            Self::Leave { .. } => LEAVE_DESTINATION,
        }
    }

    /// The JSON body transmitted to the destination
    pub fn body(&self) -> serde_json::Value {
        match self {
            Self::Connect {
                user_id,
                session_id,
            } => json!({
                "userId": user_id,
                "sessionId": session_id,
            }),
            Self::SendMessage {
                chat_id,
                sender_id,
                content,
                message_type,
                metadata,
            } => json!({
                "chatId": chat_id,
                "senderId": sender_id,
                "content": content,
                "messageType": message_type,
                "metadata": metadata,
            }),
            Self::Typing {
                chat_id,
                user_id,
                username,
            }
            | Self::Join {
                chat_id,
                user_id,
                username,
            }
            | Self::Leave {
                chat_id,
                user_id,
                username,
            } => json!({
                "chatId": chat_id,
                "userId": user_id,
                "username": username,
            }),
        }
    }
}
