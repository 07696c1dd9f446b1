//! Outbound Command Sender
//!
//! Serializes user intents into outbound commands and hands them to the
//! transport session. This layer fails fast: a command attempted while the
//! session is not Connected returns `RealtimeError::NotConnected` and
//! produces no frame. There are no retries here; retry policy, where
//! wanted, belongs to the caller.

use crate::realtime::session::RealtimeSession;
use crate::shared::command::OutboundCommand;
use crate::shared::error::RealtimeError;
use crate::shared::event::MessageType;
use crate::shared::{ChatId, UserId};
use tracing::debug;

/// Sends user-initiated commands over the session
#[derive(Clone)]
pub struct CommandSender {
    session: RealtimeSession,
}

impl CommandSender {
    /// Create a sender over a session
    pub fn new(session: RealtimeSession) -> Self {
        Self { session }
    }

    /// Send a chat message
    pub fn send_chat_message(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        content: impl Into<String>,
        message_type: MessageType,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), RealtimeError> {
        let command = OutboundCommand::SendMessage {
            chat_id,
            sender_id,
            content: content.into(),
            message_type,
            metadata,
        };
        self.session.send_command(&command)?;
        debug!("[Commands] Sent message to chat {}", chat_id);
        Ok(())
    }

    /// Announce identity to the backend
    ///
    /// Generates a fresh session token per call so reconnect announcements
    /// never collide backend-side.
    pub fn announce_connect(&self, user_id: UserId) -> Result<(), RealtimeError> {
        let command = OutboundCommand::connect_for(user_id);
        self.session.send_command(&command)?;
        debug!("[Commands] Announced connect for user {}", user_id);
        Ok(())
    }

    /// Send a typing notification
    pub fn send_typing(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        username: impl Into<String>,
    ) -> Result<(), RealtimeError> {
        self.session.send_command(&OutboundCommand::Typing {
            chat_id,
            user_id,
            username: username.into(),
        })
    }

    /// Send a chat join notification
    pub fn send_join(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        username: impl Into<String>,
    ) -> Result<(), RealtimeError> {
        self.session.send_command(&OutboundCommand::Join {
            chat_id,
            user_id,
            username: username.into(),
        })
    }

    /// Send a chat leave notification
    pub fn send_leave(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        username: impl Into<String>,
    ) -> Result<(), RealtimeError> {
        self.session.send_command(&OutboundCommand::Leave {
            chat_id,
            user_id,
            username: username.into(),
        })
    }
}
