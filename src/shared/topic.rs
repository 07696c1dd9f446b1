//! Topics and Destinations
//!
//! Names for the channels of the realtime transport. Subscriptions go to
//! `/topic/..` channels; user-initiated commands go to `/app/..`
//! destinations. The chat topic is per-chat; presence and profile-update
//! topics are process-wide.

use crate::shared::ChatId;
use std::fmt;

/// Destination for outbound chat messages
pub const SEND_MESSAGE_DESTINATION: &str = "/app/chat.sendMessage";
/// Destination for the identity announcement after connect
pub const USER_CONNECT_DESTINATION: &str = "/app/user.connect";
/// Destination for typing notifications
pub const TYPING_DESTINATION: &str = "/app/chat.typing";
/// Destination for chat join notifications
pub const JOIN_DESTINATION: &str = "/app/chat.join";
/// Destination for chat leave notifications
pub const LEAVE_DESTINATION: &str = "/app/chat.leave";

/// Prefix of per-chat message topics
const CHAT_TOPIC_PREFIX: &str = "/topic/chat.";
/// The process-wide presence topic
const PRESENCE_TOPIC: &str = "/topic/user.presence";
/// The process-wide profile-update topic
const PROFILE_UPDATE_TOPIC: &str = "/topic/user.profileUpdate";

/// A subscribable channel on the realtime transport
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Message stream for one chat
    Chat(ChatId),
    /// Online/offline events for all users
    Presence,
    /// Profile picture updates for all users
    ProfileUpdate,
}

impl Topic {
    /// Topic for one chat's message stream
    pub fn chat(chat_id: ChatId) -> Self {
        Self::Chat(chat_id)
    }

    /// The wire name of this topic
    pub fn as_wire_name(&self) -> String {
        match self {
            Self::Chat(chat_id) => format!("{}{}", CHAT_TOPIC_PREFIX, chat_id),
            Self::Presence => PRESENCE_TOPIC.to_string(),
            Self::ProfileUpdate => PROFILE_UPDATE_TOPIC.to_string(),
        }
    }

    /// Parse a wire name back into a topic; `None` for unknown channels
    pub fn parse(wire_name: &str) -> Option<Self> {
        if wire_name == PRESENCE_TOPIC {
            return Some(Self::Presence);
        }
        if wire_name == PROFILE_UPDATE_TOPIC {
            return Some(Self::ProfileUpdate);
        }
        wire_name
            .strip_prefix(CHAT_TOPIC_PREFIX)
            .and_then(|id| id.parse::<ChatId>().ok())
            .map(Self::Chat)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_name())
    }
}
