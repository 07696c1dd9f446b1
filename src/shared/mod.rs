//! Shared Module
//!
//! Types used across the realtime core: topics, frames, commands, errors
//! and configuration. All wire-facing types serialize with camelCase
//! field names to match the backend contract.

/// Outbound command shapes
pub mod command;

/// Client configuration
pub mod config;

/// Shared error types
pub mod error;

/// Inbound frames and event payloads
pub mod event;

/// Topic and destination names
pub mod topic;

/// Backend user id
pub type UserId = i64;

/// Backend chat id
pub type ChatId = i64;

/// Re-export commonly used types for convenience
pub use command::{session_token, OutboundCommand};
pub use config::{ConfigError, RealtimeConfig, RealtimeConfigBuilder};
pub use error::RealtimeError;
pub use event::{ChatMessage, Frame, MessageType, PresenceUpdate, ProfileUpdate};
pub use topic::Topic;
