//! Realtime Error Types
//!
//! This module defines the error taxonomy for the realtime client core.
//!
//! # Error Categories
//!
//! - `Connection` - the transport could not establish or maintain the link
//! - `MalformedFrame` - an inbound payload failed to parse (frame dropped)
//! - `NotConnected` - an outbound command was attempted while disconnected
//! - `Rest` - a REST collaborator call failed
//!
//! # Propagation
//!
//! Connection errors bubble to the registered error callbacks and are the
//! only errors the UI layer sees as connectivity status. Malformed frames
//! are contained per-topic: they are logged and dropped without affecting
//! the session or other topics. `NotConnected` is surfaced immediately to
//! the caller and never queued.
use thiserror::Error;

/// Errors produced by the realtime client core
#[derive(Debug, Error, Clone)]
pub enum RealtimeError {
    /// Transport could not establish or maintain the connection
    #[error("connection error: {message}")]
    Connection {
        /// Human-readable error message
        message: String,
    },

    /// Inbound frame payload failed to parse
    #[error("malformed frame on '{topic}': {message}")]
    MalformedFrame {
        /// Topic the frame was delivered on
        topic: String,
        /// Human-readable error message
        message: String,
    },

    /// An outbound command was attempted while the session is not connected
    #[error("not connected")]
    NotConnected,

    /// A REST collaborator call failed
    #[error("rest error: {message}")]
    Rest {
        /// Human-readable error message
        message: String,
    },
}

impl RealtimeError {
    /// Create a new connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a new malformed-frame error
    pub fn malformed_frame(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create a new REST error
    pub fn rest(message: impl Into<String>) -> Self {
        Self::Rest {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for RealtimeError {
    fn from(err: reqwest::Error) -> Self {
        Self::rest(err.to_string())
    }
}
