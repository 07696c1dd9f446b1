//! Realtime Module
//!
//! The session and subscription core: one persistent connection to the
//! realtime endpoint, multiplexing per-chat message streams and the
//! process-wide presence and profile-update feeds, with client-driven
//! reconnection.

/// Outbound command sender
pub mod commands;

/// Topic-keyed subscription table
pub mod registry;

/// Transport session lifecycle
pub mod session;

/// Wire transport seam and WebSocket implementation
pub mod transport;

/// Re-export commonly used types for convenience
pub use commands::CommandSender;
pub use registry::{FrameHandler, SubscriptionRegistry};
pub use session::{RealtimeSession, SessionStatus};
pub use transport::{Connection, Connector, TransportEvent, WsConnector};
