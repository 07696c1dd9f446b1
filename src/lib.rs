//! Bloom Client - Realtime Core
//!
//! The realtime session and presence layer of the Bloom messaging client:
//! one persistent pub/sub connection tied to a user identity, multiplexed
//! logical subscriptions, and presence reconciliation against a REST
//! snapshot.
//!
//! # Overview
//!
//! - **`realtime::session`** - the process-wide transport session:
//!   connect/disconnect lifecycle, linear-backoff reconnection with a
//!   bounded attempt count, identity announcement on every (re)connect.
//! - **`realtime::registry`** - topic-keyed subscriptions with
//!   single-slot-per-topic semantics and queued-then-fired requests while
//!   the transport is connecting.
//! - **`realtime::commands`** - the outbound command sender; fails fast
//!   when disconnected, never queues.
//! - **`presence`** - the online/offline reconciler and the profile
//!   picture cache, both fed by a REST snapshot plus live events.
//! - **`rest`** - the presence bootstrap HTTP client.
//! - **`testing`** - in-memory transport doubles for tests.
//!
//! # Usage
//!
//! ```rust,no_run
//! use bloom_client::realtime::session::RealtimeSession;
//! use bloom_client::presence::{PresenceTracker, ProfilePictureCache};
//! use bloom_client::rest::PresenceApi;
//! use bloom_client::shared::RealtimeConfig;
//!
//! # async fn example() -> Result<(), bloom_client::shared::RealtimeError> {
//! let config = RealtimeConfig::default();
//! let session = RealtimeSession::new(config.clone());
//! session.set_identity(42);
//! session.connect().await?;
//!
//! let presence = PresenceTracker::new(session.clone(), PresenceApi::new(&config));
//! presence.start().await?;
//! if presence.is_online(7) {
//!     // render the green dot
//! }
//!
//! let avatars = ProfilePictureCache::new(session.clone());
//! avatars.start();
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! The session is shared mutable state behind `Arc`; construct it once at
//! process start and clone the handle into every consumer. Inbound frames
//! for a topic are dispatched in arrival order from a single event task;
//! no ordering holds across topics. Handlers run synchronously on that
//! task, so they should stay cheap.
//!
//! # Error Handling
//!
//! All fallible operations return `Result<_, RealtimeError>`. Transport
//! errors reach the registered error callbacks; per-frame parse failures
//! are logged and dropped without touching the session.

/// Presence reconciliation and avatar caching
pub mod presence;

/// Session, subscriptions, commands and transport
pub mod realtime;

/// REST collaborators
pub mod rest;

/// Shared types and configuration
pub mod shared;

/// In-memory transport doubles for tests
pub mod testing;
