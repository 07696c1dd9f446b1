//! Presence Module
//!
//! Process-wide presence state: the online/offline reconciler and the
//! profile picture cache. Both outlive individual chat views; they
//! subscribe once per process, independent of which chat is open.

/// Profile picture cache
pub mod avatars;

/// Presence reconciler
pub mod tracker;

/// Re-export commonly used types for convenience
pub use avatars::ProfilePictureCache;
pub use tracker::PresenceTracker;
