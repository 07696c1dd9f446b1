//! Subscription Registry
//!
//! Topic-keyed handler table with single-slot-per-topic semantics. At most
//! one live subscription exists per topic string; installing a handler for
//! an already-subscribed topic replaces the previous slot. Requests issued
//! while the transport is still connecting are queued and drained exactly
//! once on the transition to Connected.
//!
//! Handlers are looked up at delivery time, not at subscribe time: a
//! handler swapped after subscribing takes effect for subsequent frames
//! without touching the wire subscription.
//!
//! A frame whose payload fails to parse is logged and dropped; it never
//! affects the session or other topics.

use crate::realtime::transport::InboundFrame;
use crate::shared::error::RealtimeError;
use crate::shared::Frame;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

/// Callback invoked with each frame delivered on a subscribed topic
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync>;

/// A subscribe request queued while the transport is connecting
struct PendingSubscribe {
    topic: String,
    handler: FrameHandler,
}

/// Topic-keyed subscription table
#[derive(Default)]
pub struct SubscriptionRegistry {
    /// Live slots, one per topic string
    slots: RwLock<HashMap<String, FrameHandler>>,
    /// Requests waiting for the Connecting -> Connected transition
    pending: Mutex<Vec<PendingSubscribe>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a handler slot for a topic
    ///
    /// Returns `true` when an existing slot was replaced.
    pub(crate) fn install(&self, topic: &str, handler: FrameHandler) -> bool {
        let mut slots = self.slots.write().expect("registry lock poisoned");
        slots.insert(topic.to_string(), handler).is_some()
    }

    /// Remove the slot for a topic
    ///
    /// Returns `true` when a slot existed.
    pub(crate) fn remove(&self, topic: &str) -> bool {
        let mut slots = self.slots.write().expect("registry lock poisoned");
        slots.remove(topic).is_some()
    }

    /// Queue a subscribe request for the next Connected transition
    ///
    /// A queued request for the same topic is replaced, preserving the
    /// single-slot rule for requests that race within one connect attempt.
    pub(crate) fn queue(&self, topic: String, handler: FrameHandler) {
        let mut pending = self.pending.lock().expect("registry lock poisoned");
        pending.retain(|entry| entry.topic != topic);
        pending.push(PendingSubscribe { topic, handler });
    }

    /// Drop a queued request for a topic, if any
    pub(crate) fn remove_pending(&self, topic: &str) {
        let mut pending = self.pending.lock().expect("registry lock poisoned");
        pending.retain(|entry| entry.topic != topic);
    }

    /// Move every queued request into a live slot
    ///
    /// Called exactly once per Connecting -> Connected transition, before
    /// the wire subscriptions are issued.
    pub(crate) fn merge_pending(&self) {
        let drained: Vec<PendingSubscribe> = {
            let mut pending = self.pending.lock().expect("registry lock poisoned");
            pending.drain(..).collect()
        };
        if drained.is_empty() {
            return;
        }
        let mut slots = self.slots.write().expect("registry lock poisoned");
        for entry in drained {
            slots.insert(entry.topic, entry.handler);
        }
    }

    /// Wire names of all live slots
    pub fn topics(&self) -> Vec<String> {
        let slots = self.slots.read().expect("registry lock poisoned");
        slots.keys().cloned().collect()
    }

    /// Whether a live slot exists for a topic
    pub fn is_subscribed(&self, topic: &str) -> bool {
        let slots = self.slots.read().expect("registry lock poisoned");
        slots.contains_key(topic)
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        let slots = self.slots.read().expect("registry lock poisoned");
        slots.len()
    }

    /// Whether no live slot exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every slot and queued request, returning the slot topics
    ///
    /// Used by session teardown to release wire subscriptions before the
    /// connection closes.
    pub(crate) fn clear(&self) -> Vec<String> {
        let mut pending = self.pending.lock().expect("registry lock poisoned");
        pending.clear();
        drop(pending);
        let mut slots = self.slots.write().expect("registry lock poisoned");
        slots.drain().map(|(topic, _)| topic).collect()
    }

    /// Parse an inbound frame and invoke the handler registered for its
    /// topic at this moment
    pub(crate) fn dispatch(&self, frame: InboundFrame) {
        let payload: serde_json::Value = match serde_json::from_str(&frame.body) {
            Ok(payload) => payload,
            Err(e) => {
                let error = RealtimeError::malformed_frame(&frame.topic, e.to_string());
                warn!("[Registry] Dropping frame: {}", error);
                return;
            }
        };

        // Clone the handler out of the lock so a slow handler cannot block
        // subscribe/unsubscribe calls.
        let handler = {
            let slots = self.slots.read().expect("registry lock poisoned");
            slots.get(&frame.topic).cloned()
        };

        match handler {
            Some(handler) => handler(Frame::new(frame.topic, payload)),
            None => debug!("[Registry] No subscription for topic {}", frame.topic),
        }
    }
}
