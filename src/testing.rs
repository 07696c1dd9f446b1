//! In-memory transport doubles
//!
//! Test utilities for exercising the realtime layer without a server. A
//! [`MockConnector`] hands out scripted in-memory connections; each
//! established connection can be driven through a [`MockConnectionHandle`]
//! to inject inbound frames, observe outbound traffic, and simulate
//! mid-session drops.
//!
//! Used by this crate's own test suite and available to downstream crates
//! that embed the client.

use crate::realtime::transport::{
    Connection, Connector, InboundFrame, TransportEvent, TransportEventSender,
};
use crate::shared::error::RealtimeError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Scripted in-memory [`Connector`]
#[derive(Default)]
pub struct MockConnector {
    /// Outcomes for upcoming connect calls; empty queue means success
    failures: Mutex<VecDeque<String>>,
    /// Artificial handshake latency, for driving the Connecting state
    connect_delay: Mutex<Option<std::time::Duration>>,
    attempts: AtomicU32,
    connections: Mutex<Vec<Arc<MockConnectionState>>>,
}

impl MockConnector {
    /// Create a connector that accepts every connect call
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next connect call to fail with `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures
            .lock()
            .expect("mock lock poisoned")
            .push_back(message.into());
    }

    /// Script the next `count` connect calls to fail with `message`
    pub fn fail_times(&self, count: u32, message: impl Into<String>) {
        let message = message.into();
        let mut failures = self.failures.lock().expect("mock lock poisoned");
        for _ in 0..count {
            failures.push_back(message.clone());
        }
    }

    /// Delay every subsequent connect call by `delay`
    ///
    /// Lets tests observe the session while its handshake is in flight.
    pub fn set_connect_delay(&self, delay: std::time::Duration) {
        *self.connect_delay.lock().expect("mock lock poisoned") = Some(delay);
    }

    /// Total connect calls observed, including failed ones
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Number of connections successfully established
    pub fn connection_count(&self) -> usize {
        self.connections.lock().expect("mock lock poisoned").len()
    }

    /// Handle to the most recently established connection
    pub fn last_connection(&self) -> Option<MockConnectionHandle> {
        self.connections
            .lock()
            .expect("mock lock poisoned")
            .last()
            .cloned()
            .map(|state| MockConnectionHandle { state })
    }

    /// Handles to every established connection, oldest first
    pub fn connections(&self) -> Vec<MockConnectionHandle> {
        self.connections
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .cloned()
            .map(|state| MockConnectionHandle { state })
            .collect()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        events: TransportEventSender,
    ) -> Result<Arc<dyn Connection>, RealtimeError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.connect_delay.lock().expect("mock lock poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted_failure = self
            .failures
            .lock()
            .expect("mock lock poisoned")
            .pop_front();
        if let Some(message) = scripted_failure {
            return Err(RealtimeError::connection(message));
        }
        let state = Arc::new(MockConnectionState {
            events,
            sent: Mutex::new(Vec::new()),
            subscribes: Mutex::new(Vec::new()),
            unsubscribes: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        self.connections
            .lock()
            .expect("mock lock poisoned")
            .push(state.clone());
        Ok(Arc::new(MockConnection { state }))
    }
}

struct MockConnectionState {
    events: TransportEventSender,
    sent: Mutex<Vec<(String, serde_json::Value)>>,
    subscribes: Mutex<Vec<String>>,
    unsubscribes: Mutex<Vec<String>>,
    closed: AtomicBool,
}

/// In-memory [`Connection`] produced by [`MockConnector`]
struct MockConnection {
    state: Arc<MockConnectionState>,
}

impl Connection for MockConnection {
    fn send(&self, destination: &str, body: serde_json::Value) -> Result<(), RealtimeError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(RealtimeError::connection("connection closed"));
        }
        self.state
            .sent
            .lock()
            .expect("mock lock poisoned")
            .push((destination.to_string(), body));
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> Result<(), RealtimeError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(RealtimeError::connection("connection closed"));
        }
        self.state
            .subscribes
            .lock()
            .expect("mock lock poisoned")
            .push(topic.to_string());
        Ok(())
    }

    fn unsubscribe(&self, topic: &str) -> Result<(), RealtimeError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(RealtimeError::connection("connection closed"));
        }
        self.state
            .unsubscribes
            .lock()
            .expect("mock lock poisoned")
            .push(topic.to_string());
        Ok(())
    }

    fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
    }
}

/// Driver for one established mock connection
#[derive(Clone)]
pub struct MockConnectionHandle {
    state: Arc<MockConnectionState>,
}

impl MockConnectionHandle {
    /// Deliver an inbound frame with a raw JSON body
    pub fn deliver(&self, topic: &str, body: &str) {
        let _ = self.state.events.send(TransportEvent::Frame(InboundFrame {
            topic: topic.to_string(),
            body: body.to_string(),
        }));
    }

    /// Deliver an inbound frame with a JSON value body
    pub fn deliver_json(&self, topic: &str, body: serde_json::Value) {
        self.deliver(topic, &body.to_string());
    }

    /// Simulate a mid-session connection drop
    pub fn drop_connection(&self, reason: &str) {
        let _ = self.state.events.send(TransportEvent::Closed {
            reason: Some(reason.to_string()),
        });
    }

    /// Surface a transport-level error without dropping the connection
    pub fn emit_error(&self, message: &str) {
        let _ = self.state.events.send(TransportEvent::Error {
            message: message.to_string(),
        });
    }

    /// Outbound commands observed, in send order
    pub fn sent(&self) -> Vec<(String, serde_json::Value)> {
        self.state.sent.lock().expect("mock lock poisoned").clone()
    }

    /// Outbound commands sent to one destination
    pub fn sent_to(&self, destination: &str) -> Vec<serde_json::Value> {
        self.state
            .sent
            .lock()
            .expect("mock lock poisoned")
            .iter()
            .filter(|(dest, _)| dest == destination)
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Every wire subscribe observed, in order
    pub fn subscribes(&self) -> Vec<String> {
        self.state
            .subscribes
            .lock()
            .expect("mock lock poisoned")
            .clone()
    }

    /// Every wire unsubscribe observed, in order
    pub fn unsubscribes(&self) -> Vec<String> {
        self.state
            .unsubscribes
            .lock()
            .expect("mock lock poisoned")
            .clone()
    }

    /// Net live wire subscriptions: subscribes minus unsubscribes per topic
    pub fn live_subscription_counts(&self) -> HashMap<String, i64> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for topic in self.subscribes() {
            *counts.entry(topic).or_default() += 1;
        }
        for topic in self.unsubscribes() {
            *counts.entry(topic).or_default() -= 1;
        }
        counts
    }

    /// Whether the session closed this connection
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}
