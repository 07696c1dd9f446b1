//! Transport Session
//!
//! Owns the single realtime connection and its lifecycle. The session is a
//! process-wide service: construct it once at startup and share it by
//! cloning (clones share state).
//!
//! # Lifecycle
//!
//! `Disconnected -> Connecting -> Connected`, driven by `connect()` and
//! the transport's close events. `connect()` is idempotent; calling it
//! while Connected re-fires the connect callback and resolves immediately,
//! and calling it while a connect attempt is in flight awaits that
//! attempt's outcome instead of opening a second connection.
//!
//! # Reconnection
//!
//! On connection failure or a mid-session drop the session retries with a
//! linearly increasing delay (`base * attempt`, capped), up to a bounded
//! attempt count. Exceeding the cap stops the retries and surfaces one
//! terminal error through the error callback. On every successful
//! (re)connect the session re-issues all live wire subscriptions and,
//! when an identity is set, announces it with a freshly generated session
//! token after a short settle delay.
//!
//! # Teardown
//!
//! `disconnect()` releases every subscription before the connection itself
//! closes, so no handler fires after it returns. It is a no-op when
//! already disconnected. A generation counter ties each connection to the
//! session epoch that created it; stale close events and pending retries
//! from a superseded epoch are ignored.

use crate::realtime::registry::{FrameHandler, SubscriptionRegistry};
use crate::realtime::transport::{
    Connection, Connector, TransportEvent, TransportEventReceiver, WsConnector,
};
use crate::shared::command::OutboundCommand;
use crate::shared::error::RealtimeError;
use crate::shared::{RealtimeConfig, Topic, UserId};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Callback fired when the session reaches Connected
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;
/// Callback fired when the session loses or closes its connection
pub type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;
/// Callback fired on transport-level errors
pub type ErrorCallback = Arc<dyn Fn(&RealtimeError) + Send + Sync>;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No connection and none in progress
    Disconnected,
    /// A connect attempt (or reconnect backoff) is in flight
    Connecting,
    /// Connected and acknowledged by the remote endpoint
    Connected,
}

#[derive(Default)]
struct Callbacks {
    on_connect: Option<ConnectCallback>,
    on_disconnect: Option<DisconnectCallback>,
    on_error: Option<ErrorCallback>,
}

struct SessionState {
    status: SessionStatus,
    /// Reconnect attempt counter; reset on every successful connect
    attempt: u32,
    /// Identity announced on each successful connect
    identity: Option<UserId>,
    /// Epoch counter; bumped by `connect()` and `disconnect()` so stale
    /// events and retries from superseded connections are ignored
    generation: u64,
}

struct SessionShared {
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    registry: SubscriptionRegistry,
    state: RwLock<SessionState>,
    connection: RwLock<Option<Arc<dyn Connection>>>,
    callbacks: RwLock<Callbacks>,
    status_tx: watch::Sender<SessionStatus>,
}

/// The process-wide realtime session
///
/// Cheap to clone; clones share the same underlying session.
#[derive(Clone)]
pub struct RealtimeSession {
    shared: Arc<SessionShared>,
}

impl RealtimeSession {
    /// Create a session using the WebSocket transport
    pub fn new(config: RealtimeConfig) -> Self {
        let connector = Arc::new(WsConnector::new(&config));
        Self::with_connector(config, connector)
    }

    /// Create a session over a custom transport
    pub fn with_connector(config: RealtimeConfig, connector: Arc<dyn Connector>) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Disconnected);
        Self {
            shared: Arc::new(SessionShared {
                config,
                connector,
                registry: SubscriptionRegistry::new(),
                state: RwLock::new(SessionState {
                    status: SessionStatus::Disconnected,
                    attempt: 0,
                    identity: None,
                    generation: 0,
                }),
                connection: RwLock::new(None),
                callbacks: RwLock::new(Callbacks::default()),
                status_tx,
            }),
        }
    }

    /// The session configuration
    pub fn config(&self) -> &RealtimeConfig {
        &self.shared.config
    }

    /// The subscription table
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.shared.registry
    }

    /// Register the connect callback
    pub fn on_connect(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.shared
            .callbacks
            .write()
            .expect("session lock poisoned")
            .on_connect = Some(Arc::new(callback));
    }

    /// Register the disconnect callback
    pub fn on_disconnect(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.shared
            .callbacks
            .write()
            .expect("session lock poisoned")
            .on_disconnect = Some(Arc::new(callback));
    }

    /// Register the error callback
    pub fn on_error(&self, callback: impl Fn(&RealtimeError) + Send + Sync + 'static) {
        self.shared
            .callbacks
            .write()
            .expect("session lock poisoned")
            .on_error = Some(Arc::new(callback));
    }

    /// Record the identity announced on the next successful connect
    ///
    /// Does not itself send anything.
    pub fn set_identity(&self, user_id: UserId) {
        self.shared
            .state
            .write()
            .expect("session lock poisoned")
            .identity = Some(user_id);
    }

    /// The recorded identity, if any
    pub fn identity(&self) -> Option<UserId> {
        self.shared
            .state
            .read()
            .expect("session lock poisoned")
            .identity
    }

    /// Current lifecycle state
    pub fn status(&self) -> SessionStatus {
        self.shared
            .state
            .read()
            .expect("session lock poisoned")
            .status
    }

    /// Whether the session is connected and acknowledged
    pub fn is_connected(&self) -> bool {
        self.status() == SessionStatus::Connected
    }

    /// Establish the connection
    ///
    /// Idempotent: resolves immediately (re-firing the connect callback)
    /// when already Connected, and awaits the in-flight attempt when one
    /// is running. On failure the error is surfaced to the error callback
    /// and automatic reconnection starts in the background.
    pub async fn connect(&self) -> Result<(), RealtimeError> {
        enum Action {
            AlreadyConnected,
            Wait,
            Establish(u64),
        }

        let action = {
            let mut state = self.shared.state.write().expect("session lock poisoned");
            match state.status {
                SessionStatus::Connected => Action::AlreadyConnected,
                SessionStatus::Connecting => Action::Wait,
                SessionStatus::Disconnected => {
                    state.status = SessionStatus::Connecting;
                    state.attempt = 0;
                    state.generation += 1;
                    Action::Establish(state.generation)
                }
            }
        };

        match action {
            Action::AlreadyConnected => {
                fire_connect(&self.shared);
                Ok(())
            }
            Action::Wait => self.await_outcome().await,
            Action::Establish(generation) => {
                self.shared.status_tx.send_replace(SessionStatus::Connecting);
                match establish(&self.shared, generation).await {
                    Ok(()) => Ok(()),
                    Err(error) => {
                        warn!("[Session] Connect failed: {}", error);
                        fire_error(&self.shared, &error);
                        spawn_reconnect(self.shared.clone(), generation);
                        Err(error)
                    }
                }
            }
        }
    }

    /// Await the outcome of an in-flight connect attempt
    async fn await_outcome(&self) -> Result<(), RealtimeError> {
        let mut status_rx = self.shared.status_tx.subscribe();
        loop {
            let status = *status_rx.borrow_and_update();
            match status {
                SessionStatus::Connected => return Ok(()),
                SessionStatus::Disconnected => {
                    return Err(RealtimeError::connection("connection attempt failed"));
                }
                SessionStatus::Connecting => {
                    if status_rx.changed().await.is_err() {
                        return Err(RealtimeError::connection("session dropped"));
                    }
                }
            }
        }
    }

    /// Close the connection
    ///
    /// Every subscription (chat, presence, profile) is released before the
    /// connection itself closes. Safe to call when already disconnected.
    pub fn disconnect(&self) {
        let (connection, was_connected) = {
            let mut state = self.shared.state.write().expect("session lock poisoned");
            let was_connected = state.status == SessionStatus::Connected;
            state.status = SessionStatus::Disconnected;
            state.attempt = 0;
            state.generation += 1;
            let connection = self
                .shared
                .connection
                .write()
                .expect("session lock poisoned")
                .take();
            (connection, was_connected)
        };

        let topics = self.shared.registry.clear();
        if let Some(connection) = connection {
            for topic in &topics {
                if let Err(e) = connection.unsubscribe(topic) {
                    debug!("[Session] Unsubscribe for {} during teardown failed: {}", topic, e);
                }
            }
            connection.close();
        }
        self.shared
            .status_tx
            .send_replace(SessionStatus::Disconnected);
        if was_connected {
            info!("[Session] Disconnected");
            fire_disconnect(&self.shared);
        }
    }

    /// Subscribe a handler to a topic
    ///
    /// Single-slot per topic: an existing subscription for the same topic
    /// is released first, then replaced. When the session is disconnected
    /// the request triggers `connect()` and fires upon success; while a
    /// connect attempt is in flight the request is queued and drained on
    /// the transition to Connected. Requests are never silently dropped.
    pub async fn subscribe(
        &self,
        topic: Topic,
        handler: FrameHandler,
    ) -> Result<(), RealtimeError> {
        let wire_name = topic.as_wire_name();
        match self.status() {
            SessionStatus::Connected => {
                let connection = self
                    .shared
                    .connection
                    .read()
                    .expect("session lock poisoned")
                    .clone();
                let Some(connection) = connection else {
                    // The connection dropped between the status read and
                    // here; queue the request and let reconnection fire it.
                    self.shared.registry.queue(wire_name, handler);
                    return Ok(());
                };
                if self.shared.registry.is_subscribed(&wire_name) {
                    if let Err(e) = connection.unsubscribe(&wire_name) {
                        warn!("[Session] Releasing previous subscription for {} failed: {}", wire_name, e);
                    }
                }
                self.shared.registry.install(&wire_name, handler);
                connection.subscribe(&wire_name)?;
                debug!("[Session] Subscribed to {}", wire_name);
                Ok(())
            }
            SessionStatus::Connecting => {
                self.shared.registry.queue(wire_name.clone(), handler);
                // The Connected transition may have raced the queueing;
                // drain now so the request cannot be stranded until the
                // next reconnect. Wire subscribes are idempotent per topic.
                if self.is_connected() {
                    let connection = self
                        .shared
                        .connection
                        .read()
                        .expect("session lock poisoned")
                        .clone();
                    if let Some(connection) = connection {
                        self.shared.registry.merge_pending();
                        if let Err(e) = connection.subscribe(&wire_name) {
                            warn!("[Session] Subscribe for {} failed: {}", wire_name, e);
                        }
                    }
                }
                Ok(())
            }
            SessionStatus::Disconnected => {
                self.shared.registry.queue(wire_name, handler);
                self.connect().await
            }
        }
    }

    /// Release the subscription for a topic; no-op when absent
    pub fn unsubscribe(&self, topic: &Topic) {
        let wire_name = topic.as_wire_name();
        self.shared.registry.remove_pending(&wire_name);
        if self.shared.registry.remove(&wire_name) {
            let connection = self
                .shared
                .connection
                .read()
                .expect("session lock poisoned")
                .clone();
            if let Some(connection) = connection {
                if let Err(e) = connection.unsubscribe(&wire_name) {
                    debug!("[Session] Unsubscribe for {} failed: {}", wire_name, e);
                }
            }
            debug!("[Session] Unsubscribed from {}", wire_name);
        }
    }

    /// Transmit an outbound command
    ///
    /// Fails with `RealtimeError::NotConnected` when the session is not
    /// Connected; commands are never queued.
    pub fn send_command(&self, command: &OutboundCommand) -> Result<(), RealtimeError> {
        let connection = {
            let state = self.shared.state.read().expect("session lock poisoned");
            if state.status != SessionStatus::Connected {
                return Err(RealtimeError::NotConnected);
            }
            self.shared
                .connection
                .read()
                .expect("session lock poisoned")
                .clone()
        };
        let connection = connection.ok_or(RealtimeError::NotConnected)?;
        connection.send(command.destination(), command.body())
    }
}

/// Per-attempt reconnect delay: linear growth, capped
fn backoff_delay(config: &RealtimeConfig, attempt: u32) -> Duration {
    config
        .reconnect_delay
        .saturating_mul(attempt)
        .min(config.max_reconnect_delay)
}

/// Open a connection and wire it into the session
async fn establish(shared: &Arc<SessionShared>, generation: u64) -> Result<(), RealtimeError> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let connection = shared.connector.connect(events_tx).await?;

    {
        let mut state = shared.state.write().expect("session lock poisoned");
        if state.generation != generation {
            // A disconnect raced the handshake; this connection is orphaned.
            connection.close();
            return Err(RealtimeError::connection("connection superseded"));
        }
        state.status = SessionStatus::Connected;
        state.attempt = 0;
        *shared.connection.write().expect("session lock poisoned") = Some(connection.clone());
    }
    shared.status_tx.send_replace(SessionStatus::Connected);
    info!("[Session] Connected");

    tokio::spawn(event_loop(shared.clone(), events_rx, generation));

    // Drain queued requests, then (re)issue every wire subscription once.
    shared.registry.merge_pending();
    for topic in shared.registry.topics() {
        if let Err(e) = connection.subscribe(&topic) {
            warn!("[Session] Subscribe for {} failed: {}", topic, e);
        }
    }

    fire_connect(shared);

    let identity = shared
        .state
        .read()
        .expect("session lock poisoned")
        .identity;
    if let Some(user_id) = identity {
        schedule_announce(shared.clone(), generation, user_id);
    }
    Ok(())
}

/// Announce identity after the settle delay, once per successful connect
fn schedule_announce(shared: Arc<SessionShared>, generation: u64, user_id: UserId) {
    tokio::spawn(async move {
        tokio::time::sleep(shared.config.connect_settle_delay).await;
        {
            let state = shared.state.read().expect("session lock poisoned");
            if state.generation != generation || state.status != SessionStatus::Connected {
                return;
            }
        }
        let connection = shared
            .connection
            .read()
            .expect("session lock poisoned")
            .clone();
        let Some(connection) = connection else { return };
        let command = OutboundCommand::connect_for(user_id);
        match connection.send(command.destination(), command.body()) {
            Ok(()) => debug!("[Session] Announced identity for user {}", user_id),
            Err(e) => warn!("[Session] Identity announcement failed: {}", e),
        }
    });
}

/// Consume transport events for one connection
async fn event_loop(
    shared: Arc<SessionShared>,
    mut events: TransportEventReceiver,
    generation: u64,
) {
    loop {
        match events.recv().await {
            Some(TransportEvent::Frame(frame)) => shared.registry.dispatch(frame),
            Some(TransportEvent::Error { message }) => {
                let error = RealtimeError::connection(message);
                warn!("[Session] Transport error: {}", error);
                fire_error(&shared, &error);
            }
            Some(TransportEvent::Closed { reason }) => {
                handle_drop(&shared, generation, reason);
                return;
            }
            None => {
                handle_drop(&shared, generation, None);
                return;
            }
        }
    }
}

/// React to a mid-session connection drop
fn handle_drop(shared: &Arc<SessionShared>, generation: u64, reason: Option<String>) {
    {
        let mut state = shared.state.write().expect("session lock poisoned");
        if state.generation != generation {
            // Explicit disconnect or a newer connection owns the session.
            return;
        }
        state.status = SessionStatus::Connecting;
        *shared.connection.write().expect("session lock poisoned") = None;
    }
    shared.status_tx.send_replace(SessionStatus::Connecting);
    match reason {
        Some(reason) => warn!("[Session] Connection lost: {}", reason),
        None => warn!("[Session] Connection lost"),
    }
    fire_disconnect(shared);
    spawn_reconnect(shared.clone(), generation);
}

fn spawn_reconnect(shared: Arc<SessionShared>, generation: u64) {
    tokio::spawn(async move {
        reconnect_loop(shared, generation).await;
    });
}

/// Retry the connection with linear backoff up to the attempt bound
async fn reconnect_loop(shared: Arc<SessionShared>, generation: u64) {
    loop {
        enum Step {
            GiveUp,
            Retry { attempt: u32, delay: Duration },
        }

        let step = {
            let mut state = shared.state.write().expect("session lock poisoned");
            if state.generation != generation {
                return;
            }
            state.attempt += 1;
            if state.attempt > shared.config.max_reconnect_attempts {
                state.status = SessionStatus::Disconnected;
                Step::GiveUp
            } else {
                Step::Retry {
                    attempt: state.attempt,
                    delay: backoff_delay(&shared.config, state.attempt),
                }
            }
        };

        match step {
            Step::GiveUp => {
                shared
                    .status_tx
                    .send_replace(SessionStatus::Disconnected);
                let error = RealtimeError::connection("max reconnect attempts reached");
                warn!("[Session] Reconnect abandoned: {}", error);
                fire_error(&shared, &error);
                return;
            }
            Step::Retry { attempt, delay } => {
                info!(
                    "[Session] Reconnecting in {:?} (attempt {}/{})",
                    delay, attempt, shared.config.max_reconnect_attempts
                );
                tokio::time::sleep(delay).await;
                if shared
                    .state
                    .read()
                    .expect("session lock poisoned")
                    .generation
                    != generation
                {
                    return;
                }
                match establish(&shared, generation).await {
                    Ok(()) => return,
                    Err(error) => {
                        warn!("[Session] Reconnect attempt {} failed: {}", attempt, error);
                        fire_error(&shared, &error);
                    }
                }
            }
        }
    }
}

fn fire_connect(shared: &Arc<SessionShared>) {
    let callback = shared
        .callbacks
        .read()
        .expect("session lock poisoned")
        .on_connect
        .clone();
    if let Some(callback) = callback {
        callback();
    }
}

fn fire_disconnect(shared: &Arc<SessionShared>) {
    let callback = shared
        .callbacks
        .read()
        .expect("session lock poisoned")
        .on_disconnect
        .clone();
    if let Some(callback) = callback {
        callback();
    }
}

fn fire_error(shared: &Arc<SessionShared>, error: &RealtimeError) {
    let callback = shared
        .callbacks
        .read()
        .expect("session lock poisoned")
        .on_error
        .clone();
    if let Some(callback) = callback {
        callback(error);
    }
}
