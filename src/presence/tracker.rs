//! Presence Reconciler
//!
//! Merges the REST-fetched online-user snapshot with the live presence
//! stream into one authoritative map, and answers `is_online` queries
//! from it.
//!
//! # Reconciliation rules
//!
//! - The snapshot seeds the map synchronously before presence is declared
//!   loaded.
//! - Live events insert or overwrite one key; a key is never removed,
//!   only flipped. Offline status comes solely from an explicit event or
//!   the snapshot, never from absence.
//! - Applying the same event twice leaves the map unchanged.
//! - A user never seen is reported offline; that is an answer, not an
//!   error.
//!
//! The live subscription is only attempted once the transport session
//! reports Connected; until then the tracker retries at a bounded
//! interval, covering the race between UI mount and transport readiness.

use crate::realtime::registry::FrameHandler;
use crate::realtime::session::RealtimeSession;
use crate::rest::PresenceApi;
use crate::shared::event::PresenceUpdate;
use crate::shared::{RealtimeError, Topic, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Online/offline state for all known users
pub struct PresenceTracker {
    session: RealtimeSession,
    api: PresenceApi,
    online: Arc<RwLock<HashMap<UserId, bool>>>,
    loaded: Arc<AtomicBool>,
    subscribed: Arc<AtomicBool>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
}

impl PresenceTracker {
    /// Create a tracker over a session and the presence REST client
    pub fn new(session: RealtimeSession, api: PresenceApi) -> Self {
        Self {
            session,
            api,
            online: Arc::new(RwLock::new(HashMap::new())),
            loaded: Arc::new(AtomicBool::new(false)),
            subscribed: Arc::new(AtomicBool::new(false)),
            retry_task: Mutex::new(None),
        }
    }

    /// Bootstrap the snapshot and arm the live subscription
    ///
    /// The snapshot is seeded before this returns. The live subscribe runs
    /// in the background, retrying at the configured interval until the
    /// session reports Connected. A bootstrap failure is returned to the
    /// caller but does not stop the live subscription from arming; the
    /// map then converges from events alone.
    pub async fn start(&self) -> Result<(), RealtimeError> {
        let bootstrap = self.api.fetch_online_ids().await;
        let result = match bootstrap {
            Ok(ids) => {
                self.seed_snapshot(ids.into_iter().map(|id| (id, true)));
                self.loaded.store(true, Ordering::SeqCst);
                info!("[Presence] Snapshot loaded");
                Ok(())
            }
            Err(error) => {
                warn!("[Presence] Bootstrap failed: {}", error);
                Err(error)
            }
        };

        let task = tokio::spawn(subscribe_when_ready(
            self.session.clone(),
            self.online.clone(),
            self.subscribed.clone(),
        ));
        *self.retry_task.lock().expect("presence lock poisoned") = Some(task);
        result
    }

    /// Seed the map from a snapshot
    ///
    /// Entries overwrite existing keys; unrelated keys are untouched.
    pub fn seed_snapshot(&self, entries: impl IntoIterator<Item = (UserId, bool)>) {
        let mut online = self.online.write().expect("presence lock poisoned");
        for (user_id, is_online) in entries {
            online.insert(user_id, is_online);
        }
        debug!("[Presence] Seeded snapshot ({} users known)", online.len());
    }

    /// Apply one live presence event
    ///
    /// Pure overwrite, so duplicate delivery is harmless.
    pub fn apply(&self, update: PresenceUpdate) {
        let mut online = self.online.write().expect("presence lock poisoned");
        online.insert(update.user_id, update.is_online);
    }

    /// Whether a user is currently online
    ///
    /// A user never seen in the snapshot or an event is offline.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.online
            .read()
            .expect("presence lock poisoned")
            .get(&user_id)
            .copied()
            .unwrap_or(false)
    }

    /// Whether the snapshot has been seeded
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Number of users currently online
    pub fn online_count(&self) -> usize {
        self.online
            .read()
            .expect("presence lock poisoned")
            .values()
            .filter(|online| **online)
            .count()
    }

    /// Release the live subscription and stop any pending subscribe retry
    pub fn shutdown(&self) {
        if let Some(task) = self
            .retry_task
            .lock()
            .expect("presence lock poisoned")
            .take()
        {
            task.abort();
        }
        if self.subscribed.swap(false, Ordering::SeqCst) {
            self.session.unsubscribe(&Topic::Presence);
            info!("[Presence] Unsubscribed");
        }
    }
}

/// Retry the live subscribe at a bounded interval until the session is
/// connected and the subscribe succeeds
async fn subscribe_when_ready(
    session: RealtimeSession,
    online: Arc<RwLock<HashMap<UserId, bool>>>,
    subscribed: Arc<AtomicBool>,
) {
    let interval = session.config().presence_retry_interval;
    loop {
        if session.is_connected() {
            let online = online.clone();
            let handler: FrameHandler = Arc::new(move |frame| {
                match frame.decode::<PresenceUpdate>() {
                    Ok(update) => {
                        debug!(
                            "[Presence] User {} is now {}",
                            update.user_id,
                            if update.is_online { "online" } else { "offline" }
                        );
                        online
                            .write()
                            .expect("presence lock poisoned")
                            .insert(update.user_id, update.is_online);
                    }
                    Err(error) => warn!("[Presence] Dropping event: {}", error),
                }
            });
            match session.subscribe(Topic::Presence, handler).await {
                Ok(()) => {
                    subscribed.store(true, Ordering::SeqCst);
                    info!("[Presence] Subscribed to live updates");
                    return;
                }
                Err(error) => warn!("[Presence] Subscribe failed, retrying: {}", error),
            }
        }
        tokio::time::sleep(interval).await;
    }
}
