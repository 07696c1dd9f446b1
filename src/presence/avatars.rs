//! Profile Picture Cache
//!
//! Resolves a user's current avatar URL from whichever source wrote last:
//! bulk REST seeding (list screens embed avatar URLs in their payloads)
//! or the live profile-update feed.
//!
//! # Known limitation
//!
//! The backend attaches no version or timestamp to either source, so a
//! bulk seed racing a live update resolves last-writer-wins. A stale REST
//! payload landing after a fresh live update can briefly win; the next
//! update corrects it. This is an accepted race, not a consistency
//! guarantee.

use crate::realtime::registry::FrameHandler;
use crate::realtime::session::RealtimeSession;
use crate::shared::event::ProfileUpdate;
use crate::shared::{Topic, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// userId -> avatar URL cache fed by REST seeds and live updates
pub struct ProfilePictureCache {
    session: RealtimeSession,
    pictures: Arc<RwLock<HashMap<UserId, Option<String>>>>,
    subscribed: Arc<AtomicBool>,
    retry_task: Mutex<Option<JoinHandle<()>>>,
}

impl ProfilePictureCache {
    /// Create a cache over a session
    pub fn new(session: RealtimeSession) -> Self {
        Self {
            session,
            pictures: Arc::new(RwLock::new(HashMap::new())),
            subscribed: Arc::new(AtomicBool::new(false)),
            retry_task: Mutex::new(None),
        }
    }

    /// Arm the live profile-update subscription
    ///
    /// Retries at the configured interval until the session reports
    /// Connected, then subscribes once.
    pub fn start(&self) {
        let task = tokio::spawn(subscribe_when_ready(
            self.session.clone(),
            self.pictures.clone(),
            self.subscribed.clone(),
        ));
        *self.retry_task.lock().expect("avatar lock poisoned") = Some(task);
    }

    /// Bulk-merge avatar URLs from a REST-loaded screen
    ///
    /// Overwrites entries for the given keys; unrelated keys are never
    /// removed.
    pub fn seed_many(&self, entries: impl IntoIterator<Item = (UserId, Option<String>)>) {
        let mut pictures = self.pictures.write().expect("avatar lock poisoned");
        for (user_id, url) in entries {
            pictures.insert(user_id, url);
        }
        debug!("[Avatars] Seeded ({} users known)", pictures.len());
    }

    /// Apply one live profile update; last writer wins
    pub fn apply(&self, update: ProfileUpdate) {
        let mut pictures = self.pictures.write().expect("avatar lock poisoned");
        pictures.insert(update.user_id, update.profile_picture_url);
    }

    /// The current avatar URL for a user
    ///
    /// `None` for users never seen and for users whose picture was
    /// explicitly cleared; both render as "no picture".
    pub fn get(&self, user_id: UserId) -> Option<String> {
        self.pictures
            .read()
            .expect("avatar lock poisoned")
            .get(&user_id)
            .cloned()
            .flatten()
    }

    /// Number of users with a cached entry
    pub fn len(&self) -> usize {
        self.pictures.read().expect("avatar lock poisoned").len()
    }

    /// Whether the cache has no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release the live subscription and stop any pending subscribe retry
    pub fn shutdown(&self) {
        if let Some(task) = self
            .retry_task
            .lock()
            .expect("avatar lock poisoned")
            .take()
        {
            task.abort();
        }
        if self.subscribed.swap(false, Ordering::SeqCst) {
            self.session.unsubscribe(&Topic::ProfileUpdate);
            info!("[Avatars] Unsubscribed");
        }
    }
}

/// Retry the live subscribe at a bounded interval until the session is
/// connected and the subscribe succeeds
async fn subscribe_when_ready(
    session: RealtimeSession,
    pictures: Arc<RwLock<HashMap<UserId, Option<String>>>>,
    subscribed: Arc<AtomicBool>,
) {
    let interval = session.config().presence_retry_interval;
    loop {
        if session.is_connected() {
            let pictures = pictures.clone();
            let handler: FrameHandler = Arc::new(move |frame| {
                match frame.decode::<ProfileUpdate>() {
                    Ok(update) => {
                        debug!("[Avatars] Picture updated for user {}", update.user_id);
                        pictures
                            .write()
                            .expect("avatar lock poisoned")
                            .insert(update.user_id, update.profile_picture_url);
                    }
                    Err(error) => warn!("[Avatars] Dropping update: {}", error),
                }
            });
            match session.subscribe(Topic::ProfileUpdate, handler).await {
                Ok(()) => {
                    subscribed.store(true, Ordering::SeqCst);
                    info!("[Avatars] Subscribed to profile updates");
                    return;
                }
                Err(error) => warn!("[Avatars] Subscribe failed, retrying: {}", error),
            }
        }
        tokio::time::sleep(interval).await;
    }
}
