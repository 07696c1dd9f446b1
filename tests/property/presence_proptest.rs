//! Property-based tests for presence reconciliation

use bloom_client::presence::PresenceTracker;
use bloom_client::realtime::session::RealtimeSession;
use bloom_client::rest::PresenceApi;
use bloom_client::shared::event::PresenceUpdate;
use bloom_client::shared::RealtimeConfig;
use bloom_client::testing::MockConnector;
use proptest::prelude::*;
use std::sync::Arc;

fn tracker() -> PresenceTracker {
    let config = RealtimeConfig::builder().build().expect("config");
    let session = RealtimeSession::with_connector(config.clone(), Arc::new(MockConnector::new()));
    PresenceTracker::new(session, PresenceApi::new(&config))
}

proptest! {
    /// Applying every event twice yields the same set as applying it once.
    #[test]
    fn test_duplicate_events_do_not_change_state(
        seed in proptest::collection::vec((0i64..20, any::<bool>()), 0..20),
        updates in proptest::collection::vec((0i64..20, any::<bool>()), 0..40),
    ) {
        let once = tracker();
        let twice = tracker();
        once.seed_snapshot(seed.clone());
        twice.seed_snapshot(seed);

        for (user_id, is_online) in &updates {
            let update = PresenceUpdate {
                user_id: *user_id,
                is_online: *is_online,
            };
            once.apply(update);
            twice.apply(update);
            twice.apply(update);
        }

        for user_id in 0i64..20 {
            prop_assert_eq!(once.is_online(user_id), twice.is_online(user_id));
        }
    }

    /// Events commute per key with last-writer-wins: the final state of a
    /// key depends only on its last event.
    #[test]
    fn test_last_event_per_key_wins(
        updates in proptest::collection::vec((0i64..10, any::<bool>()), 1..40),
    ) {
        let tracker = tracker();
        for (user_id, is_online) in &updates {
            tracker.apply(PresenceUpdate {
                user_id: *user_id,
                is_online: *is_online,
            });
        }
        for user_id in 0i64..10 {
            let expected = updates
                .iter()
                .rev()
                .find(|(id, _)| *id == user_id)
                .map(|(_, is_online)| *is_online)
                .unwrap_or(false);
            prop_assert_eq!(tracker.is_online(user_id), expected);
        }
    }

    /// A user never seen in the snapshot or an event is offline.
    #[test]
    fn test_never_seen_user_is_offline(user_id in 100i64..1000) {
        let tracker = tracker();
        tracker.seed_snapshot((0i64..20).map(|id| (id, true)));
        prop_assert!(!tracker.is_online(user_id));
    }
}
