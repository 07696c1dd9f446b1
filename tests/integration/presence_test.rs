//! Presence and avatar integration tests
//!
//! The REST bootstrap runs against a wiremock server; live updates flow
//! through the in-memory transport.

use crate::common::{fast_config, mock_session, mock_session_with_config, wait_until};
use bloom_client::presence::{PresenceTracker, ProfilePictureCache};
use bloom_client::rest::PresenceApi;
use bloom_client::shared::{RealtimeConfig, RealtimeError};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(2);
const PRESENCE_TOPIC: &str = "/topic/user.presence";
const PROFILE_TOPIC: &str = "/topic/user.profileUpdate";

async fn presence_server(body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/presence/online/ids"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

fn config_for(server: &MockServer) -> RealtimeConfig {
    let fast = fast_config();
    RealtimeConfig::builder()
        .api_base_url(server.uri())
        .ws_url(fast.ws_url.clone())
        .reconnect_delay(fast.reconnect_delay)
        .max_reconnect_delay(fast.max_reconnect_delay)
        .max_reconnect_attempts(fast.max_reconnect_attempts)
        .connect_settle_delay(fast.connect_settle_delay)
        .presence_retry_interval(fast.presence_retry_interval)
        .build()
        .expect("test config is valid")
}

#[tokio::test]
async fn test_bootstrap_seeds_snapshot_before_live_stream() {
    let server = presence_server(serde_json::json!({
        "success": true,
        "onlineUserIds": [1, 5]
    }))
    .await;
    let config = config_for(&server);
    let (session, connector) = mock_session_with_config(config.clone());
    session.connect().await.unwrap();

    let tracker = PresenceTracker::new(session.clone(), PresenceApi::new(&config));
    tracker.start().await.unwrap();

    // The snapshot is authoritative the moment start() returns.
    assert!(tracker.is_loaded());
    assert!(tracker.is_online(1));
    assert!(tracker.is_online(5));
    assert!(!tracker.is_online(2));

    // The live subscription arms in the background.
    assert!(
        wait_until(WAIT, || {
            connector.last_connection().map_or(false, |connection| {
                connection.subscribes().contains(&PRESENCE_TOPIC.to_string())
            })
        })
        .await
    );

    let connection = connector.last_connection().unwrap();
    connection.deliver_json(PRESENCE_TOPIC, serde_json::json!({"userId": 2, "isOnline": true}));
    assert!(wait_until(WAIT, || tracker.is_online(2)).await);
    // Snapshot entries stay intact.
    assert!(tracker.is_online(1));

    tracker.shutdown();
}

#[tokio::test]
async fn test_live_subscribe_waits_for_transport_readiness() {
    let server = presence_server(serde_json::json!({
        "success": true,
        "onlineUserIds": []
    }))
    .await;
    let config = config_for(&server);
    let (session, connector) = mock_session_with_config(config.clone());

    // Start while the transport is still down: the tracker must retry at
    // its bounded interval rather than subscribe into the void.
    let tracker = PresenceTracker::new(session.clone(), PresenceApi::new(&config));
    tracker.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(connector.attempts(), 0);

    session.connect().await.unwrap();
    assert!(
        wait_until(WAIT, || {
            connector.last_connection().map_or(false, |connection| {
                connection.subscribes().contains(&PRESENCE_TOPIC.to_string())
            })
        })
        .await
    );

    tracker.shutdown();
}

#[tokio::test]
async fn test_bootstrap_failure_is_surfaced_but_live_stream_still_arms() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/presence/online/ids"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let config = config_for(&server);
    let (session, connector) = mock_session_with_config(config.clone());
    session.connect().await.unwrap();

    let tracker = PresenceTracker::new(session.clone(), PresenceApi::new(&config));
    let result = tracker.start().await;
    assert!(matches!(result, Err(RealtimeError::Rest { .. })));
    assert!(!tracker.is_loaded());

    // The map still converges from events alone.
    assert!(
        wait_until(WAIT, || {
            connector.last_connection().map_or(false, |connection| {
                connection.subscribes().contains(&PRESENCE_TOPIC.to_string())
            })
        })
        .await
    );
    let connection = connector.last_connection().unwrap();
    connection.deliver_json(PRESENCE_TOPIC, serde_json::json!({"userId": 9, "isOnline": true}));
    assert!(wait_until(WAIT, || tracker.is_online(9)).await);

    tracker.shutdown();
}

#[tokio::test]
async fn test_shutdown_releases_presence_subscription() {
    let server = presence_server(serde_json::json!({
        "success": true,
        "onlineUserIds": []
    }))
    .await;
    let config = config_for(&server);
    let (session, connector) = mock_session_with_config(config.clone());
    session.connect().await.unwrap();

    let tracker = PresenceTracker::new(session.clone(), PresenceApi::new(&config));
    tracker.start().await.unwrap();
    assert!(
        wait_until(WAIT, || {
            session.registry().is_subscribed(PRESENCE_TOPIC)
        })
        .await
    );

    tracker.shutdown();
    let connection = connector.last_connection().unwrap();
    assert!(connection
        .unsubscribes()
        .contains(&PRESENCE_TOPIC.to_string()));
    assert!(!session.registry().is_subscribed(PRESENCE_TOPIC));
}

#[tokio::test]
async fn test_profile_updates_flow_into_cache() {
    let (session, connector) = mock_session();
    session.connect().await.unwrap();

    let cache = ProfilePictureCache::new(session.clone());
    cache.start();
    assert!(
        wait_until(WAIT, || {
            session.registry().is_subscribed(PROFILE_TOPIC)
        })
        .await
    );

    cache.seed_many([(1, Some("/uploads/a.png".to_string()))]);
    assert_eq!(cache.get(1), Some("/uploads/a.png".to_string()));

    let connection = connector.last_connection().unwrap();
    connection.deliver_json(
        PROFILE_TOPIC,
        serde_json::json!({"userId": 1, "profilePictureUrl": "/uploads/b.png"}),
    );
    assert!(
        wait_until(WAIT, || {
            cache.get(1) == Some("/uploads/b.png".to_string())
        })
        .await
    );

    // A clearing update wins over the earlier seed.
    connection.deliver_json(
        PROFILE_TOPIC,
        serde_json::json!({"userId": 1, "profilePictureUrl": null}),
    );
    assert!(wait_until(WAIT, || cache.get(1).is_none()).await);

    cache.shutdown();
    assert!(connection
        .unsubscribes()
        .contains(&PROFILE_TOPIC.to_string()));
}

#[tokio::test]
async fn test_presence_and_profile_feeds_are_independent() {
    let server = presence_server(serde_json::json!({
        "success": true,
        "onlineUserIds": [4]
    }))
    .await;
    let config = config_for(&server);
    let (session, connector) = mock_session_with_config(config.clone());
    session.connect().await.unwrap();

    let tracker = PresenceTracker::new(session.clone(), PresenceApi::new(&config));
    tracker.start().await.unwrap();
    let cache = ProfilePictureCache::new(session.clone());
    cache.start();

    assert!(
        wait_until(WAIT, || {
            session.registry().is_subscribed(PRESENCE_TOPIC)
                && session.registry().is_subscribed(PROFILE_TOPIC)
        })
        .await
    );

    // Tearing down presence leaves the avatar feed live.
    tracker.shutdown();
    assert!(!session.registry().is_subscribed(PRESENCE_TOPIC));
    assert!(session.registry().is_subscribed(PROFILE_TOPIC));

    let connection = connector.last_connection().unwrap();
    connection.deliver_json(
        PROFILE_TOPIC,
        serde_json::json!({"userId": 4, "profilePictureUrl": "/uploads/d.png"}),
    );
    assert!(
        wait_until(WAIT, || {
            cache.get(4) == Some("/uploads/d.png".to_string())
        })
        .await
    );

    cache.shutdown();
}
