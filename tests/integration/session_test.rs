//! Transport session integration tests
//!
//! Drives the session over the in-memory transport: reconnection with
//! bounded attempts, re-subscription and identity re-announcement after a
//! drop, and deterministic teardown.

use crate::common::{init_tracing, mock_session, wait_until, within};
use bloom_client::realtime::registry::FrameHandler;
use bloom_client::realtime::session::SessionStatus;
use bloom_client::shared::{RealtimeError, Topic};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn noop_handler() -> FrameHandler {
    Arc::new(|_frame| {})
}

fn counting_handler(counter: Arc<AtomicUsize>) -> FrameHandler {
    Arc::new(move |_frame| {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn test_reconnect_resubscribes_and_reannounces_once() {
    init_tracing();
    let (session, connector) = mock_session();
    session.set_identity(42);
    session.connect().await.unwrap();
    session
        .subscribe(Topic::chat(7), noop_handler())
        .await
        .unwrap();
    session
        .subscribe(Topic::Presence, noop_handler())
        .await
        .unwrap();

    let first = connector.last_connection().unwrap();
    assert!(wait_until(WAIT, || first.sent_to("/app/user.connect").len() == 1).await);

    first.drop_connection("network flap");
    assert!(
        wait_until(WAIT, || {
            connector.connection_count() == 2 && session.is_connected()
        })
        .await
    );

    // Every previously active topic is re-subscribed on the new connection.
    let second = connector.last_connection().unwrap();
    let mut topics = second.subscribes();
    topics.sort();
    assert_eq!(topics, vec!["/topic/chat.7", "/topic/user.presence"]);

    // Identity is re-announced exactly once per reconnect.
    assert!(wait_until(WAIT, || second.sent_to("/app/user.connect").len() == 1).await);
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(second.sent_to("/app/user.connect").len(), 1);

    // Each announcement carries a fresh session token.
    let first_token = first.sent_to("/app/user.connect")[0]["sessionId"].clone();
    let second_token = second.sent_to("/app/user.connect")[0]["sessionId"].clone();
    assert_ne!(first_token, second_token);
}

#[tokio::test]
async fn test_gives_up_after_max_attempts_with_one_terminal_error() {
    init_tracing();
    let (session, connector) = mock_session();
    connector.fail_times(10, "refused");

    let errors = Arc::new(AtomicUsize::new(0));
    let terminal = Arc::new(AtomicUsize::new(0));
    {
        let errors = errors.clone();
        let terminal = terminal.clone();
        session.on_error(move |error| {
            errors.fetch_add(1, Ordering::SeqCst);
            if let RealtimeError::Connection { message } = error {
                if message.contains("max reconnect attempts") {
                    terminal.fetch_add(1, Ordering::SeqCst);
                }
            }
        });
    }

    assert!(session.connect().await.is_err());
    assert!(wait_until(WAIT, || session.status() == SessionStatus::Disconnected).await);

    // Initial attempt plus three bounded retries, then nothing further.
    assert!(wait_until(WAIT, || connector.attempts() == 4).await);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(connector.attempts(), 4);

    assert_eq!(terminal.load(Ordering::SeqCst), 1);
    // Four failed attempts plus the terminal error.
    assert_eq!(errors.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let (session, connector) = mock_session();
    connector.fail_times(2, "refused");

    assert!(session.connect().await.is_err());
    assert!(wait_until(WAIT, || session.is_connected()).await);

    // One failed initial attempt, one failed retry, one successful retry.
    assert_eq!(connector.attempts(), 3);
    assert_eq!(connector.connection_count(), 1);
}

#[tokio::test]
async fn test_concurrent_connect_shares_one_attempt() {
    let (session, connector) = mock_session();
    connector.set_connect_delay(Duration::from_millis(50));

    let racing = {
        let session = session.clone();
        tokio::spawn(async move { session.connect().await })
    };
    assert!(wait_until(WAIT, || session.status() == SessionStatus::Connecting).await);

    // A second connect call while the handshake is in flight awaits the
    // same attempt instead of opening another connection.
    within(WAIT, session.connect()).await.unwrap();
    racing.await.unwrap().unwrap();
    assert_eq!(connector.attempts(), 1);
}

#[tokio::test]
async fn test_disconnect_releases_subscriptions_before_close() {
    let (session, connector) = mock_session();
    session.connect().await.unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    session
        .subscribe(Topic::chat(1), counting_handler(fired.clone()))
        .await
        .unwrap();
    session
        .subscribe(Topic::Presence, noop_handler())
        .await
        .unwrap();

    let connection = connector.last_connection().unwrap();
    session.disconnect();

    let mut released = connection.unsubscribes();
    released.sort();
    assert_eq!(released, vec!["/topic/chat.1", "/topic/user.presence"]);
    assert!(connection.is_closed());
    assert!(session.registry().is_empty());
    assert_eq!(session.status(), SessionStatus::Disconnected);

    // A frame arriving after disconnect reaches no handler.
    connection.deliver_json("/topic/chat.1", serde_json::json!({"content": "late"}));
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disconnect_cancels_pending_reconnect() {
    let (session, connector) = mock_session();
    session.connect().await.unwrap();

    let connection = connector.last_connection().unwrap();
    connector.fail_times(10, "refused");
    connection.drop_connection("network flap");
    assert!(wait_until(WAIT, || session.status() == SessionStatus::Connecting).await);

    session.disconnect();
    let attempts_at_disconnect = connector.attempts();
    tokio::time::sleep(Duration::from_millis(60)).await;

    // No retry fires once the session was explicitly closed.
    assert_eq!(connector.attempts(), attempts_at_disconnect);
    assert_eq!(session.status(), SessionStatus::Disconnected);
}

#[tokio::test]
async fn test_no_announce_without_identity() {
    let (session, connector) = mock_session();
    session.connect().await.unwrap();

    tokio::time::sleep(Duration::from_millis(25)).await;
    let connection = connector.last_connection().unwrap();
    assert!(connection.sent_to("/app/user.connect").is_empty());
}

#[tokio::test]
async fn test_transport_error_without_drop_keeps_session_alive() {
    let (session, connector) = mock_session();
    let errors = Arc::new(AtomicUsize::new(0));
    {
        let errors = errors.clone();
        session.on_error(move |_error| {
            errors.fetch_add(1, Ordering::SeqCst);
        });
    }
    session.connect().await.unwrap();

    let connection = connector.last_connection().unwrap();
    connection.emit_error("hiccup");

    assert!(wait_until(WAIT, || errors.load(Ordering::SeqCst) == 1).await);
    assert!(session.is_connected());
    assert_eq!(connector.connection_count(), 1);
}

#[tokio::test]
async fn test_disconnect_callback_fires_on_drop() {
    let (session, connector) = mock_session();
    let disconnects = Arc::new(AtomicUsize::new(0));
    {
        let disconnects = disconnects.clone();
        session.on_disconnect(move || {
            disconnects.fetch_add(1, Ordering::SeqCst);
        });
    }
    session.connect().await.unwrap();

    connector.last_connection().unwrap().drop_connection("gone");
    assert!(wait_until(WAIT, || disconnects.load(Ordering::SeqCst) == 1).await);
}
