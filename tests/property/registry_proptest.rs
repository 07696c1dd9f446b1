//! Property-based tests for subscription single-slot semantics

use bloom_client::realtime::session::RealtimeSession;
use bloom_client::shared::{RealtimeConfig, Topic};
use bloom_client::testing::MockConnector;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Subscribe(usize),
    Unsubscribe(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize).prop_map(Op::Subscribe),
        (0..3usize).prop_map(Op::Unsubscribe),
    ]
}

fn topics() -> [Topic; 3] {
    [Topic::chat(1), Topic::chat(2), Topic::Presence]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Rapid subscribe/resubscribe/unsubscribe interleavings never leave
    /// more than one live subscription per topic, and the wire state
    /// always agrees with the registry.
    #[test]
    fn test_at_most_one_live_subscription_per_topic(
        ops in proptest::collection::vec(op_strategy(), 1..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        runtime.block_on(async move {
            let connector = Arc::new(MockConnector::new());
            let config = RealtimeConfig::builder()
                .reconnect_delay(Duration::from_millis(1))
                .connect_settle_delay(Duration::from_millis(1))
                .build()
                .expect("config");
            let session = RealtimeSession::with_connector(config, connector.clone());
            session.connect().await.expect("connect");

            for op in &ops {
                match op {
                    Op::Subscribe(index) => {
                        session
                            .subscribe(topics()[*index].clone(), Arc::new(|_frame| {}))
                            .await
                            .expect("subscribe");
                    }
                    Op::Unsubscribe(index) => session.unsubscribe(&topics()[*index]),
                }

                let connection = connector.last_connection().expect("connection");
                let counts = connection.live_subscription_counts();
                for topic in topics() {
                    let wire_name = topic.as_wire_name();
                    let live = counts.get(&wire_name).copied().unwrap_or(0);
                    prop_assert!(
                        live == 0 || live == 1,
                        "{} has {} live wire subscriptions",
                        wire_name,
                        live
                    );
                    prop_assert_eq!(live == 1, session.registry().is_subscribed(&wire_name));
                }
            }
            Ok(())
        })?;
    }
}
