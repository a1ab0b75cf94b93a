//! Property-based tests for response correlation
//!
//! Replies are routed purely by id, so any interleaving of concurrent calls
//! and any arrival order of their replies must resolve every call with its
//! own payload.

use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use ssap_client::mock::MockConnector;
use ssap_client::Connector;
use webos_session::{Connection, SessionConfig};

// ============================================================================
// Test Helpers
// ============================================================================

/// Strategy for a random reply order over `1..max` concurrent calls
fn reply_order_strategy(max: usize) -> impl Strategy<Value = Vec<usize>> {
    (1..max).prop_flat_map(|n| Just((0..n).collect::<Vec<usize>>()).prop_shuffle())
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Out-of-order replies
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// *For any* number of concurrent calls and *any* order in which the TV
    /// answers them, each call resolves with the payload addressed to it.
    #[test]
    fn prop_calls_resolve_with_their_own_reply(order in reply_order_strategy(24)) {
        let results = runtime().block_on(async {
            let (connector, mut listener) = MockConnector::new();
            let (sink, stream) = connector.connect().await.unwrap();
            let connection = Connection::open(1, sink, stream, &SessionConfig::default());
            let mut tv = listener.accept().await.unwrap();

            let calls: Vec<_> = (0..order.len())
                .map(|n| {
                    let connection = Arc::clone(&connection);
                    tokio::spawn(async move {
                        let uri = format!("ssap://test/call{}", n);
                        let payload = connection
                            .call(&uri, None, Duration::from_secs(5))
                            .await
                            .unwrap();
                        (uri, payload)
                    })
                })
                .collect();

            let mut requests = Vec::new();
            for _ in 0..order.len() {
                requests.push(tv.recv_request().await.unwrap());
            }
            for &index in &order {
                let request = &requests[index];
                tv.respond(request.id, json!({ "uri": request.uri }));
            }

            let mut results = Vec::new();
            for call in calls {
                results.push(call.await.unwrap());
            }
            results
        });

        prop_assert_eq!(results.len(), order.len());
        for (uri, payload) in results {
            prop_assert_eq!(payload["uri"].as_str(), Some(uri.as_str()));
        }
    }

    /// *For any* arrival order, ids handed out within one connection are
    /// unique and start at zero.
    #[test]
    fn prop_ids_are_unique_per_connection(order in reply_order_strategy(16)) {
        let ids = runtime().block_on(async {
            let (connector, mut listener) = MockConnector::new();
            let (sink, stream) = connector.connect().await.unwrap();
            let connection = Connection::open(1, sink, stream, &SessionConfig::default());
            let mut tv = listener.accept().await.unwrap();

            for _ in &order {
                let connection = Arc::clone(&connection);
                tokio::spawn(async move {
                    let _ = connection.call("ssap://audio/getVolume", None, Duration::from_secs(5)).await;
                });
            }

            let mut ids = Vec::new();
            for _ in &order {
                ids.push(tv.recv_request().await.unwrap().id);
            }
            ids
        });

        let mut sorted = ids.clone();
        sorted.sort_unstable();
        let expected: Vec<u64> = (0..order.len() as u64).collect();
        prop_assert_eq!(sorted, expected);
    }
}
