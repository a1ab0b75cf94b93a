//! One-shot pairing, for obtaining a key before any session exists

use std::time::Duration;

use ssap_client::{Connector, TransportError, WebSocketConnector};
use tracing::info;
use webos_session::{register, Connection, SessionConfig};

use crate::error::Result;

/// Time a human usually needs to find the remote and accept the prompt
pub const DEFAULT_PAIRING_TIMEOUT: Duration = Duration::from_secs(60);

/// Pair with the TV at `host` and return the key to store
///
/// Pass an empty `key` to request a new one; the TV shows a prompt that
/// must be accepted within `timeout`. Unlike a [`crate::LgTv`], a failure is
/// reported instead of retried.
pub async fn pair(host: &str, key: &str, timeout: Duration) -> Result<String> {
    pair_with(&WebSocketConnector::new(host), key, timeout).await
}

pub async fn pair_with<C: Connector>(connector: &C, key: &str, timeout: Duration) -> Result<String> {
    let config = SessionConfig::default();

    let (sink, stream) = tokio::time::timeout(config.connect_timeout, connector.connect())
        .await
        .map_err(|_| TransportError::ConnectTimeout(connector.describe()))??;

    let connection = Connection::open(0, sink, stream, &config);
    info!("Pairing with {}", connector.describe());

    let outcome = register(&connection, key, timeout).await;
    connection.close().await;

    Ok(outcome?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SdkError;
    use serde_json::json;
    use ssap_client::mock::MockConnector;
    use ssap_client::{Frame, Response};
    use webos_session::SessionError;

    #[tokio::test]
    async fn test_pair_returns_issued_key() {
        let (connector, mut listener) = MockConnector::new();
        let pairing = tokio::spawn(async move { pair_with(&connector, "", DEFAULT_PAIRING_TIMEOUT).await });

        let mut tv = listener.accept().await.expect("No peer");
        let request = tv.recv_request().await.expect("No register request");
        tv.respond(request.id, json!({ "pairingType": "PROMPT" }));
        tv.send_response(&Response::registered(request.id, json!({ "client-key": "new-key" })));

        let key = pairing.await.unwrap().expect("Pairing should succeed");
        assert_eq!(key, "new-key");

        // The connection is closed once the key is known
        assert_eq!(tv.recv_frame().await, Some(Frame::Close));
    }

    #[tokio::test]
    async fn test_pair_reports_rejection() {
        let (connector, mut listener) = MockConnector::new();
        let pairing = tokio::spawn(async move { pair_with(&connector, "", DEFAULT_PAIRING_TIMEOUT).await });

        let mut tv = listener.accept().await.expect("No peer");
        let request = tv.recv_request().await.expect("No register request");
        tv.respond(request.id, json!({ "pairingType": "PROMPT" }));
        tv.respond_error(request.id, "403 User denied access");

        match pairing.await.unwrap() {
            Err(SdkError::Pairing(e)) => {
                assert_eq!(e.key, "");
                assert!(matches!(e.source, SessionError::Tv(_)));
            }
            other => panic!("Expected a pairing error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_pair_refused_connection() {
        let (connector, _listener) = MockConnector::new();
        connector.refuse_next(1);

        let result = pair_with(&connector, "", DEFAULT_PAIRING_TIMEOUT).await;
        assert!(matches!(result, Err(SdkError::Transport(_))));
    }
}
