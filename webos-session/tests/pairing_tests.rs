//! Integration tests for the registration handshake against a scripted TV.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use ssap_client::mock::{MockConnector, MockPeer};
use ssap_client::{Connector, RequestKind, Response};
use webos_session::{register, Connection, SessionConfig, SessionError, TvError};

const DEADLINE: Duration = Duration::from_secs(60);

async fn connect() -> (Arc<Connection>, MockPeer) {
    let (connector, mut listener) = MockConnector::new();
    let (sink, stream) = connector.connect().await.expect("Failed to connect");
    let connection = Connection::open(1, sink, stream, &SessionConfig::default());
    let tv = listener.accept().await.expect("No peer");
    (connection, tv)
}

fn spawn_register(connection: &Arc<Connection>, key: &str) -> tokio::task::JoinHandle<Result<String, webos_session::PairingError>> {
    let connection = Arc::clone(connection);
    let key = key.to_string();
    tokio::spawn(async move { register(&connection, &key, DEADLINE).await })
}

#[tokio::test]
async fn test_register_request_shape() {
    let (connection, mut tv) = connect().await;
    let _pairing = spawn_register(&connection, "stored-key");

    let request = tv.recv_request().await.expect("No register request");
    assert_eq!(request.kind, RequestKind::Register);
    assert_eq!(request.uri, None);

    let payload = request.payload.expect("Register carries a payload");
    assert_eq!(payload["pairingType"], "PROMPT");
    assert_eq!(payload["client-key"], "stored-key");
    assert_eq!(payload["manifest"]["permissions"].as_array().unwrap().len(), 22);
}

#[tokio::test]
async fn test_empty_key_immediately_registered() {
    let (connection, mut tv) = connect().await;
    let pairing = spawn_register(&connection, "");

    let request = tv.recv_request().await.unwrap();
    tv.send_response(&Response::registered(request.id, json!({ "client-key": "ignored" })));

    let key = pairing.await.unwrap().expect("Pairing should succeed");
    assert_eq!(key, "");
}

#[tokio::test]
async fn test_valid_key_is_kept() {
    let (connection, mut tv) = connect().await;
    let pairing = spawn_register(&connection, "f00dfeed");

    let request = tv.recv_request().await.unwrap();
    tv.send_response(&Response::registered(request.id, json!({ "client-key": "f00dfeed" })));

    assert_eq!(pairing.await.unwrap().unwrap(), "f00dfeed");
}

#[tokio::test]
async fn test_error_response_returns_original_key() {
    let (connection, mut tv) = connect().await;
    let pairing = spawn_register(&connection, "old-key");

    let request = tv.recv_request().await.unwrap();
    tv.respond_error(request.id, "403 User denied access");

    let error = pairing.await.unwrap().expect_err("Pairing should fail");
    assert_eq!(error.key, "old-key");
    assert_eq!(error.source, SessionError::Tv(TvError::new("403 User denied access")));
    assert!(connection.is_open());
}

#[tokio::test]
async fn test_prompt_flow_issues_new_key() {
    let (connection, mut tv) = connect().await;
    let pairing = spawn_register(&connection, "");

    let request = tv.recv_request().await.unwrap();
    tv.respond(request.id, json!({ "pairingType": "PROMPT", "returnValue": true }));
    tokio::task::yield_now().await;
    assert!(!pairing.is_finished());

    tv.send_response(&Response::registered(request.id, json!({ "client-key": "new-key" })));
    assert_eq!(pairing.await.unwrap().unwrap(), "new-key");
    assert_eq!(connection.correlator().pending(), 0);
}

#[tokio::test]
async fn test_prompt_rejected_returns_original_key() {
    let (connection, mut tv) = connect().await;
    let pairing = spawn_register(&connection, "old-key");

    let request = tv.recv_request().await.unwrap();
    tv.respond(request.id, json!({ "pairingType": "PROMPT" }));
    tv.respond_error(request.id, "403 User rejected pairing");

    let error = pairing.await.unwrap().unwrap_err();
    assert_eq!(error.key, "old-key");
    assert!(matches!(error.source, SessionError::Tv(_)));
}

#[tokio::test]
async fn test_second_reply_without_key_is_protocol_error() {
    let (connection, mut tv) = connect().await;
    let pairing = spawn_register(&connection, "");

    let request = tv.recv_request().await.unwrap();
    tv.respond(request.id, json!({ "pairingType": "PROMPT" }));
    tv.respond(request.id, json!({ "returnValue": true }));

    let error = pairing.await.unwrap().unwrap_err();
    assert_eq!(error.key, "");
    assert!(matches!(error.source, SessionError::Protocol(_)));
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_prompt_times_out() {
    let (connection, mut tv) = connect().await;

    let pairing = tokio::spawn({
        let connection = Arc::clone(&connection);
        async move { register(&connection, "old-key", Duration::from_secs(30)).await }
    });

    let request = tv.recv_request().await.unwrap();
    tv.respond(request.id, json!({ "pairingType": "PROMPT" }));

    let error = pairing.await.unwrap().unwrap_err();
    assert_eq!(error.key, "old-key");
    assert_eq!(error.source, SessionError::Timeout(Duration::from_secs(30)));
}

#[tokio::test]
async fn test_connection_lost_during_pairing() {
    let (connection, mut tv) = connect().await;
    let pairing = spawn_register(&connection, "old-key");

    tv.recv_request().await.unwrap();
    tv.close();

    let error = pairing.await.unwrap().unwrap_err();
    assert_eq!(error.key, "old-key");
    assert_eq!(error.source, SessionError::NotConnected);
}
