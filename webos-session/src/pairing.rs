//! Registration handshake
//!
//! The TV answers a `register` request in one of two ways. A key it already
//! knows is acknowledged with a single `registered` reply. Otherwise it first
//! replies that a prompt is on screen and, once the user accepts, sends a
//! second message on the same id carrying a freshly issued key.

use std::time::Duration;

use ssap_client::{RequestKind, ResponseKind};
use tracing::{debug, info};
use webos_api::pairing::{RegisterPayload, RegisteredPayload};

use crate::connection::Connection;
use crate::error::{PairingError, SessionError, TvError};

/// Register with the TV using `key`, empty when unpaired
///
/// Returns the key to use from now on. On failure the error carries `key`
/// unchanged, so a previously valid key is never lost. `deadline` must leave
/// room for a human to accept the prompt.
pub async fn register(
    connection: &Connection,
    key: &str,
    deadline: Duration,
) -> Result<String, PairingError> {
    let fail = |source| PairingError {
        key: key.to_string(),
        source,
    };

    let payload = serde_json::to_value(RegisterPayload::new(key))
        .map_err(|e| fail(SessionError::Encode(e.to_string())))?;

    let handshake = exchange(connection, key, payload);

    match tokio::time::timeout(deadline, handshake).await {
        Ok(Ok(new_key)) => Ok(new_key),
        Ok(Err(source)) => Err(fail(source)),
        Err(_) => Err(fail(SessionError::Timeout(deadline))),
    }
}

async fn exchange(
    connection: &Connection,
    key: &str,
    payload: serde_json::Value,
) -> Result<String, SessionError> {
    let mut pending = connection
        .request(RequestKind::Register, None, Some(payload))
        .await?;

    let first = pending.recv().await?;
    match first.kind {
        ResponseKind::Registered => {
            debug!("TV accepted the existing pairing key");
            return Ok(key.to_string());
        }
        ResponseKind::Error => {
            return Err(SessionError::Tv(TvError::new(
                first.error_message().unwrap_or_default(),
            )));
        }
        ResponseKind::Response => {
            info!("Waiting for the pairing prompt to be accepted on the TV");
        }
    }

    // The issued key arrives on the same id once the prompt is accepted.
    let second = pending.recv().await?;
    if let Some(message) = second.error_message() {
        return Err(SessionError::Tv(TvError::new(message)));
    }

    let registered: RegisteredPayload = serde_json::from_value(second.payload)
        .map_err(|e| SessionError::Protocol(format!("invalid registration reply: {}", e)))?;

    match registered.client_key {
        Some(new_key) if !new_key.is_empty() => Ok(new_key),
        _ => Err(SessionError::Protocol(
            "registration reply carries no client-key".to_string(),
        )),
    }
}
