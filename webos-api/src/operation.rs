use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::capability::Capability;
use crate::error::ApiError;

/// Base trait for all SSAP operations
///
/// An operation ties a [`Capability`] to typed request and response data.
/// The default payload handling covers every operation whose request and
/// response map directly onto JSON objects.
pub trait SsapOperation {
    /// The request type for this operation, must be serializable
    type Request: Serialize;

    /// The response type for this operation, must be deserializable
    type Response: DeserializeOwned;

    /// The capability this operation invokes
    const CAPABILITY: Capability;

    /// Build the JSON payload sent alongside the capability URI
    ///
    /// Requests that serialize to `null` or to an empty object are sent
    /// without a payload.
    fn build_payload(request: &Self::Request) -> Result<Option<Value>, ApiError> {
        let value = serde_json::to_value(request).map_err(|e| ApiError::Encode(e.to_string()))?;

        Ok(match &value {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            _ => Some(value),
        })
    }

    /// Parse the payload of the TV's response
    ///
    /// A missing payload is treated as an empty object.
    fn parse_response(payload: &Value) -> Result<Self::Response, ApiError> {
        let payload = if payload.is_null() {
            Value::Object(Map::new())
        } else {
            payload.clone()
        };

        serde_json::from_value(payload).map_err(|e| ApiError::Parse {
            capability: Self::CAPABILITY.name(),
            reason: e.to_string(),
        })
    }
}

/// Operations the TV keeps answering after the first response
///
/// Every event pushed for a subscription has the same shape as the
/// operation's one-shot response.
pub trait Subscribable: SsapOperation<Request = ()> {}
