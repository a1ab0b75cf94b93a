//! SSAP wire messages
//!
//! Every exchange with the TV is a JSON object carrying a numeric `id`. The
//! client picks the id; the TV echoes it on every reply, including each event
//! it pushes for a subscription.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TransportError};

/// What an outbound message asks the TV to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// One-shot call answered by a single response
    Request,
    /// Long-lived stream of responses on the same id
    Subscribe,
    /// Pairing handshake
    Register,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Request => "request",
            RequestKind::Subscribe => "subscribe",
            RequestKind::Register => "register",
        }
    }
}

/// Outbound SSAP message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Request {
    pub fn new(id: u64, kind: RequestKind) -> Self {
        Self {
            id,
            kind,
            uri: None,
            payload: None,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_payload(mut self, payload: Option<Value>) -> Self {
        self.payload = payload;
        self
    }

    /// Serialize into the text frame sent to the TV
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TransportError::Encode(e.to_string()))
    }
}

/// How the TV classified a reply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// The TV rejected the request; see [`Response::error`]
    Error,
    /// Pairing accepted
    Registered,
    /// Ordinary reply or subscription event. Unrecognized types land here.
    #[default]
    #[serde(other)]
    Response,
}

/// Inbound SSAP message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Echo of the request id. Unsolicited messages may omit it.
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(rename = "type", default)]
    pub kind: ResponseKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl Response {
    /// Build an ordinary reply
    pub fn new(id: u64, payload: Value) -> Self {
        Self {
            id: Some(id),
            kind: ResponseKind::Response,
            error: None,
            payload,
        }
    }

    /// Build an error reply
    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            kind: ResponseKind::Error,
            error: Some(message.into()),
            payload: Value::Null,
        }
    }

    /// Build a pairing acknowledgement
    pub fn registered(id: u64, payload: Value) -> Self {
        Self {
            id: Some(id),
            kind: ResponseKind::Registered,
            error: None,
            payload,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == ResponseKind::Error
    }

    /// Error text reported by the TV, if this is an error reply
    pub fn error_message(&self) -> Option<&str> {
        if self.is_error() {
            Some(self.error.as_deref().unwrap_or("unknown error"))
        } else {
            None
        }
    }

    /// Parse a text frame received from the TV
    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| TransportError::Decode(e.to_string()))
    }

    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TransportError::Encode(e.to_string()))
    }
}
