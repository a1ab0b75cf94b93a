//! Error types for the SSAP transport

use thiserror::Error;

/// Errors that can occur on the WebSocket link to a TV
#[derive(Debug, Error)]
pub enum TransportError {
    /// The WebSocket handshake could not be completed
    #[error("could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The handshake did not finish within the allotted time
    #[error("timed out connecting to {0}")]
    ConnectTimeout(String),

    /// Error reported by the WebSocket layer on an open connection
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// The connection has been closed by either side
    #[error("connection closed")]
    Closed,

    /// An outbound message could not be serialized
    #[error("could not encode message: {0}")]
    Encode(String),

    /// An inbound text frame is not a valid SSAP message
    #[error("could not decode message: {0}")]
    Decode(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match error {
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
            other => TransportError::WebSocket(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
