//! Error types for the session layer

use std::time::Duration;
use thiserror::Error;

/// An error reported by the TV in reply to a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TvError {
    message: String,
}

impl TvError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced to callers of a session
///
/// Transport failures never reach a caller directly: they tear the
/// connection down and every affected call observes [`SessionError::NotConnected`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No paired connection is available, or it went away mid-call
    #[error("not connected to TV")]
    NotConnected,

    /// The TV rejected the request. The connection stays up.
    #[error("TV returned an error: {0}")]
    Tv(#[from] TvError),

    /// The caller's deadline elapsed. The connection stays up.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The TV replied with something that does not fit the exchange
    #[error("unexpected response from TV: {0}")]
    Protocol(String),

    /// The request could not be serialized
    #[error("could not encode request: {0}")]
    Encode(String),

    /// Invalid session configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Pairing failed. Carries the key that was offered so it is never lost.
#[derive(Debug, Clone, Error)]
#[error("pairing failed: {source}")]
pub struct PairingError {
    /// The key passed to the registration, unchanged
    pub key: String,
    #[source]
    pub source: SessionError,
}

pub type Result<T> = std::result::Result<T, SessionError>;
