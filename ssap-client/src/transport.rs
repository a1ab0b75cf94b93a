//! Frame-level transport abstraction
//!
//! The session layer never touches a socket directly. It asks a [`Connector`]
//! for a fresh duplex pair of [`Frame`] sink and stream, so the same code runs
//! against a real TV and against the in-memory peer used in tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};

use crate::error::{Result, TransportError};

/// A single WebSocket frame as seen by the session layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// JSON-encoded SSAP message
    Text(String),
    /// Heartbeat probe
    Ping(Vec<u8>),
    /// Heartbeat acknowledgement
    Pong(Vec<u8>),
    /// Orderly shutdown of the connection
    Close,
}

/// Outbound half of a connection
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;

/// Inbound half of a connection. The stream ends when the link is gone.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame>> + Send>>;

/// Opens connections to a TV
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a new connection and split it into its two halves
    async fn connect(&self) -> Result<(FrameSink, FrameStream)>;

    /// Human-readable description of the endpoint, used in logs
    fn describe(&self) -> String;
}
