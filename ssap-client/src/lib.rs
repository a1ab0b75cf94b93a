//! Private SSAP transport for LG webOS TV communication
//!
//! This crate provides the wire-level pieces of the SSAP protocol: the JSON
//! request and response messages, a frame-level [`Connector`] abstraction, and
//! a WebSocket implementation of it for talking to a TV on port 3000.
//!
//! Correlation of responses, subscriptions, pairing and reconnection live in
//! the session crate; this crate only moves frames.

mod error;
mod message;
mod transport;
mod websocket;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use error::{Result, TransportError};
pub use message::{Request, RequestKind, Response, ResponseKind};
pub use transport::{Connector, Frame, FrameSink, FrameStream};
pub use websocket::{WebSocketConnector, SSAP_PORT};
