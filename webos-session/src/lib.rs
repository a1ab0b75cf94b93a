//! Supervised SSAP sessions for LG webOS TVs
//!
//! This crate turns a raw frame transport from `ssap-client` into a
//! long-lived, self-healing session:
//!
//! - **Correlation**: concurrent calls share one connection; replies are
//!   routed back by request id, in whatever order they arrive.
//! - **Subscriptions**: event streams survive reconnects and are dispatched
//!   to callbacks one event at a time.
//! - **Pairing**: every connection registers with the TV, keeping the last
//!   valid key when registration fails.
//! - **Liveness**: WebSocket heartbeats detect links that died silently.
//! - **Supervision**: failed connections are retried forever after a fixed
//!   delay.
//!
//! # Example
//!
//! ```rust,ignore
//! use ssap_client::WebSocketConnector;
//! use webos_session::{Session, SessionConfig};
//!
//! let session = Session::spawn(WebSocketConnector::new("192.168.1.20"), SessionConfig::default(), "")?;
//! session.wait_until_active(Duration::from_secs(60)).await?;
//!
//! let subscription = session
//!     .subscribe("ssap://audio/getVolume", None, |event| println!("{event:?}"))
//!     .await;
//!
//! session.call("ssap://audio/setVolume", Some(json!({ "volume": 20 }))).await?;
//! subscription.cancel();
//! ```

mod config;
mod connection;
mod correlator;
mod error;
mod keepalive;
mod pairing;
mod registry;
mod session;
mod state;

pub use config::SessionConfig;
pub use connection::{Connection, Disconnect};
pub use correlator::{Correlator, PendingCall};
pub use error::{PairingError, Result, SessionError, TvError};
pub use pairing::register;
pub use registry::{Subscription, SubscriptionEvent};
pub use session::Session;
pub use state::SessionState;
