//! # webOS SDK - control LG webOS TVs
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use webos_sdk::{Config, LgTv};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), webos_sdk::SdkError> {
//!     let config = Config::load("config.json")?;
//!     let tv = LgTv::connect(config.host()?, config.tv.key.clone())?
//!         .with_app_names(config.app_names());
//!     tv.wait_until_connected(Duration::from_secs(10)).await?;
//!
//!     tv.set_app(config.resolve_app("Netflix")).await?;
//!     tv.set_volume(12).await?;
//!
//!     let _volume = tv
//!         .subscribe_volume(|event| match event {
//!             Ok(volume) => println!("volume {}", volume.level),
//!             Err(e) => eprintln!("volume event failed: {}", e),
//!         })
//!         .await;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! webos-sdk (LgTv, Config, pairing)
//!     ↓
//! webos-session (supervisor, correlator, subscriptions, keepalive)
//!     ↓
//! webos-api (typed SSAP operations)      ssap-client (wire format, WebSocket)
//! ```
//!
//! The TV's pairing key is issued once and must be persisted by the caller:
//! read it back with [`LgTv::pairing_key`] or obtain it with [`pair`].

mod config;
mod error;
mod pairing;
mod tv;

pub use config::{BrokerConfig, Config, TvConfig, DEFAULT_BROKER_PORT, ENV_HOST, ENV_KEY, ENV_MAC};
pub use error::{Result, SdkError};
pub use pairing::{pair, pair_with, DEFAULT_PAIRING_TIMEOUT};
pub use tv::LgTv;

// Re-export the types callers handle directly
pub use webos_api::{App, Volume};
pub use webos_session::{SessionConfig, SessionError, SessionState, Subscription};
pub use wol::{wake, MacAddress};
