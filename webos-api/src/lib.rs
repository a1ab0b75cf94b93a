//! High-level SSAP API for LG webOS TVs
//!
//! This crate describes what can be asked of a TV, independent of how the
//! request travels. Each [`SsapOperation`] names a [`Capability`] and converts
//! between typed Rust values and the JSON payloads carried by SSAP messages.
//!
//! ```rust
//! use webos_api::operations::{SetVolumeOperation, SetVolumeRequest};
//! use webos_api::SsapOperation;
//!
//! let payload = SetVolumeOperation::build_payload(&SetVolumeRequest { level: 55 }).unwrap();
//! assert_eq!(SetVolumeOperation::CAPABILITY.uri(), "ssap://audio/setVolume");
//! assert_eq!(payload.unwrap()["volume"], 55);
//! ```

pub mod capability;
pub mod error;
pub mod operation;
pub mod operations;
pub mod pairing;
pub mod types;

pub use capability::Capability;
pub use error::{ApiError, Result};
pub use operation::{SsapOperation, Subscribable};
pub use types::{Acknowledgement, App, Volume};
