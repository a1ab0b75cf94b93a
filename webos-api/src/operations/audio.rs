//! Volume control

use serde::Serialize;

use crate::capability::Capability;
use crate::operation::{SsapOperation, Subscribable};
use crate::types::{Acknowledgement, Volume};

/// Get the current volume
pub struct GetVolumeOperation;

impl SsapOperation for GetVolumeOperation {
    type Request = ();
    type Response = Volume;

    const CAPABILITY: Capability = Capability::GetVolume;
}

impl Subscribable for GetVolumeOperation {}

/// Set the absolute volume. The level is passed through unchanged.
pub struct SetVolumeOperation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SetVolumeRequest {
    #[serde(rename = "volume")]
    pub level: i32,
}

impl SsapOperation for SetVolumeOperation {
    type Request = SetVolumeRequest;
    type Response = Acknowledgement;

    const CAPABILITY: Capability = Capability::SetVolume;
}
