//! SSAP operations grouped by the TV service that implements them

pub mod application_manager;
pub mod audio;
pub mod system;

pub use application_manager::{GetForegroundAppOperation, LaunchAppOperation, LaunchAppRequest, ListAppsOperation};
pub use audio::{GetVolumeOperation, SetVolumeOperation, SetVolumeRequest};
pub use system::TurnOffOperation;
