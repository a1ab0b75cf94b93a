//! Registration handshake payloads
//!
//! Every connection starts with a `register` request carrying a manifest of
//! permission scopes and the client key from a previous pairing. A valid key
//! is acknowledged straight away; an empty or unknown key makes the TV show a
//! prompt, and the key it issues arrives once the user accepts.

use serde::{Deserialize, Serialize};

/// Pairing flow that asks the user to confirm on screen
pub const PAIRING_TYPE: &str = "PROMPT";

/// Permission scopes requested on every registration
pub const PERMISSIONS: [&str; 22] = [
    "CONTROL_AUDIO",
    "CONTROL_INPUT_MEDIA_PLAYBACK",
    "CONTROL_INPUT_TEXT",
    "CONTROL_INPUT_TV",
    "CONTROL_MOUSE_AND_KEYBOARD",
    "CONTROL_POWER",
    "LAUNCH",
    "READ_CURRENT_CHANNEL",
    "READ_INPUT_DEVICE_LIST",
    "READ_INSTALLED_APPS",
    "READ_LGE_SDX",
    "READ_LGE_TV_INPUT_EVENTS",
    "READ_NOTIFICATIONS",
    "READ_RUNNING_APPS",
    "READ_TV_CHANNEL_LIST",
    "READ_TV_CURRENT_TIME",
    "READ_UPDATE_INFO",
    "SEARCH",
    "TEST_SECURE",
    "UPDATE_FROM_REMOTE_APP",
    "WRITE_NOTIFICATION_TOAST",
    "WRITE_SETTINGS",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub permissions: Vec<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            permissions: PERMISSIONS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Payload of the `register` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayload {
    #[serde(rename = "pairingType")]
    pub pairing_type: String,
    pub manifest: Manifest,
    #[serde(rename = "client-key")]
    pub client_key: String,
}

impl RegisterPayload {
    /// Registration with the fixed manifest. `key` is empty when unpaired.
    pub fn new(key: &str) -> Self {
        Self {
            pairing_type: PAIRING_TYPE.to_string(),
            manifest: Manifest::default(),
            client_key: key.to_string(),
        }
    }
}

/// Payload of the `registered` reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredPayload {
    #[serde(rename = "client-key", default)]
    pub client_key: Option<String>,
}
