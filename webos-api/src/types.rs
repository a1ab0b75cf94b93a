//! Values exchanged with the TV

use serde::{Deserialize, Serialize};

/// An installed application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct App {
    /// Opaque application id, e.g. `netflix`
    pub id: String,
    /// Display name. The foreground-app capability only reports the id, so
    /// this is empty unless the app came from the app list.
    #[serde(rename = "title", default)]
    pub name: String,
}

impl App {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Volume and mute state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Volume {
    #[serde(rename = "volume")]
    pub level: i32,
    #[serde(default)]
    pub muted: bool,
}

impl Volume {
    pub const MIN: i32 = 0;
    pub const MAX: i32 = 100;

    /// Clamp a requested level to what the TV accepts
    pub fn clamp_level(level: i32) -> i32 {
        level.clamp(Self::MIN, Self::MAX)
    }
}

/// Generic reply to a command that returns nothing of interest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledgement {
    #[serde(rename = "returnValue", default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_app_uses_title_for_name() {
        let app: App = serde_json::from_value(json!({
            "id": "netflix",
            "title": "Netflix",
            "version": "5.2.1",
        }))
        .unwrap();
        assert_eq!(app, App::new("netflix").with_name("Netflix"));
    }

    #[test]
    fn test_volume_defaults_muted() {
        let volume: Volume = serde_json::from_value(json!({ "volume": 12 })).unwrap();
        assert_eq!(volume, Volume { level: 12, muted: false });
    }

    #[test]
    fn test_clamp_level() {
        assert_eq!(Volume::clamp_level(55), 55);
        assert_eq!(Volume::clamp_level(Volume::MAX), 100);
        assert_eq!(Volume::clamp_level(-5), 0);
        assert_eq!(Volume::clamp_level(150), 100);
        assert_eq!(Volume::clamp_level(i32::MIN), 0);
    }

    #[test]
    fn test_acknowledgement_from_empty_object() {
        let ack: Acknowledgement = serde_json::from_value(json!({})).unwrap();
        assert_eq!(ack.return_value, None);

        let ack: Acknowledgement = serde_json::from_value(json!({ "returnValue": true })).unwrap();
        assert_eq!(ack.return_value, Some(true));
    }
}
