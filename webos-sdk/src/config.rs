//! Configuration file for tools driving a single TV
//!
//! The file is JSON:
//!
//! ```json
//! {
//!   "tv": { "host": "192.168.1.20", "mac": "a8:23:22:ad:be:c7", "key": "..." },
//!   "apps": { "Netflix": "netflix", "YouTube": "youtube.leanback.v4" },
//!   "broker_host": "localhost",
//!   "broker_port": 1883,
//!   "topic_power": "home/tv/power",
//!   "topic_input": "home/tv/input",
//!   "topic_volume": "home/tv/volume"
//! }
//! ```
//!
//! The broker and topic keys are only read by the message-bus bridge.
//!
//! Unknown fields are ignored, so files written for other tools sharing the
//! same TV keep loading.

use std::collections::{BTreeMap, HashMap};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use wol::MacAddress;

use crate::error::{Result, SdkError};

/// Environment variable overriding [`TvConfig::host`]
pub const ENV_HOST: &str = "WEBOS_TV_HOST";
/// Environment variable overriding [`TvConfig::mac`]
pub const ENV_MAC: &str = "WEBOS_TV_MAC";
/// Environment variable overriding [`TvConfig::key`]
pub const ENV_KEY: &str = "WEBOS_TV_KEY";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tv: TvConfig,

    /// Friendly app names mapped to app ids
    #[serde(default)]
    pub apps: BTreeMap<String, String>,

    #[serde(flatten)]
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TvConfig {
    /// Hostname or IP address
    #[serde(default)]
    pub host: String,

    /// MAC address, needed only for Wake-on-LAN
    #[serde(default)]
    pub mac: String,

    /// Pairing key, empty until the TV has issued one
    #[serde(default)]
    pub key: String,
}

/// Message broker connection and the topics bridged to the TV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(rename = "broker_host", default, skip_serializing_if = "String::is_empty")]
    pub host: String,

    #[serde(
        rename = "broker_port",
        default = "default_broker_port",
        skip_serializing_if = "is_default_broker_port"
    )]
    pub port: u16,

    /// Accepts `on` and `off`; carries the TV's power state
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic_power: String,

    /// Accepts a configured app name; carries the foreground app
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic_input: String,

    /// Accepts a level; carries the current volume
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub topic_volume: String,
}

pub const DEFAULT_BROKER_PORT: u16 = 1883;

fn default_broker_port() -> u16 {
    DEFAULT_BROKER_PORT
}

fn is_default_broker_port(port: &u16) -> bool {
    *port == DEFAULT_BROKER_PORT
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_BROKER_PORT,
            topic_power: String::new(),
            topic_input: String::new(),
            topic_volume: String::new(),
        }
    }
}

impl BrokerConfig {
    /// The configured broker host, or an error if none is set
    pub fn host(&self) -> Result<&str> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(SdkError::Config("No broker host configured".to_string()));
        }
        Ok(host)
    }

    /// Topic carrying the newline-separated list of configured app names
    pub fn topic_app_names(&self) -> Option<String> {
        if self.topic_input.is_empty() {
            return None;
        }
        Some(format!("{}/values", self.topic_input.trim_end_matches('/')))
    }
}

impl Config {
    /// `<platform config dir>/webos-sdk/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("webos-sdk").join("config.json"))
    }

    /// Read the file at `path` and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut config = Self::from_json(&content)
            .map_err(|e| SdkError::Config(format!("{} in {}", e, path.display())))?;
        config.apply_env_overrides();

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| SdkError::Config(format!("Invalid configuration: {}", e)))
    }

    /// Write the configuration to `path`, creating parent directories
    ///
    /// The file holds the pairing key, so it is made readable by the owner only.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_error = |e: std::io::Error| SdkError::Config(format!("Failed to write {}: {}", path.display(), e));

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SdkError::Config(format!("Failed to encode configuration: {}", e)))?;
        fs::write(path, content).map_err(io_error)?;

        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(io_error)?;

        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.tv.host = host;
        }
        if let Some(mac) = lookup(ENV_MAC) {
            self.tv.mac = mac;
        }
        if let Some(key) = lookup(ENV_KEY) {
            self.tv.key = key;
        }
    }

    /// The configured host, or an error if none is set
    pub fn host(&self) -> Result<&str> {
        let host = self.tv.host.trim();
        if host.is_empty() {
            return Err(SdkError::Config("No TV host configured".to_string()));
        }
        Ok(host)
    }

    pub fn mac_address(&self) -> Result<MacAddress> {
        if self.tv.mac.trim().is_empty() {
            return Err(SdkError::Config("No TV MAC address configured".to_string()));
        }
        Ok(self.tv.mac.parse()?)
    }

    /// Resolve a friendly app name to its id
    ///
    /// Names match case-insensitively. Anything that is not a configured name
    /// is taken to be an id already and returned unchanged.
    pub fn resolve_app<'a>(&'a self, name_or_id: &'a str) -> &'a str {
        self.app_id_for_name(name_or_id).unwrap_or(name_or_id)
    }

    pub fn app_id_for_name(&self, name: &str) -> Option<&str> {
        self.apps
            .iter()
            .find(|(configured, _)| configured.eq_ignore_ascii_case(name))
            .map(|(_, id)| id.as_str())
    }

    pub fn app_name_for_id(&self, id: &str) -> Option<&str> {
        self.apps
            .iter()
            .find(|(_, configured)| configured.as_str() == id)
            .map(|(name, _)| name.as_str())
    }

    /// Configured app names in sorted order
    pub fn sorted_app_names(&self) -> Vec<&str> {
        self.apps.keys().map(String::as_str).collect()
    }

    /// App ids mapped to friendly names, as taken by [`crate::LgTv::with_app_names`]
    pub fn app_names(&self) -> HashMap<String, String> {
        self.apps
            .iter()
            .map(|(name, id)| (id.clone(), name.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "broker_host": "localhost",
        "broker_port": 1883,
        "tv": { "host": "192.168.1.20", "mac": "A8:23:22:AD:BE:C7", "key": "abc123" },
        "topic_power": "tv/power",
        "topic_input": "tv/input",
        "topic_volume": "tv/volume",
        "apps": { "Netflix": "netflix", "YouTube": "youtube.leanback.v4" }
    }"#;

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let config = Config::from_json(
            r#"{ "tv": { "host": "192.168.1.20", "key": "abc123", "model": "OLED55" }, "catbus": true }"#,
        )
        .unwrap();
        assert_eq!(config.tv.host, "192.168.1.20");
        assert_eq!(config.tv.key, "abc123");
        assert!(config.apps.is_empty());
    }

    #[test]
    fn test_parse_broker_section() {
        let config = Config::from_json(SAMPLE).unwrap();
        assert_eq!(config.broker.host().unwrap(), "localhost");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.topic_power, "tv/power");
        assert_eq!(config.broker.topic_input, "tv/input");
        assert_eq!(config.broker.topic_volume, "tv/volume");
        assert_eq!(config.broker.topic_app_names().as_deref(), Some("tv/input/values"));
    }

    #[test]
    fn test_broker_defaults() {
        let config = Config::from_json(r#"{ "broker_host": "mqtt.local" }"#).unwrap();
        assert_eq!(config.broker.port, DEFAULT_BROKER_PORT);
        assert_eq!(config.broker.topic_app_names(), None);

        assert!(Config::default().broker.host().is_err());

        let json = serde_json::to_value(Config::default()).unwrap();
        assert!(json.get("broker_port").is_none());
        assert!(json.get("topic_power").is_none());
    }

    #[test]
    fn test_sorted_app_names() {
        let mut config = Config::from_json(SAMPLE).unwrap();
        config.apps.insert("Amazon".to_string(), "amazon".to_string());
        assert_eq!(config.sorted_app_names(), vec!["Amazon", "Netflix", "YouTube"]);
    }

    #[test]
    fn test_missing_sections_default() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.broker.port, DEFAULT_BROKER_PORT);
        assert!(config.host().is_err());
        assert!(config.mac_address().is_err());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(Config::from_json("{ tv: "), Err(SdkError::Config(_))));
    }

    #[test]
    fn test_app_lookup() {
        let config = Config::from_json(SAMPLE).unwrap();

        assert_eq!(config.app_id_for_name("netflix"), Some("netflix"));
        assert_eq!(config.app_id_for_name("YOUTUBE"), Some("youtube.leanback.v4"));
        assert_eq!(config.app_id_for_name("Hulu"), None);

        assert_eq!(config.app_name_for_id("youtube.leanback.v4"), Some("YouTube"));
        assert_eq!(config.app_name_for_id("hulu"), None);

        assert_eq!(config.resolve_app("YouTube"), "youtube.leanback.v4");
        assert_eq!(config.resolve_app("com.webos.app.hdmi1"), "com.webos.app.hdmi1");

        let names = config.app_names();
        assert_eq!(names.get("netflix").map(String::as_str), Some("Netflix"));
    }

    #[test]
    fn test_mac_address() {
        let config = Config::from_json(SAMPLE).unwrap();
        let mac = config.mac_address().unwrap();
        assert_eq!(mac.to_string(), "a8:23:22:ad:be:c7");

        let mut bad = config.clone();
        bad.tv.mac = "a8:23:22".to_string();
        assert!(matches!(bad.mac_address(), Err(SdkError::WakeOnLan(_))));
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::from_json(SAMPLE).unwrap();
        config.apply_overrides(|name| match name {
            ENV_HOST => Some("lgwebostv.local".to_string()),
            ENV_KEY => Some("fresh".to_string()),
            _ => None,
        });

        assert_eq!(config.tv.host, "lgwebostv.local");
        assert_eq!(config.tv.key, "fresh");
        assert_eq!(config.tv.mac, "A8:23:22:AD:BE:C7");
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("webos-sdk-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.json");

        let mut config = Config::from_json(SAMPLE).unwrap();
        config.tv.key = "issued-key".to_string();
        config.save(&path).unwrap();

        let loaded: Config = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);

        #[cfg(unix)]
        {
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/webos-sdk/config.json");
        assert!(matches!(result, Err(SdkError::Config(_))));
    }
}
