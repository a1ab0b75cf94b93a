//! Mapping between broker messages and TV actions

use webos_sdk::{App, Config, Volume};

pub const POWER_ON: &str = "on";
pub const POWER_OFF: &str = "off";

/// Something a broker message asks of the TV
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PowerOn,
    PowerOff,
    LaunchApp(String),
    SetVolume(i32),
}

/// Translate a message received on `topic`
///
/// Unknown topics, app names that are not configured and payloads that do
/// not parse yield `None`. Volume levels are clamped to what the TV accepts.
pub fn action_for(config: &Config, topic: &str, payload: &[u8]) -> Option<Action> {
    let payload = std::str::from_utf8(payload).ok()?.trim();
    let broker = &config.broker;

    if topic.is_empty() {
        None
    } else if topic == broker.topic_power {
        match payload {
            POWER_ON => Some(Action::PowerOn),
            POWER_OFF => Some(Action::PowerOff),
            _ => None,
        }
    } else if topic == broker.topic_input {
        config
            .app_id_for_name(payload)
            .map(|id| Action::LaunchApp(id.to_string()))
    } else if topic == broker.topic_volume {
        payload
            .parse::<i32>()
            .ok()
            .map(|level| Action::SetVolume(Volume::clamp_level(level)))
    } else {
        None
    }
}

/// Payload announcing the foreground app: its configured name, else its id
///
/// The TV reports an empty id just before it turns off; nothing is announced
/// for that.
pub fn app_state(config: &Config, app: &App) -> Option<String> {
    if app.id.is_empty() {
        return None;
    }
    let name = config.app_name_for_id(&app.id).unwrap_or(app.id.as_str());
    Some(name.to_string())
}

pub fn volume_state(volume: &Volume) -> String {
    volume.level.to_string()
}

pub fn power_state(on: bool) -> &'static str {
    if on {
        POWER_ON
    } else {
        POWER_OFF
    }
}

/// Newline-separated configured app names, sorted
pub fn app_names(config: &Config) -> String {
    config.sorted_app_names().join("\n")
}
