use std::fmt;

/// A remote procedure exposed by the TV over SSAP
///
/// Each capability is addressed by an `ssap://` URI. Some of them can also be
/// subscribed to, in which case the TV pushes a new response on the same
/// request id every time the underlying value changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Installed applications
    ListApps,
    /// Application currently in the foreground (subscribable)
    GetForegroundApp,
    /// Launch an application by id
    Launch,
    /// Current volume and mute state (subscribable)
    GetVolume,
    /// Set the absolute volume
    SetVolume,
    /// Power the TV off
    TurnOff,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::ListApps,
        Capability::GetForegroundApp,
        Capability::Launch,
        Capability::GetVolume,
        Capability::SetVolume,
        Capability::TurnOff,
    ];

    pub fn uri(&self) -> &'static str {
        match self {
            Capability::ListApps => "ssap://com.webos.applicationManager/listApps",
            Capability::GetForegroundApp => {
                "ssap://com.webos.applicationManager/getForegroundAppInfo"
            }
            Capability::Launch => "ssap://system.launcher/launch",
            Capability::GetVolume => "ssap://audio/getVolume",
            Capability::SetVolume => "ssap://audio/setVolume",
            Capability::TurnOff => "ssap://system/turnOff",
        }
    }

    /// Short name, the last segment of the URI
    pub fn name(&self) -> &'static str {
        match self {
            Capability::ListApps => "listApps",
            Capability::GetForegroundApp => "getForegroundAppInfo",
            Capability::Launch => "launch",
            Capability::GetVolume => "getVolume",
            Capability::SetVolume => "setVolume",
            Capability::TurnOff => "turnOff",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Capability> {
        Self::ALL.into_iter().find(|c| c.uri() == uri)
    }

    /// Whether the TV accepts a `subscribe` request for this capability
    pub fn is_subscribable(&self) -> bool {
        matches!(self, Capability::GetForegroundApp | Capability::GetVolume)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}
