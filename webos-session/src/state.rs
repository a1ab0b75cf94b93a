use std::fmt;

/// Lifecycle of a supervised session
///
/// ```text
/// Disconnected -> Connecting -> Paired -> Active
///       ^                                   |
///       +------------- failure -------------+
/// ```
///
/// `Stopped` is terminal and only reached through an explicit shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// Registration succeeded; subscriptions are being re-issued
    Paired,
    /// Calls and subscriptions are served
    Active,
    Stopped,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Paired => "paired",
            SessionState::Active => "active",
            SessionState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
