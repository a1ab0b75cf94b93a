use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Session error: {0}")]
    Session(#[from] webos_session::SessionError),

    #[error("API error: {0}")]
    Api(#[from] webos_api::ApiError),

    #[error("Pairing error: {0}")]
    Pairing(#[from] webos_session::PairingError),

    #[error("Transport error: {0}")]
    Transport(#[from] ssap_client::TransportError),

    #[error("Wake-on-LAN error: {0}")]
    WakeOnLan(#[from] wol::WolError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SdkError {
    /// Whether the error means the TV is currently unreachable
    pub fn is_not_connected(&self) -> bool {
        matches!(self, SdkError::Session(webos_session::SessionError::NotConnected))
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
