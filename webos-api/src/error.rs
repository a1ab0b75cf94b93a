use thiserror::Error;

/// Errors raised while building or interpreting SSAP payloads
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be turned into a JSON payload
    #[error("Could not encode payload: {0}")]
    Encode(String),

    /// The TV answered with a payload of an unexpected shape
    #[error("Could not parse {capability} response: {reason}")]
    Parse {
        capability: &'static str,
        reason: String,
    },

    /// An operation parameter has an invalid value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;
