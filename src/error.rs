use thiserror::Error;

/// Normalized authentication and storage errors across providers.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    Protocol(String),
    #[error("Device code expired before authorization")]
    Expired,
    #[error("Authorization cancelled")]
    Cancelled,
    #[error("Credential store error: {0}")]
    Store(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("API key must not be empty")]
    InvalidKey,
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
