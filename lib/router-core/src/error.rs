use thiserror::Error;

/// Failure talking to the service registry.
///
/// Cloneable so that one outcome of a shared registry query can be handed to
/// every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry transport error: {0}")]
    Transport(String),

    #[error("Registry returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Registry response could not be decoded: {0}")]
    Decode(String),

    #[error("Service not registered: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RegistryError::Decode(err.to_string())
        } else {
            RegistryError::Transport(err.to_string())
        }
    }
}
