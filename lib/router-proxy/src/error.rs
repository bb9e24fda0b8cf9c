use router_core::RegistryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Reasons a request could not be handed to an upstream.
///
/// Clients only ever see a generic 502; the variant is for logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("No route matches path: {0}")]
    UnroutedRequest(String),

    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("No instance tagged for service: {0}")]
    NoHealthyInstance(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),
}

impl From<RegistryError> for DispatchError {
    fn from(err: RegistryError) -> Self {
        DispatchError::RegistryUnavailable(err.to_string())
    }
}
