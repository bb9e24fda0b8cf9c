use router_core::RegistryError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LifecycleError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Registration of {service} failed: {source}")]
    RegistrationFailure {
        service: String,
        #[source]
        source: RegistryError,
    },

    #[error("Deregistration of {service_id} failed: {source}")]
    DeregistrationFailure {
        service_id: String,
        #[source]
        source: RegistryError,
    },
}
