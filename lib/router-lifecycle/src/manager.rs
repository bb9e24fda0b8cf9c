//! Registration state machine for a backend instance

use crate::error::{LifecycleError, Result};
use router_core::{RegistrationRecord, RegistryClient};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Deregistration attempts made when a shutdown trigger fires
pub const DEFAULT_DEREGISTER_RETRIES: u32 = 3;

/// Where the instance stands with the registry.
///
/// `Registering` and `Deregistering` are transient. `Deregistered` behaves
/// like `Unregistered`: the id is gone and a new `register` starts over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Unregistered,
    Registering,
    Registered,
    Deregistering,
    Deregistered,
}

/// LifecycleManager owns the registration identity of this process.
///
/// Register and deregister calls are serialised, so triggers firing close
/// together never deregister the same id twice or race a registration.
pub struct LifecycleManager {
    registry: Arc<dyn RegistryClient>,
    record: AsyncMutex<RegistrationRecord>,
    state: Mutex<LifecycleState>,
}

impl LifecycleManager {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        name: impl Into<String>,
        address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            registry,
            record: AsyncMutex::new(RegistrationRecord::new(name, address, port)),
            state: Mutex::new(LifecycleState::Unregistered),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Id currently registered (or being registered), if any
    pub async fn service_id(&self) -> Option<String> {
        self.record.lock().await.service_id.clone()
    }

    /// Register this instance with the registry.
    ///
    /// An id is generated only when none is held. On failure the id is
    /// cleared so the next call generates a fresh one. Never retries.
    pub async fn register(&self) -> Result<()> {
        let mut record = self.record.lock().await;
        let service_id = record
            .service_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        self.set_state(LifecycleState::Registering);

        let registration = record.registration(service_id.clone());

        match self.registry.register_service(&registration).await {
            Ok(()) => {
                self.set_state(LifecycleState::Registered);
                info!(
                    service = %record.name,
                    %service_id,
                    "{} registered successfully",
                    record.name
                );
                Ok(())
            }
            Err(source) => {
                record.service_id = None;
                self.set_state(LifecycleState::Unregistered);
                let err = LifecycleError::RegistrationFailure {
                    service: record.name.clone(),
                    source,
                };
                warn!(error = %err, "registration failed");
                Err(err)
            }
        }
    }

    /// Deregister with the default retry budget
    pub async fn deregister(&self) -> u32 {
        self.deregister_with_retries(DEFAULT_DEREGISTER_RETRIES).await
    }

    /// Deregister, making at most `retries` attempts back to back.
    ///
    /// Does nothing when no id is held. Whether the registry accepts the
    /// request or every attempt fails, the id is cleared and the state ends
    /// up `Deregistered`; failures are logged, never returned. Returns the
    /// number of attempts made.
    pub async fn deregister_with_retries(&self, retries: u32) -> u32 {
        let mut record = self.record.lock().await;
        let Some(service_id) = record.service_id.clone() else {
            return 0;
        };
        self.set_state(LifecycleState::Deregistering);

        let mut attempts = 0;
        let mut deregistered = false;
        // Retries are immediate; there is no backoff between attempts.
        while attempts < retries {
            attempts += 1;
            info!("Deregistering service {} with id {}", record.name, service_id);
            match self.registry.deregister_service(&service_id).await {
                Ok(()) => {
                    deregistered = true;
                    break;
                }
                Err(source) => {
                    let err = LifecycleError::DeregistrationFailure {
                        service_id: service_id.clone(),
                        source,
                    };
                    warn!(
                        attempt = attempts,
                        retries_left = retries - attempts,
                        error = %err,
                        "deregistration attempt failed"
                    );
                }
            }
        }

        if !deregistered {
            warn!(%service_id, attempts, "giving up on deregistration");
        }
        record.service_id = None;
        self.set_state(LifecycleState::Deregistered);
        attempts
    }
}
