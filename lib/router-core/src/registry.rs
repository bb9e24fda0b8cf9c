//! Service registry contract and an in-process implementation

use crate::error::RegistryError;
use crate::{ServiceInstance, ServiceMap, ServiceRegistration};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Operations the router needs from a service registry.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// List every instance currently known to the registry
    async fn list_services(&self) -> Result<ServiceMap, RegistryError>;

    /// Register (or re-register) an instance
    async fn register_service(
        &self,
        registration: &ServiceRegistration,
    ) -> Result<(), RegistryError>;

    /// Remove an instance by id
    async fn deregister_service(&self, service_id: &str) -> Result<(), RegistryError>;
}

/// InMemoryRegistry keeps registered instances in process memory.
pub struct InMemoryRegistry {
    services: Arc<RwLock<HashMap<String, ServiceInstance>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self {
            services: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert an instance directly, bypassing registration
    pub async fn insert(&self, instance: ServiceInstance) {
        let mut services = self.services.write().await;
        services.insert(instance.id.clone(), instance);
    }

    /// Get count of registered instances
    pub async fn service_count(&self) -> usize {
        let services = self.services.read().await;
        services.len()
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn list_services(&self) -> Result<ServiceMap, RegistryError> {
        let services = self.services.read().await;
        Ok(services
            .iter()
            .map(|(id, instance)| (id.clone(), instance.clone()))
            .collect())
    }

    async fn register_service(
        &self,
        registration: &ServiceRegistration,
    ) -> Result<(), RegistryError> {
        let mut services = self.services.write().await;
        services.insert(registration.id.clone(), registration.clone().into());
        debug!("Registered service: {}", registration.id);
        Ok(())
    }

    async fn deregister_service(&self, service_id: &str) -> Result<(), RegistryError> {
        let mut services = self.services.write().await;
        match services.remove(service_id) {
            Some(_) => {
                debug!("Deregistered service: {}", service_id);
                Ok(())
            }
            None => Err(RegistryError::NotFound(service_id.to_string())),
        }
    }
}
