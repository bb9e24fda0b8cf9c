//! Registry stub shared by the unit tests

use async_trait::async_trait;
use router_core::{RegistryClient, RegistryError, ServiceInstance, ServiceMap, ServiceRegistration};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn instance(id: &str, tag: &str) -> ServiceInstance {
    ServiceInstance::new(id, "127.0.0.1", 4000).with_tag(tag)
}

pub fn service_map(instances: Vec<ServiceInstance>) -> ServiceMap {
    instances.into_iter().map(|i| (i.id.clone(), i)).collect()
}

/// Registry stub that counts list calls and can fail or stall on demand.
pub struct StubRegistry {
    services: Mutex<ServiceMap>,
    delay: Option<Duration>,
    failures_left: AtomicUsize,
    list_calls: AtomicUsize,
}

impl StubRegistry {
    pub fn with_services(instances: Vec<ServiceInstance>) -> Self {
        Self {
            services: Mutex::new(service_map(instances)),
            delay: None,
            failures_left: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_list_calls(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RegistryClient for StubRegistry {
    async fn list_services(&self) -> Result<ServiceMap, RegistryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RegistryError::Transport("connection refused".to_string()));
        }
        Ok(self.services.lock().unwrap().clone())
    }

    async fn register_service(
        &self,
        _registration: &ServiceRegistration,
    ) -> Result<(), RegistryError> {
        Ok(())
    }

    async fn deregister_service(&self, _service_id: &str) -> Result<(), RegistryError> {
        Ok(())
    }
}
