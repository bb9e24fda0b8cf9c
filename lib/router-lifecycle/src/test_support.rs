//! Registry stub shared by the unit tests

use async_trait::async_trait;
use router_core::{RegistryClient, RegistryError, ServiceMap, ServiceRegistration};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Registry stub that fails a configured number of calls per operation
#[derive(Default)]
pub struct FlakyRegistry {
    register_failures: AtomicUsize,
    deregister_failures: AtomicUsize,
    register_delay: Option<Duration>,
    pub registered_ids: Mutex<Vec<String>>,
    pub registrations: Mutex<Vec<ServiceRegistration>>,
    pub deregister_calls: AtomicUsize,
}

impl FlakyRegistry {
    pub fn failing(register_failures: usize, deregister_failures: usize) -> Self {
        Self {
            register_failures: AtomicUsize::new(register_failures),
            deregister_failures: AtomicUsize::new(deregister_failures),
            ..Default::default()
        }
    }

    /// Hold every registration call open for `delay` before answering
    pub fn with_register_delay(mut self, delay: Duration) -> Self {
        self.register_delay = Some(delay);
        self
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RegistryClient for FlakyRegistry {
    async fn list_services(&self) -> std::result::Result<ServiceMap, RegistryError> {
        Ok(ServiceMap::new())
    }

    async fn register_service(
        &self,
        registration: &ServiceRegistration,
    ) -> std::result::Result<(), RegistryError> {
        self.registered_ids.lock().unwrap().push(registration.id.clone());
        if let Some(delay) = self.register_delay {
            tokio::time::sleep(delay).await;
        }
        if Self::take_failure(&self.register_failures) {
            return Err(RegistryError::Status {
                status: 500,
                body: "agent unavailable".to_string(),
            });
        }
        self.registrations.lock().unwrap().push(registration.clone());
        Ok(())
    }

    async fn deregister_service(
        &self,
        _service_id: &str,
    ) -> std::result::Result<(), RegistryError> {
        self.deregister_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1)).await;
        if Self::take_failure(&self.deregister_failures) {
            return Err(RegistryError::Transport("connection reset".to_string()));
        }
        Ok(())
    }
}
