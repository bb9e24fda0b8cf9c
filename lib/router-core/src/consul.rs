//! Consul agent HTTP client

use crate::error::RegistryError;
use crate::registry::RegistryClient;
use crate::{ServiceMap, ServiceRegistration};
use async_trait::async_trait;
use tracing::debug;

/// Default agent address when `CONSUL_HTTP_ADDR` is not set
pub const DEFAULT_CONSUL_ADDR: &str = "http://127.0.0.1:8500";

/// ConsulClient talks to the local Consul agent's service endpoints.
#[derive(Clone)]
pub struct ConsulClient {
    http: reqwest::Client,
    base_url: String,
}

impl ConsulClient {
    /// Create a client for the agent at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let base_url = if base_url.starts_with("http://") || base_url.starts_with("https://") {
            base_url
        } else {
            format!("http://{}", base_url)
        };

        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RegistryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RegistryError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

#[async_trait]
impl RegistryClient for ConsulClient {
    async fn list_services(&self) -> Result<ServiceMap, RegistryError> {
        let response = self.http.get(self.url("/v1/agent/services")).send().await?;
        let services: ServiceMap = Self::check(response).await?.json().await?;
        debug!("Consul agent reported {} services", services.len());
        Ok(services)
    }

    async fn register_service(
        &self,
        registration: &ServiceRegistration,
    ) -> Result<(), RegistryError> {
        let response = self
            .http
            .put(self.url("/v1/agent/service/register"))
            .json(registration)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn deregister_service(&self, service_id: &str) -> Result<(), RegistryError> {
        let response = self
            .http
            .put(self.url(&format!("/v1/agent/service/deregister/{}", service_id)))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
