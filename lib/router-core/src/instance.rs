//! Service instances as reported by the registry
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Snapshot of the registry's service list, keyed by instance id.
pub type ServiceMap = BTreeMap<String, ServiceInstance>;

/// A single backend instance known to the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceInstance {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ServiceInstance {
    pub fn new(id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            service: String::new(),
            address: address.into(),
            port,
            tags: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// `address:port` of the instance
    pub fn authority(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Payload sent to the registry when registering an instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
}

impl From<ServiceRegistration> for ServiceInstance {
    fn from(reg: ServiceRegistration) -> Self {
        Self {
            id: reg.id,
            service: reg.name,
            address: reg.address,
            port: reg.port,
            tags: reg.tags,
        }
    }
}

/// Registration identity of the local process.
///
/// `service_id` is `None` while unregistered. Once assigned it is reused
/// across attempts of the same registration and cleared when registration
/// fails or deregistration settles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub service_id: Option<String>,
    pub name: String,
    pub address: String,
    pub port: u16,
}

impl RegistrationRecord {
    pub fn new(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            service_id: None,
            name: name.into(),
            address: address.into(),
            port,
        }
    }

    /// Wire payload for `id`, tagged with the service name.
    pub fn registration(&self, id: impl Into<String>) -> ServiceRegistration {
        ServiceRegistration {
            id: id.into(),
            name: self.name.clone(),
            address: self.address.clone(),
            port: self.port,
            tags: vec![self.name.clone()],
        }
    }

    /// Wire payload for the currently held id
    pub fn to_registration(&self) -> Option<ServiceRegistration> {
        self.service_id.as_deref().map(|id| self.registration(id))
    }
}
