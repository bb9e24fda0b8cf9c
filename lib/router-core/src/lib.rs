//! Core service registry functionality
//!
//! This library provides:
//! - Service instance and registration types shared by the gateway and backends
//! - The `RegistryClient` contract with Consul and in-memory implementations

pub mod consul;
pub mod error;
pub mod instance;
pub mod registry;

pub use consul::ConsulClient;
pub use error::{CoreError, RegistryError};
pub use instance::{RegistrationRecord, ServiceInstance, ServiceMap, ServiceRegistration};
pub use registry::{InMemoryRegistry, RegistryClient};
