//! Backend instance lifecycle
//!
//! Registers the local instance with the service registry on startup and
//! deregisters it, with a bounded number of immediate retries, whenever the
//! host process reports a shutdown trigger.

pub mod error;
pub mod manager;
pub mod shutdown;

#[cfg(test)]
mod test_support;

pub use error::{LifecycleError, Result};
pub use manager::{LifecycleManager, LifecycleState, DEFAULT_DEREGISTER_RETRIES};
pub use shutdown::{
    register_or_shutdown, wait_for_interrupt, ShutdownCoordinator, ShutdownHook, ShutdownTrigger,
};
