//! Shutdown hooks invoked by the host process on exit, fault or interrupt

use crate::manager::LifecycleManager;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, warn};

/// Why the process is shutting down
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// The server finished normally
    Exit,
    /// An unrecoverable error or panic
    Fault,
    /// Ctrl-C / SIGINT
    Interrupt,
}

impl ShutdownTrigger {
    /// Process exit status to use once every hook has settled
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownTrigger::Exit => 0,
            ShutdownTrigger::Fault | ShutdownTrigger::Interrupt => 1,
        }
    }
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Exit => write!(f, "exit"),
            ShutdownTrigger::Fault => write!(f, "fault"),
            ShutdownTrigger::Interrupt => write!(f, "interrupt"),
        }
    }
}

/// Work that must settle before the process exits.
///
/// Hooks may run more than once when triggers fire back to back, so they
/// must be idempotent.
#[async_trait]
pub trait ShutdownHook: Send + Sync {
    fn name(&self) -> &'static str {
        "UnnamedHook"
    }

    async fn on_shutdown(&self, trigger: ShutdownTrigger);
}

#[async_trait]
impl ShutdownHook for LifecycleManager {
    fn name(&self) -> &'static str {
        "LifecycleManager"
    }

    async fn on_shutdown(&self, _trigger: ShutdownTrigger) {
        self.deregister().await;
    }
}

/// Runs registered hooks in order when the host reports a trigger
#[derive(Default)]
pub struct ShutdownCoordinator {
    hooks: Mutex<Vec<Arc<dyn ShutdownHook>>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook to run on every trigger
    pub fn register(&self, hook: Arc<dyn ShutdownHook>) {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(hook);
    }

    /// Run every hook to completion and return the exit status for `trigger`
    pub async fn run(&self, trigger: ShutdownTrigger) -> i32 {
        let hooks: Vec<Arc<dyn ShutdownHook>> = self
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        info!(%trigger, hooks = hooks.len(), "running shutdown hooks");
        for hook in hooks {
            hook.on_shutdown(trigger).await;
            info!(hook = hook.name(), "shutdown hook settled");
        }
        trigger.exit_code()
    }
}

/// Wait for Ctrl-C and report it as an interrupt trigger
pub async fn wait_for_interrupt() -> std::io::Result<ShutdownTrigger> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownTrigger::Interrupt)
}

/// Register `manager` while already listening for `interrupt`.
///
/// Returns `Ok(())` once the instance is registered. Otherwise the hooks run
/// and the exit status comes back as the error: `Fault` when registration
/// fails, or the trigger `interrupt` reported. An interrupted registration
/// is driven to completion alongside the hooks, and the deregistration waits
/// for it, so an id that reached the registry is always removed again.
pub async fn register_or_shutdown<F>(
    manager: &LifecycleManager,
    coordinator: &ShutdownCoordinator,
    interrupt: F,
) -> std::result::Result<(), i32>
where
    F: Future<Output = std::io::Result<ShutdownTrigger>>,
{
    let registration = manager.register();
    tokio::pin!(registration);
    tokio::pin!(interrupt);

    let interrupted = tokio::select! {
        // Registration is polled first so it claims the id before any
        // interrupt is acted on.
        biased;
        registered = &mut registration => match registered {
            Ok(()) => return Ok(()),
            Err(e) => {
                error!("{}", e);
                None
            }
        },
        interrupted = &mut interrupt => Some(interrupted),
    };

    let Some(interrupted) = interrupted else {
        return Err(coordinator.run(ShutdownTrigger::Fault).await);
    };
    let trigger = match interrupted {
        Ok(trigger) => trigger,
        Err(e) => {
            error!("Failed to listen for interrupt: {}", e);
            ShutdownTrigger::Fault
        }
    };

    info!(%trigger, "shutdown requested while registering");
    let (registered, code) = tokio::join!(registration, coordinator.run(trigger));
    if let Err(e) = registered {
        warn!(error = %e, "registration interrupted and failed");
    }
    Err(code)
}
