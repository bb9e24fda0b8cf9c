use anyhow::{Context, Result};
use clap::Parser;
use router_core::ConsulClient;
use router_lifecycle::{
    register_or_shutdown, wait_for_interrupt, LifecycleManager, ShutdownCoordinator,
    ShutdownTrigger,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod server;

use config::BackendConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BackendConfig::parse();
    let pid = std::process::id();

    let listener = server::bind_free_port(&config.address)
        .await
        .with_context(|| format!("failed to bind {}", config.address))?;
    let port = listener.local_addr()?.port();

    let registry = Arc::new(ConsulClient::new(config.registry.clone()));
    let lifecycle = Arc::new(LifecycleManager::new(
        registry,
        config.service_type.clone(),
        config.address.clone(),
        port,
    ));

    let coordinator = ShutdownCoordinator::new();
    coordinator.register(lifecycle.clone());

    // One interrupt listener for the whole run, first polled alongside registration.
    let interrupt = wait_for_interrupt();
    tokio::pin!(interrupt);

    if let Err(code) = register_or_shutdown(&lifecycle, &coordinator, &mut interrupt).await {
        std::process::exit(code);
    }

    info!("Started {} at {} on port {}", config.service_type, pid, port);
    let server = tokio::spawn(server::serve(listener, config.service_type.clone(), pid));

    let trigger = tokio::select! {
        // Connection tasks keep their own errors and panics, so only a failed
        // accept loop ends up here. `Exit` is never produced by this host.
        joined = server => match joined {
            Ok(Ok(never)) => match never {},
            Ok(Err(e)) => {
                error!("Server error: {}", e);
                ShutdownTrigger::Fault
            }
            Err(e) => {
                error!("Server task failed: {}", e);
                ShutdownTrigger::Fault
            }
        },
        interrupted = &mut interrupt => match interrupted {
            Ok(trigger) => trigger,
            Err(e) => {
                error!("Failed to listen for interrupt: {}", e);
                ShutdownTrigger::Fault
            }
        },
    };

    let code = coordinator.run(trigger).await;
    info!("Exiting with status {}", code);
    std::process::exit(code);
}
