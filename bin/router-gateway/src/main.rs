use anyhow::Result;
use clap::Parser;
use hyper::{server::conn::http1, service::service_fn, Request};
use hyper_util::rt::tokio::TokioIo;
use router_core::ConsulClient;
use router_proxy::{ProxyBody, ProxyDispatcher, RequestForwarder, ServiceCache};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::GatewayConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::parse();
    info!("Starting router-gateway...");

    let routes = Arc::new(config.route_table()?);
    for route in routes.routes() {
        info!("  - {} -> {}", route.path_prefix(), route.service_name());
    }

    let registry = Arc::new(ConsulClient::new(config.registry.clone()));
    info!("Using Consul agent at {}", registry.base_url());

    let cache = Arc::new(ServiceCache::new(registry));
    let forwarder = Arc::new(match config.connect_timeout() {
        Some(timeout) => RequestForwarder::with_connect_timeout(timeout),
        None => RequestForwarder::new(),
    });
    let dispatcher = Arc::new(ProxyDispatcher::new(routes, cache, forwarder));

    let listener = TcpListener::bind(config.listen).await?;
    info!("Load balancer started on port {}", config.listen.port());

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let dispatcher = dispatcher.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let dispatcher = dispatcher.clone();
                handle_request(req, dispatcher)
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving HTTP connection from {}: {}", peer_addr, e);
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    dispatcher: Arc<ProxyDispatcher>,
) -> Result<hyper::Response<ProxyBody>, Infallible> {
    debug!("{} {}", req.method(), req.uri());
    Ok(dispatcher.dispatch(req).await)
}
