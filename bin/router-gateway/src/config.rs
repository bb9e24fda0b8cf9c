//! Gateway configuration from flags and environment

use anyhow::{Context, Result};
use clap::Parser;
use router_proxy::RouteTable;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "router-gateway")]
#[command(about = "Reverse proxy routing requests to registry-discovered instances")]
pub struct GatewayConfig {
    /// Address the proxy listens on
    #[arg(long, env = "ROUTER_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Ordered `prefix=service` routes; the first matching prefix wins
    #[arg(long, env = "ROUTER_ROUTES", default_value = "/api=api-service,/=webapp-service")]
    pub routes: String,

    /// Consul agent HTTP address
    #[arg(long, env = "CONSUL_HTTP_ADDR", default_value = router_core::consul::DEFAULT_CONSUL_ADDR)]
    pub registry: String,

    /// Give up connecting to an upstream after this many milliseconds
    #[arg(long, env = "ROUTER_CONNECT_TIMEOUT_MS")]
    pub connect_timeout_ms: Option<u64>,
}

impl GatewayConfig {
    pub fn route_table(&self) -> Result<RouteTable> {
        RouteTable::parse(&self.routes).context("invalid ROUTER_ROUTES")
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}
