//! Backend configuration from flags and environment

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "router-backend")]
#[command(about = "Backend instance that registers itself with the service registry")]
pub struct BackendConfig {
    /// Service type to register under; also used as the instance tag
    pub service_type: String,

    /// Host to bind and advertise
    #[arg(long, env = "ADDRESS", default_value = "localhost")]
    pub address: String,

    /// Consul agent HTTP address
    #[arg(long, env = "CONSUL_HTTP_ADDR", default_value = router_core::consul::DEFAULT_CONSUL_ADDR)]
    pub registry: String,
}
