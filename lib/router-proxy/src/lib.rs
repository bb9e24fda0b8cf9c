//! HTTP proxy implementation
//!
//! Requests are matched against an ordered route table, the registry's
//! service list is fetched through a single-flight cache, and a tagged
//! instance is chosen round-robin before the request is streamed to it.

pub mod cache;
pub mod dispatcher;
pub mod error;
pub mod forwarder;
pub mod http;
pub mod route_table;

#[cfg(test)]
mod test_support;

pub use cache::{ServiceCache, SERVICES_KEY, SERVICE_LIST_TTL};
pub use dispatcher::{ProxyDispatcher, Upstream};
pub use error::DispatchError;
pub use forwarder::{Forward, RequestForwarder};
pub use http::{bad_gateway_response, ProxyBody};
pub use route_table::{Route, RouteTable};
