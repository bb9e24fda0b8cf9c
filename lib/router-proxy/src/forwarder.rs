//! Streaming HTTP request forwarding to a selected upstream

use crate::error::{DispatchError, Result};
use crate::http::{boxed, ProxyBody};
use async_trait::async_trait;
use hyper::header::HeaderMap;
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::tokio::TokioExecutor;
use std::time::Duration;
use tracing::debug;

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Sends a request to an upstream and hands back its response.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(
        &self,
        target: Uri,
        request: Request<ProxyBody>,
    ) -> Result<Response<ProxyBody>>;
}

/// HTTP forwarder with connection pooling.
///
/// Request and response bodies are streamed through; nothing is buffered.
/// There is no request timeout beyond what the connector enforces.
pub struct RequestForwarder {
    client: Client<HttpConnector, ProxyBody>,
}

impl RequestForwarder {
    /// Create a forwarder without a connect timeout
    pub fn new() -> Self {
        Self::with_connector(HttpConnector::new())
    }

    /// Create a forwarder whose TCP connects give up after `timeout`
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));
        Self::with_connector(connector)
    }

    fn with_connector(mut connector: HttpConnector) -> Self {
        connector.set_keepalive(Some(Duration::from_secs(30)));
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    fn strip_hop_by_hop(headers: &mut HeaderMap) {
        for name in HOP_BY_HOP_HEADERS {
            headers.remove(*name);
        }
    }
}

impl Default for RequestForwarder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forward for RequestForwarder {
    async fn forward(
        &self,
        target: Uri,
        request: Request<ProxyBody>,
    ) -> Result<Response<ProxyBody>> {
        if target.scheme_str() != Some("http") {
            return Err(DispatchError::Upstream(format!(
                "unsupported upstream scheme: {}",
                target
            )));
        }

        let (mut parts, body) = request.into_parts();
        Self::strip_hop_by_hop(&mut parts.headers);
        debug!(
            method = %parts.method,
            target = %target,
            headers = parts.headers.len(),
            "forwarding request"
        );
        parts.uri = target;

        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|e| DispatchError::Upstream(e.to_string()))?;

        debug!(status = %response.status(), "upstream responded");
        let (mut parts, body) = response.into_parts();
        Self::strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, boxed(body)))
    }
}
