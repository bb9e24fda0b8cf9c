//! Request dispatch: route, look up instances, pick one, forward

use crate::cache::{ServiceCache, SERVICES_KEY};
use crate::error::{DispatchError, Result};
use crate::forwarder::Forward;
use crate::http::{bad_gateway_response, boxed, BoxError, ProxyBody};
use crate::route_table::RouteTable;
use hyper::body::{Body, Bytes};
use hyper::{Request, Response, Uri};
use std::sync::Arc;
use tracing::{debug, warn};

/// Concrete upstream chosen for one request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Upstream {
    pub service: String,
    pub instance_id: String,
    pub scheme: &'static str,
    pub authority: String,
}

impl Upstream {
    /// Build a target URL for this upstream, keeping the request path and query
    pub fn target_url(&self, path_and_query: &str) -> String {
        format!("{}://{}{}", self.scheme, self.authority, path_and_query)
    }
}

/// ProxyDispatcher resolves each request to an upstream and forwards it.
///
/// A failure anywhere along the way answers 502 immediately. Nothing is
/// retried.
pub struct ProxyDispatcher {
    routes: Arc<RouteTable>,
    cache: Arc<ServiceCache>,
    forwarder: Arc<dyn Forward>,
}

impl ProxyDispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        cache: Arc<ServiceCache>,
        forwarder: Arc<dyn Forward>,
    ) -> Self {
        Self {
            routes,
            cache,
            forwarder,
        }
    }

    /// Choose the upstream for `path`
    pub async fn resolve(&self, path: &str) -> Result<Upstream> {
        let route = self
            .routes
            .match_route(path)
            .ok_or_else(|| DispatchError::UnroutedRequest(path.to_string()))?;

        let services = self
            .cache
            .get(SERVICES_KEY)
            .await?
            .ok_or_else(|| {
                DispatchError::RegistryUnavailable("registry returned no services".to_string())
            })?;

        let instance = self.routes.next_instance(route, &services)?;
        debug!(
            path,
            service = route.service_name(),
            instance = %instance.id,
            "selected upstream"
        );

        Ok(Upstream {
            service: route.service_name().to_string(),
            authority: instance.authority(),
            instance_id: instance.id,
            scheme: "http",
        })
    }

    /// Proxy one request, answering 502 on any failure
    pub async fn dispatch<B>(&self, request: Request<B>) -> Response<ProxyBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match self.try_dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%method, %path, error = %e, "dispatch failed, answering 502");
                bad_gateway_response()
            }
        }
    }

    async fn try_dispatch<B>(&self, request: Request<B>) -> Result<Response<ProxyBody>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let upstream = self.resolve(request.uri().path()).await?;

        let path_and_query = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = upstream
            .target_url(path_and_query)
            .parse::<Uri>()
            .map_err(|e| DispatchError::Upstream(e.to_string()))?;

        self.forwarder.forward(target, request.map(boxed)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::full;
    use crate::test_support::*;
    use async_trait::async_trait;
    use http_body_util::BodyExt;
    use hyper::StatusCode;
    use std::sync::Mutex;

    /// Records forwarded targets instead of connecting anywhere
    #[derive(Default)]
    struct RecordingForwarder {
        targets: Mutex<Vec<Uri>>,
    }

    impl RecordingForwarder {
        fn targets(&self) -> Vec<String> {
            self.targets.lock().unwrap().iter().map(Uri::to_string).collect()
        }
    }

    #[async_trait]
    impl Forward for RecordingForwarder {
        async fn forward(
            &self,
            target: Uri,
            _request: Request<ProxyBody>,
        ) -> Result<Response<ProxyBody>> {
            self.targets.lock().unwrap().push(target);
            Ok(Response::new(full("upstream")))
        }
    }

    fn dispatcher(registry: StubRegistry) -> (ProxyDispatcher, Arc<RecordingForwarder>) {
        let forwarder = Arc::new(RecordingForwarder::default());
        let cache = Arc::new(ServiceCache::new(Arc::new(registry)));
        let dispatcher = ProxyDispatcher::new(
            Arc::new(RouteTable::default_routes()),
            cache,
            forwarder.clone(),
        );
        (dispatcher, forwarder)
    }

    fn get(uri: &str) -> Request<ProxyBody> {
        Request::builder().uri(uri).body(full("")).unwrap()
    }

    async fn body_text(response: Response<ProxyBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_to_tagged_instance() {
        let registry = StubRegistry::with_services(vec![
            instance("a", "api-service"),
            instance("w", "webapp-service"),
        ]);
        let (dispatcher, forwarder) = dispatcher(registry);

        let response = dispatcher.dispatch(get("/api/users?page=2")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(forwarder.targets(), vec!["http://127.0.0.1:4000/api/users?page=2"]);
    }

    #[tokio::test]
    async fn test_no_tagged_instance_is_bad_gateway_without_forwarding() {
        let registry = StubRegistry::with_services(vec![instance("w", "webapp-service")]);
        let (dispatcher, forwarder) = dispatcher(registry);

        let response = dispatcher.dispatch(get("/api/users")).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_text(response).await, "Bad gateway");
        assert!(forwarder.targets().is_empty());
    }

    #[tokio::test]
    async fn test_registry_failure_is_bad_gateway() {
        let registry =
            StubRegistry::with_services(vec![instance("a", "api-service")]).failing_list_calls(1);
        let (dispatcher, forwarder) = dispatcher(registry);

        let response = dispatcher.dispatch(get("/api")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(forwarder.targets().is_empty());

        // The failure is not cached
        let response = dispatcher.dispatch(get("/api")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_registry_is_unavailable() {
        let (dispatcher, _) = dispatcher(StubRegistry::with_services(vec![]));

        assert!(matches!(
            dispatcher.resolve("/").await,
            Err(DispatchError::RegistryUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_unrouted_request() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let registry = Arc::new(StubRegistry::with_services(vec![instance("a", "api-service")]));
        let dispatcher = ProxyDispatcher::new(
            Arc::new(RouteTable::parse("/api=api-service").unwrap()),
            Arc::new(ServiceCache::new(registry.clone())),
            forwarder.clone(),
        );

        assert_eq!(
            dispatcher.resolve("/static/app.js").await,
            Err(DispatchError::UnroutedRequest("/static/app.js".to_string()))
        );
        let response = dispatcher.dispatch(get("/static/app.js")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(registry.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_requests_rotate_across_instances() {
        let mut a = instance("a", "webapp-service");
        a.port = 5001;
        let mut b = instance("b", "webapp-service");
        b.port = 5002;
        let (dispatcher, forwarder) = dispatcher(StubRegistry::with_services(vec![a, b]));

        for _ in 0..3 {
            dispatcher.dispatch(get("/")).await;
        }

        assert_eq!(
            forwarder.targets(),
            vec![
                "http://127.0.0.1:5002/",
                "http://127.0.0.1:5001/",
                "http://127.0.0.1:5002/",
            ]
        );
    }
}
