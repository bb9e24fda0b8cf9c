//! Path-prefix routes with per-route round-robin instance selection

use crate::error::{DispatchError, Result};
use router_core::{CoreError, ServiceInstance, ServiceMap};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A path prefix bound to a logical service name.
///
/// The cursor is the route's rotation state and lives as long as the route.
#[derive(Debug)]
pub struct Route {
    path_prefix: String,
    service_name: String,
    cursor: AtomicUsize,
}

impl Route {
    pub fn new(path_prefix: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            service_name: service_name.into(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Index of the most recently selected instance
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// Plain string prefix match, not segment aware: `/api` matches `/apix`.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.path_prefix)
    }

    /// Pick the next instance tagged with this route's service name.
    ///
    /// The cursor advances to `(cursor + 1) % count` for the current count
    /// and is never clamped when the count changes between calls, so a
    /// shrinking instance set skews the next few picks towards low indices.
    pub fn next_instance(&self, instances: &ServiceMap) -> Result<ServiceInstance> {
        let candidates: Vec<&ServiceInstance> = instances
            .values()
            .filter(|instance| instance.has_tag(&self.service_name))
            .collect();

        if candidates.is_empty() {
            return Err(DispatchError::NoHealthyInstance(self.service_name.clone()));
        }

        let count = candidates.len();
        let previous = match self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + 1) % count))
        {
            Ok(c) | Err(c) => c,
        };
        let index = (previous + 1) % count;

        Ok(candidates[index].clone())
    }
}

impl FromStr for Route {
    type Err = CoreError;

    /// Parse `prefix=service`, e.g. `/api=api-service`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (prefix, service) = s.split_once('=').ok_or_else(|| {
            CoreError::InvalidConfiguration(format!(
                "route '{}' is not of the form prefix=service",
                s
            ))
        })?;
        let (prefix, service) = (prefix.trim(), service.trim());

        if !prefix.starts_with('/') {
            return Err(CoreError::InvalidConfiguration(format!(
                "route prefix '{}' must start with '/'",
                prefix
            )));
        }
        if service.is_empty() {
            return Err(CoreError::InvalidConfiguration(format!(
                "route '{}' has no service name",
                s
            )));
        }

        Ok(Route::new(prefix, service))
    }
}

/// Ordered routing table; the first matching prefix wins.
///
/// Declare specific prefixes before general ones: a `/` route placed first
/// would shadow every route after it.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// `/api` to `api-service`, everything else to `webapp-service`
    pub fn default_routes() -> Self {
        Self::new(vec![
            Route::new("/api", "api-service"),
            Route::new("/", "webapp-service"),
        ])
    }

    /// Parse a comma separated list of `prefix=service` entries, keeping order
    pub fn parse(routes: &str) -> std::result::Result<Self, CoreError> {
        let routes = routes
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(Route::from_str)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if routes.is_empty() {
            return Err(CoreError::InvalidConfiguration("no routes configured".to_string()));
        }
        Ok(Self::new(routes))
    }

    /// First route whose prefix matches `path`, in declaration order
    pub fn match_route(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn next_instance(&self, route: &Route, instances: &ServiceMap) -> Result<ServiceInstance> {
        route.next_instance(instances)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::default_routes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{instance, service_map};

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::default_routes();
        assert_eq!(table.match_route("/api/users").unwrap().service_name(), "api-service");
        assert_eq!(table.match_route("/index.html").unwrap().service_name(), "webapp-service");
        assert_eq!(table.match_route("/").unwrap().service_name(), "webapp-service");
    }

    #[test]
    fn test_prefix_is_not_segment_aware() {
        let table = RouteTable::default_routes();
        assert_eq!(table.match_route("/apix").unwrap().service_name(), "api-service");
    }

    #[test]
    fn test_declaration_order_matters() {
        let table = RouteTable::new(vec![
            Route::new("/", "webapp-service"),
            Route::new("/api", "api-service"),
        ]);
        assert_eq!(table.match_route("/api/users").unwrap().service_name(), "webapp-service");
    }

    #[test]
    fn test_unrouted_path() {
        let table = RouteTable::new(vec![Route::new("/api", "api-service")]);
        assert!(table.match_route("/static/app.js").is_none());
        assert!(table.match_route("").is_none());
    }

    #[test]
    fn test_round_robin_visits_every_instance() {
        let route = Route::new("/api", "api-service");
        let instances = service_map(vec![
            instance("a", "api-service"),
            instance("b", "api-service"),
            instance("c", "api-service"),
        ]);

        let picks: Vec<String> = (0..4)
            .map(|_| route.next_instance(&instances).unwrap().id)
            .collect();

        // Cursor starts at 0, so the first pick is index 1
        assert_eq!(picks, vec!["b", "c", "a", "b"]);
        assert_eq!(route.cursor(), 1);
    }

    #[test]
    fn test_selection_filters_by_tag() {
        let route = Route::new("/api", "api-service");
        let instances = service_map(vec![
            instance("a", "api-service"),
            instance("w", "webapp-service"),
            instance("z", "api-service"),
        ]);

        for _ in 0..6 {
            let picked = route.next_instance(&instances).unwrap();
            assert!(picked.has_tag("api-service"));
        }
    }

    #[test]
    fn test_no_tagged_instance() {
        let route = Route::new("/api", "api-service");
        let instances = service_map(vec![instance("w", "webapp-service")]);

        assert_eq!(
            route.next_instance(&instances),
            Err(DispatchError::NoHealthyInstance("api-service".to_string()))
        );
        assert_eq!(route.cursor(), 0);
    }

    #[test]
    fn test_cursor_taken_modulo_shrunk_count() {
        let route = Route::new("/api", "api-service");
        let three = service_map(vec![
            instance("a", "api-service"),
            instance("b", "api-service"),
            instance("c", "api-service"),
        ]);
        route.next_instance(&three).unwrap();
        route.next_instance(&three).unwrap();
        assert_eq!(route.cursor(), 2);

        let two = service_map(vec![instance("a", "api-service"), instance("b", "api-service")]);
        assert_eq!(route.next_instance(&two).unwrap().id, "b");
        assert_eq!(route.cursor(), 1);
    }

    #[test]
    fn test_parse_routes() {
        let table = RouteTable::parse("/api=api-service, /=webapp-service").unwrap();
        let prefixes: Vec<&str> = table.routes().iter().map(Route::path_prefix).collect();
        assert_eq!(prefixes, vec!["/api", "/"]);

        assert!(RouteTable::parse("").is_err());
        assert!(RouteTable::parse("/api").is_err());
        assert!(RouteTable::parse("api=api-service").is_err());
        assert!(RouteTable::parse("/api=").is_err());
    }
}
