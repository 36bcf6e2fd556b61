use std::panic::{catch_unwind, AssertUnwindSafe};

use axum::routing::MethodRouter;
use axum::Router;
use indexmap::IndexMap;

use super::{Action, RouteMethod, RouteRecord, RouteRegistrar};
use crate::error::panic_message;

/// Order-preserving list of registered routes, convertible into an axum router.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteRecord>,
}

impl RouteRegistrar for RouteTable {
    fn register(&mut self, method: RouteMethod, path: &str, action: Action) {
        self.entries.push(RouteRecord {
            method,
            path: path.to_string(),
            action,
        });
    }
}

/// Segment-wise view of an axum path, used to detect shadowed declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern(Vec<Segment>);

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param,
    CatchAll,
}

impl Pattern {
    fn parse(axum_path: &str) -> Self {
        let segments = axum_path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| {
                if segment.starts_with("{*") && segment.ends_with('}') {
                    Segment::CatchAll
                } else if segment.starts_with('{') && segment.ends_with('}') {
                    Segment::Param
                } else {
                    Segment::Static(segment.to_string())
                }
            })
            .collect();
        Pattern(segments)
    }

    /// Whether every request matched by `other` is also matched by `self`.
    fn covers(&self, other: &Pattern) -> bool {
        for (i, segment) in self.0.iter().enumerate() {
            let Some(theirs) = other.0.get(i) else {
                return false;
            };
            match (segment, theirs) {
                (Segment::CatchAll, _) => return true,
                (Segment::Param, Segment::CatchAll) => return false,
                (Segment::Param, _) => {}
                (Segment::Static(a), Segment::Static(b)) if a == b => {}
                _ => return false,
            }
        }
        self.0.len() == other.0.len()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> &[RouteRecord] {
        &self.entries
    }

    pub fn to_router(&self) -> Router {
        self.clone().into_router()
    }

    /// Build an axum router with first-match semantics.
    ///
    /// A record is dropped when an earlier record for the same method (or an
    /// earlier `ALL`) matches every request its pattern matches, including
    /// the exact `(method, path)` duplicate. An `ALL` route becomes the
    /// method fallback of its path.
    pub fn into_router(self) -> Router {
        let mut kept: Vec<(Pattern, RouteMethod)> = Vec::new();
        let mut by_path: IndexMap<String, MethodRouter> = IndexMap::new();

        for record in self.entries {
            let path = to_axum_path(&record.path);
            let pattern = Pattern::parse(&path);
            let route = format!("{} {}", record.method, record.path);

            let shadowed = kept.iter().any(|(earlier, method)| {
                (*method == RouteMethod::All || *method == record.method) && earlier.covers(&pattern)
            });
            if shadowed {
                tracing::warn!(
                    route = %route,
                    action = record.action.name(),
                    "Dropping route shadowed by an earlier declaration"
                );
                continue;
            }
            if kept.iter().any(|(earlier, _)| *earlier != pattern && earlier.covers(&pattern)) {
                tracing::debug!(route = %route, "Route narrows an earlier, broader declaration for other methods");
            }

            let slot = by_path.entry(path).or_insert_with(MethodRouter::new);
            let current = std::mem::replace(slot, MethodRouter::new());
            let handler = record.action.into_handler();
            *slot = match record.method.filter() {
                Some(filter) => current.on(filter, handler),
                None => current.fallback(handler),
            };
            kept.push((pattern, record.method));
        }

        let mut router = Router::new();
        for (path, method_router) in by_path {
            let attempt = router.clone();
            match catch_unwind(AssertUnwindSafe(|| attempt.route(&path, method_router))) {
                Ok(next) => router = next,
                Err(payload) => tracing::error!(
                    path = %path,
                    reason = %panic_message(payload.as_ref()),
                    "Route rejected by router"
                ),
            }
        }
        router
    }
}

/// Convert an express-style path to axum syntax.
///
/// `:id` becomes `{id}`, a `*` segment becomes a catch-all and a leading `/`
/// is added when missing.
pub fn to_axum_path(path: &str) -> String {
    let body = path.trim().trim_start_matches('/');
    let segments: Vec<String> = body.split('/').map(convert_segment).collect();
    format!("/{}", segments.join("/"))
}

fn convert_segment(segment: &str) -> String {
    if segment == "*" {
        return "{*wildcard}".to_string();
    }
    if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
        return format!("{{{name}}}");
    }
    if let Some(name) = segment.strip_prefix('*').filter(|n| !n.is_empty()) {
        return format!("{{*{name}}}");
    }
    segment.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::{Path, Request};
    use http::StatusCode;
    use tower::ServiceExt;

    async fn first() -> &'static str {
        "first"
    }

    async fn second() -> &'static str {
        "second"
    }

    async fn any() -> &'static str {
        "any"
    }

    async fn body_text(resp: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn request(method: &str, uri: &str) -> Request {
        http::Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn converts_express_paths() {
        assert_eq!(to_axum_path("/videos/:id"), "/videos/{id}");
        assert_eq!(to_axum_path("files/*"), "/files/{*wildcard}");
        assert_eq!(to_axum_path("/static/*rest"), "/static/{*rest}");
        assert_eq!(to_axum_path("/"), "/");
        assert_eq!(to_axum_path("/a:b"), "/a:b");
    }

    #[tokio::test]
    async fn first_registration_wins() {
        let mut table = RouteTable::new();
        table.register(RouteMethod::Get, "/x", Action::new("first", first));
        table.register(RouteMethod::Get, "/x", Action::new("second", second));
        assert_eq!(table.len(), 2);

        let resp = table.into_router().oneshot(request("GET", "/x")).await.unwrap();
        assert_eq!(body_text(resp).await, "first");
    }

    #[tokio::test]
    async fn all_route_is_fallback_for_other_methods() {
        let mut table = RouteTable::new();
        table.register(RouteMethod::Post, "/x", Action::new("first", first));
        table.register(RouteMethod::All, "/x", Action::new("any", any));
        table.register(RouteMethod::Get, "/x", Action::new("second", second));
        let router = table.into_router();

        let post = router.clone().oneshot(request("POST", "/x")).await.unwrap();
        assert_eq!(body_text(post).await, "first");
        let get = router.oneshot(request("GET", "/x")).await.unwrap();
        assert_eq!(body_text(get).await, "any");
    }

    #[tokio::test]
    async fn params_reach_extractors() {
        let mut table = RouteTable::new();
        table.register(
            RouteMethod::Get,
            "/videos/:id",
            Action::new("show", |Path(id): Path<String>| async move { id }),
        );

        let resp = table.into_router().oneshot(request("GET", "/videos/42")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "42");
    }

    #[tokio::test]
    async fn equivalent_param_route_is_shadowed() {
        let mut table = RouteTable::new();
        table.register(RouteMethod::Get, "/v/:id", Action::new("first", first));
        table.register(RouteMethod::Get, "/v/:name", Action::new("second", second));

        let resp = table.into_router().oneshot(request("GET", "/v/1")).await.unwrap();
        assert_eq!(body_text(resp).await, "first");
    }

    #[tokio::test]
    async fn broader_earlier_route_shadows_later_specific_one() {
        let mut table = RouteTable::new();
        table.register(RouteMethod::All, "/y/:id", Action::new("first", first));
        table.register(RouteMethod::Get, "/y/new", Action::new("second", second));

        let resp = table.into_router().oneshot(request("GET", "/y/new")).await.unwrap();
        assert_eq!(body_text(resp).await, "first");
    }

    #[tokio::test]
    async fn catch_all_shadows_later_routes_below_it() {
        let mut table = RouteTable::new();
        table.register(RouteMethod::Get, "/files/*", Action::new("first", first));
        table.register(RouteMethod::Get, "/files/a/b", Action::new("second", second));
        table.register(RouteMethod::Post, "/files/a/b", Action::new("any", any));
        let router = table.into_router();

        let get = router.clone().oneshot(request("GET", "/files/a/b")).await.unwrap();
        assert_eq!(body_text(get).await, "first");
        let post = router.oneshot(request("POST", "/files/a/b")).await.unwrap();
        assert_eq!(body_text(post).await, "any");
    }

    #[tokio::test]
    async fn specific_route_declared_first_keeps_priority() {
        let mut table = RouteTable::new();
        table.register(RouteMethod::Get, "/z/new", Action::new("first", first));
        table.register(RouteMethod::Get, "/z/:id", Action::new("second", second));
        let router = table.into_router();

        let new = router.clone().oneshot(request("GET", "/z/new")).await.unwrap();
        assert_eq!(body_text(new).await, "first");
        let other = router.oneshot(request("GET", "/z/42")).await.unwrap();
        assert_eq!(body_text(other).await, "second");
    }

    #[test]
    fn pattern_coverage() {
        let covers = |a: &str, b: &str| Pattern::parse(&to_axum_path(a)).covers(&Pattern::parse(&to_axum_path(b)));
        assert!(covers("/y/:id", "/y/new"));
        assert!(covers("/y/:id", "/y/:other"));
        assert!(!covers("/y/new", "/y/:id"));
        assert!(!covers("/y/:id", "/y/new/edit"));
        assert!(covers("/files/*", "/files/a/b"));
        assert!(!covers("/files/*", "/files"));
        assert!(!covers("/y/:id", "/y/*rest"));
        assert!(covers("/", "/"));
    }
}
