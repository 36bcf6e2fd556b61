use super::{Action, RouteMethod, RouteRecord};

/// Anything that accepts `(method, path, handler)` registrations in order.
pub trait RouteRegistrar: Send {
    fn register(&mut self, method: RouteMethod, path: &str, action: Action);
}

/// Register `records` on `router` in order. No-op without a router or records.
pub fn apply_routes(records: &[RouteRecord], router: Option<&mut dyn RouteRegistrar>) {
    let Some(router) = router else {
        return;
    };
    for record in records {
        tracing::debug!(route = %format_args!("{} {}", record.method, record.path), "Route loaded");
        router.register(record.method, &record.path, record.action.clone());
    }
}
