use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Request;
use axum::handler::Handler;
use axum::response::Response;
use futures::future::BoxFuture;

type BoxedCall = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// A named, type-erased request handler.
///
/// Wraps any axum handler (async fn with extractors) so that route records
/// can carry handlers of different signatures side by side.
#[derive(Clone)]
pub struct Action {
    name: Arc<str>,
    call: BoxedCall,
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action").field("name", &self.name).finish()
    }
}

impl Action {
    pub fn new<H, T>(name: impl Into<Arc<str>>, handler: H) -> Self
    where
        H: Handler<T, ()> + Sync,
        T: 'static,
    {
        let call: BoxedCall = Arc::new(move |req: Request| {
            let fut = Handler::call(handler.clone(), req, ());
            Box::pin(fut) as BoxFuture<'static, Response>
        });
        Self {
            name: name.into(),
            call,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call(&self, req: Request) -> Response {
        (self.call)(req).await
    }

    /// Same action as a plain axum handler, ready for `axum::routing::on`.
    pub fn into_handler(
        self,
    ) -> impl Fn(Request) -> BoxFuture<'static, Response> + Clone + Send + Sync + 'static {
        let call = self.call;
        move |req: Request| (call)(req)
    }

    /// Two actions are the same handler when they share the erased callable.
    pub fn same_handler(&self, other: &Action) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

/// A module of actions addressed by `module.action` references.
#[derive(Debug, Clone, Default)]
pub struct Controller {
    actions: HashMap<String, Action>,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action; a second action with the same name replaces the first.
    pub fn action<H, T>(mut self, name: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Sync,
        T: 'static,
    {
        self.actions.insert(name.to_string(), Action::new(name, handler));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
