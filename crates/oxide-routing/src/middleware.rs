//! Middleware chains run around a resolved route.
//!
//! A chain is an ordered list of named middlewares driven by a loop: each
//! middleware returns [`Flow::Continue`] to hand over to the next one or
//! [`Flow::Halt`] to end the request there. Halting is not an error; it is
//! how a middleware rejects a request after writing its own status.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, info};

use crate::error::{Result, RoutingError};
use crate::request::Request;
use crate::response::Response;

/// Decision returned by a middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Run the next middleware (or the handler).
    Continue,
    /// Stop processing the request.
    Halt,
}

/// Trait for middleware that runs before a route handler.
///
/// # Example
///
/// ```ignore
/// struct RequireJson;
///
/// impl Middleware for RequireJson {
///     fn handle<'a>(
///         &'a self,
///         req: &'a mut Request,
///         res: &'a mut Response,
///     ) -> BoxFuture<'a, Result<Flow>> {
///         Box::pin(async move {
///             if req.get_header("Content-Type") == Some("application/json") {
///                 Ok(Flow::Continue)
///             } else {
///                 res.status = 415;
///                 Ok(Flow::Halt)
///             }
///         })
///     }
/// }
/// ```
pub trait Middleware: Send + Sync {
    /// Processes the request, possibly mutating it or the response.
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow>>;
}

/// Middleware built from a synchronous closure. See [`from_fn`].
pub struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response) -> Result<Flow> + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow>> {
        futures::future::ready((self.0)(req, res)).boxed()
    }
}

/// Wraps a synchronous closure as a middleware.
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response) -> Result<Flow> + Send + Sync,
{
    FnMiddleware(f)
}

/// An ordered, named list of middlewares.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    entries: Vec<(String, Arc<dyn Middleware>)>,
}

impl MiddlewareChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware. Ids are unique within a chain.
    pub fn add(&mut self, id: impl Into<String>, middleware: Arc<dyn Middleware>) -> Result<()> {
        let id = id.into();
        if self.contains(&id) {
            return Err(RoutingError::DuplicateId {
                kind: "middleware",
                id,
            });
        }
        self.entries.push((id, middleware));
        Ok(())
    }

    /// Removes a middleware, returning whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| existing != id);
        before != self.entries.len()
    }

    /// Returns whether a middleware with this id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == id)
    }

    /// Middleware ids in execution order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    /// Number of middlewares.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs the chain in order until a middleware halts or fails.
    pub async fn run(&self, req: &mut Request, res: &mut Response) -> Result<Flow> {
        for (id, middleware) in &self.entries {
            let flow = middleware
                .handle(req, res)
                .await
                .map_err(|err| attribute(id, err))?;
            if flow == Flow::Halt {
                debug!(middleware = %id, path = %req.path, "middleware halted the chain");
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }
}

/// Keeps errors that already carry an HTTP meaning, tags the rest with the
/// failing middleware.
fn attribute(id: &str, err: RoutingError) -> RoutingError {
    match err {
        RoutingError::NotFound { .. }
        | RoutingError::Unauthenticated
        | RoutingError::Forbidden(_)
        | RoutingError::Middleware { .. } => err,
        other => RoutingError::Middleware {
            id: id.to_string(),
            message: other.to_string(),
        },
    }
}

/// Middleware that logs requests.
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        _res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow>> {
        Box::pin(async move {
            info!(method = %req.method, path = %req.path, "--> request");
            Ok(Flow::Continue)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(hits: &Arc<AtomicUsize>, flow: Flow) -> Arc<dyn Middleware> {
        let hits = Arc::clone(hits);
        Arc::new(from_fn(move |_req, _res| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(flow)
        }))
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut chain = MiddlewareChain::new();
        chain.add("a", counter(&hits, Flow::Continue)).unwrap();
        assert!(matches!(
            chain.add("a", counter(&hits, Flow::Continue)),
            Err(RoutingError::DuplicateId { .. })
        ));
        assert!(chain.remove("a"));
        assert!(!chain.remove("a"));
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn test_halt_stops_chain() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut chain = MiddlewareChain::new();
        chain.add("log", Arc::new(LoggingMiddleware)).unwrap();
        chain.add("deny", counter(&first, Flow::Halt)).unwrap();
        chain.add("after", counter(&second, Flow::Continue)).unwrap();

        let mut req = Request::get("/");
        let mut res = Response::ok();
        let flow = chain.run(&mut req, &mut res).await.unwrap();

        assert_eq!(flow, Flow::Halt);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(chain.ids().collect::<Vec<_>>(), vec!["log", "deny", "after"]);
    }

    #[tokio::test]
    async fn test_errors_are_attributed() {
        let mut chain = MiddlewareChain::new();
        chain
            .add(
                "broken",
                Arc::new(from_fn(|_req, _res| Err(RoutingError::handler("boom")))),
            )
            .unwrap();
        chain
            .add(
                "never",
                Arc::new(from_fn(|_req, _res| Ok(Flow::Continue))),
            )
            .unwrap();

        let mut req = Request::get("/");
        let mut res = Response::ok();
        let err = chain.run(&mut req, &mut res).await.unwrap_err();
        assert!(matches!(err, RoutingError::Middleware { ref id, .. } if id == "broken"));
    }

    #[tokio::test]
    async fn test_forbidden_passes_through() {
        let mut chain = MiddlewareChain::new();
        chain
            .add(
                "firewall",
                Arc::new(from_fn(|_req, _res| {
                    Err(RoutingError::Forbidden("blocked".into()))
                })),
            )
            .unwrap();
        let mut req = Request::get("/");
        let mut res = Response::ok();
        let err = chain.run(&mut req, &mut res).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}
