//! Param middlewares: hooks run on bound route parameters.
//!
//! Each registration names the parameters it cares about. After a route is
//! selected, registrations run in the order they were added, once for every
//! distinct associated parameter the route bound.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{Result, RoutingError};
use crate::middleware::Flow;
use crate::request::Params;

/// A hook that can transform or validate a bound parameter.
pub trait ParamMiddleware: Send + Sync {
    /// Called with the parameter name and the full mutable parameter set.
    fn call<'a>(&'a self, name: &'a str, params: &'a mut Params) -> BoxFuture<'a, Result<Flow>>;
}

/// Param middleware built from a synchronous closure. See [`param_fn`].
pub struct FnParamMiddleware<F>(F);

impl<F> ParamMiddleware for FnParamMiddleware<F>
where
    F: Fn(&str, &mut Params) -> Result<Flow> + Send + Sync,
{
    fn call<'a>(&'a self, name: &'a str, params: &'a mut Params) -> BoxFuture<'a, Result<Flow>> {
        futures::future::ready((self.0)(name, params)).boxed()
    }
}

/// Wraps a synchronous closure as a param middleware.
pub fn param_fn<F>(f: F) -> FnParamMiddleware<F>
where
    F: Fn(&str, &mut Params) -> Result<Flow> + Send + Sync,
{
    FnParamMiddleware(f)
}

struct Entry {
    id: String,
    names: Vec<String>,
    middleware: Arc<dyn ParamMiddleware>,
}

/// Registry of param middlewares keyed by id.
#[derive(Default)]
pub struct ParamMiddlewareRegistry {
    entries: RwLock<Vec<Arc<Entry>>>,
}

impl ParamMiddlewareRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `middleware` under `id` for the given parameter names.
    pub fn add<M, I, S>(&self, id: impl Into<String>, middleware: M, names: I) -> Result<()>
    where
        M: ParamMiddleware + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = id.into();
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        if unique.is_empty() {
            return Err(RoutingError::invalid(format!(
                "param middleware `{id}` has no parameter names"
            )));
        }

        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.id == id) {
            return Err(RoutingError::DuplicateId {
                kind: "param middleware",
                id,
            });
        }
        debug!(id = %id, params = ?unique, "param middleware registered");
        entries.push(Arc::new(Entry {
            id,
            names: unique,
            middleware: Arc::new(middleware),
        }));
        Ok(())
    }

    /// Removes every association of `id`, returning whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        before != entries.len()
    }

    /// Returns whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().iter().any(|e| e.id == id)
    }

    /// Registered ids in execution order.
    pub fn ids(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.id.clone()).collect()
    }

    /// Runs the registered middlewares over `params`.
    ///
    /// A middleware returning [`Flow::Halt`] stops the remaining ones
    /// without error. A failure aborts the run; changes made by earlier
    /// middlewares stay in place.
    pub async fn run(&self, params: &mut Params) -> Result<()> {
        let entries: Vec<Arc<Entry>> = self.entries.read().clone();
        for entry in &entries {
            for name in &entry.names {
                if !params.contains(name) {
                    continue;
                }
                trace!(id = %entry.id, param = %name, "running param middleware");
                let flow = entry
                    .middleware
                    .call(name, params)
                    .await
                    .map_err(|err| match err {
                        RoutingError::NotFound { .. } | RoutingError::ParamMiddleware { .. } => err,
                        other => RoutingError::ParamMiddleware {
                            id: entry.id.clone(),
                            message: other.to_string(),
                        },
                    })?;
                if flow == Flow::Halt {
                    debug!(id = %entry.id, param = %name, "param middleware halted");
                    return Ok(());
                }
            }
        }
        Ok(())
    }
}
