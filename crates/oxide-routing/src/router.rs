//! Router: an ordered set of routes sharing a prefix and middlewares.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::access::{Authenticator, Policy};
use crate::config::Algorithm;
use crate::cors::CorsOptions;
use crate::error::{Result, RoutingError};
use crate::index::{IndexedRoute, RouteIndex};
use crate::middleware::{Flow, Middleware, MiddlewareChain};
use crate::output::Output;
use crate::path::split_path;
use crate::request::{Method, Params, Request};
use crate::response::Response;
use crate::route::{Route, RouteId};

/// Outcome of looking a path up in one router.
#[derive(Debug)]
pub(crate) struct Lookup {
    pub matched: Option<(Arc<Route>, Params)>,
    pub index_rebuilt: bool,
}

/// An ordered collection of routes.
///
/// Registration order decides priority: the first route that fully matches
/// a request wins. Routers use interior mutability so they can be shared
/// behind an `Arc` by the routing context and by resolved routes.
pub struct Router {
    routes: RwLock<Vec<Arc<Route>>>,
    index: RwLock<Arc<RouteIndex>>,
    generation: Arc<AtomicU64>,
    prefix: RwLock<Vec<String>>,
    middlewares: RwLock<MiddlewareChain>,
    cors: RwLock<Option<CorsOptions>>,
    authenticator: RwLock<Option<Arc<dyn Authenticator>>>,
    permissions: RwLock<HashSet<String>>,
    policies: RwLock<HashMap<String, Arc<dyn Policy>>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a new empty router.
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(Vec::new()),
            index: RwLock::new(Arc::new(RouteIndex::default())),
            generation: Arc::new(AtomicU64::new(0)),
            prefix: RwLock::new(Vec::new()),
            middlewares: RwLock::new(MiddlewareChain::new()),
            cors: RwLock::new(None),
            authenticator: RwLock::new(None),
            permissions: RwLock::new(HashSet::new()),
            policies: RwLock::new(HashMap::new()),
        }
    }

    /// Appends a route. Route names must be unique within the router.
    pub fn add_route(&self, mut route: Route) -> Result<Arc<Route>> {
        let mut routes = self.routes.write();
        if let Some(name) = route.route_name() {
            if routes.iter().any(|r| r.route_name() == Some(name)) {
                return Err(RoutingError::DuplicateId {
                    kind: "route name",
                    id: name.to_string(),
                });
            }
        }
        route.attach(Arc::clone(&self.generation));
        let route = Arc::new(route);
        routes.push(Arc::clone(&route));
        self.invalidate();
        debug!(route = %route, id = %route.id(), tag = %route.tag(), "route registered");
        Ok(route)
    }

    /// Adds a route for `method` (an HTTP verb or `*`).
    pub fn route<F, Fut>(&self, method: &str, path: &str, handler: F) -> Result<Arc<Route>>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        self.add_route(Route::new(method, path, handler)?)
    }

    /// Adds a GET route.
    pub fn get<F, Fut>(&self, path: &str, handler: F) -> Result<Arc<Route>>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        self.route("GET", path, handler)
    }

    /// Adds a POST route.
    pub fn post<F, Fut>(&self, path: &str, handler: F) -> Result<Arc<Route>>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        self.route("POST", path, handler)
    }

    /// Adds a PUT route.
    pub fn put<F, Fut>(&self, path: &str, handler: F) -> Result<Arc<Route>>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        self.route("PUT", path, handler)
    }

    /// Adds a PATCH route.
    pub fn patch<F, Fut>(&self, path: &str, handler: F) -> Result<Arc<Route>>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        self.route("PATCH", path, handler)
    }

    /// Adds a DELETE route.
    pub fn delete<F, Fut>(&self, path: &str, handler: F) -> Result<Arc<Route>>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        self.route("DELETE", path, handler)
    }

    /// Adds a HEAD route.
    pub fn head<F, Fut>(&self, path: &str, handler: F) -> Result<Arc<Route>>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        self.route("HEAD", path, handler)
    }

    /// Adds an OPTIONS route.
    pub fn options<F, Fut>(&self, path: &str, handler: F) -> Result<Arc<Route>>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        self.route("OPTIONS", path, handler)
    }

    /// Adds a route answering every method.
    pub fn any<F, Fut>(&self, path: &str, handler: F) -> Result<Arc<Route>>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        self.route("*", path, handler)
    }

    /// Adds a redirect from `from` to `to`.
    pub fn redirect(&self, from: &str, to: &str, permanent: bool) -> Result<Arc<Route>> {
        self.add_route(Route::redirect(from, to, permanent)?)
    }

    /// Adds a route rendering `template`.
    pub fn view(&self, path: &str, template: &str) -> Result<Arc<Route>> {
        self.add_route(Route::view(path, template)?)
    }

    /// Adds a static-file route serving `directory` below `prefix`.
    pub fn resource(&self, prefix: &str, directory: impl Into<PathBuf>) -> Result<Arc<Route>> {
        self.add_route(Route::resource(prefix, directory)?)
    }

    /// Removes a route by id.
    pub fn remove_route(&self, id: RouteId) -> Option<Arc<Route>> {
        let mut routes = self.routes.write();
        let pos = routes.iter().position(|r| r.id() == id)?;
        let route = routes.remove(pos);
        self.invalidate();
        debug!(route = %route, id = %id, "route removed");
        Some(route)
    }

    /// Snapshot of the routes in registration order.
    pub fn routes(&self) -> Vec<Arc<Route>> {
        self.routes.read().clone()
    }

    /// Finds a route by name.
    pub fn route_by_name(&self, name: &str) -> Option<Arc<Route>> {
        self.routes
            .read()
            .iter()
            .find(|r| r.route_name() == Some(name))
            .cloned()
    }

    /// Finds a route by id.
    pub fn route_by_id(&self, id: RouteId) -> Option<Arc<Route>> {
        self.routes.read().iter().find(|r| r.id() == id).cloned()
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    /// Returns `true` when no route is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }

    /// Sets the prefix matched in front of every route path.
    pub fn set_prefix(&self, prefix: &str) -> Result<()> {
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(RoutingError::invalid(format!(
                "prefix `{prefix}` must start with `/`"
            )));
        }
        *self.prefix.write() = split_path(prefix).into_iter().map(str::to_string).collect();
        self.invalidate();
        Ok(())
    }

    /// Returns the prefix, `""` when unset.
    pub fn prefix(&self) -> String {
        let prefix = self.prefix.read();
        if prefix.is_empty() {
            String::new()
        } else {
            format!("/{}", prefix.join("/"))
        }
    }

    /// Appends a router-wide middleware.
    pub fn add_middleware(
        &self,
        id: impl Into<String>,
        mw: impl Middleware + 'static,
    ) -> Result<()> {
        self.middlewares.write().add(id, Arc::new(mw))
    }

    /// Removes a router-wide middleware.
    pub fn remove_middleware(&self, id: &str) -> bool {
        self.middlewares.write().remove(id)
    }

    /// Router-wide middleware ids in execution order.
    pub fn middleware_ids(&self) -> Vec<String> {
        self.middlewares.read().ids().map(str::to_string).collect()
    }

    /// Runs the router chain, then the route chain.
    pub async fn run_middlewares(
        &self,
        route: &Route,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<Flow> {
        let chain = self.middlewares.read().clone();
        if chain.run(req, res).await? == Flow::Halt {
            return Ok(Flow::Halt);
        }
        route.middlewares().run(req, res).await
    }

    /// Sets router-wide CORS options.
    pub fn set_cors(&self, cors: CorsOptions) {
        *self.cors.write() = Some(cors);
    }

    /// Router-wide CORS options.
    pub fn cors(&self) -> Option<CorsOptions> {
        self.cors.read().clone()
    }

    /// Sets the authenticator used by
    /// [`ResolvedRoute::authorize`](crate::ResolvedRoute::authorize).
    pub fn set_authenticator(&self, authenticator: impl Authenticator + 'static) {
        *self.authenticator.write() = Some(Arc::new(authenticator));
    }

    /// Returns the authenticator.
    pub fn authenticator(&self) -> Option<Arc<dyn Authenticator>> {
        self.authenticator.read().clone()
    }

    /// Declares a permission routes of this router may require.
    pub fn add_permission(&self, permission: impl Into<String>) {
        self.permissions.write().insert(permission.into());
    }

    /// Returns whether the permission was declared.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.read().contains(permission)
    }

    /// Registers a named policy.
    pub fn add_policy(&self, name: impl Into<String>, policy: impl Policy + 'static) -> Result<()> {
        let name = name.into();
        let mut policies = self.policies.write();
        if policies.contains_key(&name) {
            return Err(RoutingError::DuplicateId { kind: "policy", id: name });
        }
        policies.insert(name, Arc::new(policy));
        Ok(())
    }

    /// Returns a named policy.
    pub fn policy(&self, name: &str) -> Option<Arc<dyn Policy>> {
        self.policies.read().get(name).cloned()
    }

    /// Builds the URL of a named route, prefix included.
    pub fn url_for<I, K, V>(&self, name: &str, params: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let route = self
            .route_by_name(name)
            .ok_or_else(|| RoutingError::RouteNotFound(name.to_string()))?;
        let path = route.compile(params)?;
        let prefix = self.prefix();
        if prefix.is_empty() {
            return Ok(path);
        }
        Ok(match path.strip_prefix('/') {
            Some(rest) if rest.is_empty() || rest.starts_with('?') => format!("{prefix}{rest}"),
            _ => format!("{prefix}{path}"),
        })
    }

    /// Current index generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns a current index snapshot, rebuilding it when stale.
    pub fn index(&self) -> Arc<RouteIndex> {
        self.current_index().0
    }

    fn current_index(&self) -> (Arc<RouteIndex>, bool) {
        let generation = self.generation();
        {
            let index = self.index.read();
            if index.generation() == generation {
                return (Arc::clone(&index), false);
            }
        }
        let routes = self.routes.read().clone();
        let fresh = Arc::new(RouteIndex::build(generation, &routes));
        debug!(
            generation,
            routes = fresh.len(),
            buckets = fresh.bucket_count(),
            "route index rebuilt"
        );
        *self.index.write() = Arc::clone(&fresh);
        (fresh, true)
    }

    /// Strips the router prefix from a request path, keeping the rest of
    /// the path as sent. A query string is dropped first.
    fn strip_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let mut rest = path.split_once('?').map_or(path, |(p, _)| p);
        for segment in self.prefix.read().iter() {
            rest = rest.trim_start_matches('/').strip_prefix(segment.as_str())?;
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
        }
        Some(if rest.is_empty() { "/" } else { rest })
    }

    /// Looks `path` up with the given algorithm.
    pub(crate) fn lookup(
        &self,
        algorithm: Algorithm,
        method: Method,
        path: &str,
        languages: &[&str],
    ) -> Lookup {
        let Some(rest) = self.strip_prefix(path) else {
            trace!(path, prefix = %self.prefix(), "prefix mismatch");
            return Lookup {
                matched: None,
                index_rebuilt: false,
            };
        };
        let parts = split_path(rest);
        let parts = parts.as_slice();

        match algorithm {
            Algorithm::Subset => {
                let (index, index_rebuilt) = self.current_index();
                let routes = index.routes();
                let candidates = index.candidates(parts);
                trace!(path, candidates = candidates.len(), "subset lookup");
                let matched = select(
                    candidates.iter().map(|&pos| &routes[pos]),
                    method,
                    rest,
                    parts,
                    languages,
                )
                .or_else(|| {
                    select_resource(
                        index.resource_candidates().iter().map(|&pos| &routes[pos]),
                        method,
                        parts,
                        languages,
                    )
                });
                Lookup {
                    matched,
                    index_rebuilt,
                }
            }
            Algorithm::Linear => {
                let routes: Vec<IndexedRoute> = self
                    .routes
                    .read()
                    .iter()
                    .map(|route| IndexedRoute {
                        route: Arc::clone(route),
                        language: route.get_language(),
                    })
                    .collect();
                trace!(path, candidates = routes.len(), "linear lookup");
                let matched = select(
                    routes.iter().filter(|r| !r.route.is_resource()),
                    method,
                    rest,
                    parts,
                    languages,
                )
                .or_else(|| {
                    select_resource(
                        routes.iter().filter(|r| r.route.is_resource()),
                        method,
                        parts,
                        languages,
                    )
                });
                Lookup {
                    matched,
                    index_rebuilt: false,
                }
            }
        }
    }
}

fn language_rank(languages: &[&str], language: &str) -> Option<usize> {
    languages.iter().position(|l| l.eq_ignore_ascii_case(language))
}

/// Picks the route for `parts` among pattern candidates in registration
/// order. Language-tagged routes win by preference rank; language-less
/// routes are the fallback.
fn select<'a>(
    candidates: impl Iterator<Item = &'a IndexedRoute>,
    method: Method,
    path: &str,
    parts: &[&str],
    languages: &[&str],
) -> Option<(Arc<Route>, Params)> {
    let mut fallback: Option<(Arc<Route>, Params)> = None;
    let mut best: Option<(usize, Arc<Route>, Params)> = None;

    for entry in candidates {
        let Some(params) = entry.route.matches(method, path, parts) else {
            continue;
        };
        match &entry.language {
            None => {
                if languages.is_empty() {
                    return Some((Arc::clone(&entry.route), params));
                }
                if fallback.is_none() {
                    fallback = Some((Arc::clone(&entry.route), params));
                }
            }
            Some(language) => {
                let Some(rank) = language_rank(languages, language) else {
                    continue;
                };
                if best.as_ref().map_or(true, |(current, ..)| rank < *current) {
                    best = Some((rank, Arc::clone(&entry.route), params));
                    if rank == 0 {
                        break;
                    }
                }
            }
        }
    }

    best.map(|(_, route, params)| (route, params)).or(fallback)
}

/// Picks the resource route with the longest matching prefix.
fn select_resource<'a>(
    candidates: impl Iterator<Item = &'a IndexedRoute>,
    method: Method,
    parts: &[&str],
    languages: &[&str],
) -> Option<(Arc<Route>, Params)> {
    let mut best: Option<(usize, Arc<Route>, Params)> = None;
    for entry in candidates {
        if !entry.route.method().accepts(method) {
            continue;
        }
        if let Some(language) = &entry.language {
            if language_rank(languages, language).is_none() {
                continue;
            }
        }
        let Some((len, params)) = entry.route.match_prefix(parts) else {
            continue;
        };
        if best.as_ref().map_or(true, |(current, ..)| len > *current) {
            best = Some((len, Arc::clone(&entry.route), params));
        }
    }
    best.map(|(_, route, params)| (route, params))
}
