//! Route resolution across the routers of a [`RoutingContext`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::access::Principal;
use crate::config::{Algorithm, RoutingConfig};
use crate::context::RoutingContext;
use crate::cors::CorsOptions;
use crate::error::{Result, RoutingError};
use crate::middleware::Flow;
use crate::output::Output;
use crate::request::{Params, Request};
use crate::response::Response;
use crate::route::Route;
use crate::router::Router;

/// Diagnostics of one resolution, attached to the request.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingTrace {
    /// Algorithm used.
    pub algorithm: Algorithm,
    /// Name of the router that matched.
    pub router: Option<String>,
    /// Time spent finding the route.
    pub elapsed: Duration,
    /// Number of routers consulted.
    pub routers_visited: usize,
    /// Number of index rebuilds triggered by this resolution.
    pub index_rebuilds: usize,
}

/// The outcome of a successful resolution.
#[derive(Clone)]
pub struct ResolvedRoute {
    route: Arc<Route>,
    router: Arc<Router>,
    router_name: String,
    params: Params,
}

impl ResolvedRoute {
    /// The selected route.
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// The router owning the route.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Name the router was registered under.
    pub fn router_name(&self) -> &str {
        &self.router_name
    }

    /// Bound parameters, after param middlewares.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Redirect target when the route is a redirect.
    pub fn redirect_target(&self) -> Option<&str> {
        self.route.redirect_target()
    }

    /// Effective CORS options; the route overrides its router.
    pub fn cors(&self) -> Option<CorsOptions> {
        self.route
            .cors_options()
            .cloned()
            .or_else(|| self.router.cors())
    }

    /// Runs router and route middlewares, then the handler.
    ///
    /// Returns `None` when a middleware halted; the response then holds
    /// whatever the middleware wrote.
    pub async fn dispatch(
        &self,
        mut request: Request,
        response: &mut Response,
    ) -> Result<Option<Output>> {
        request.params = self.params.clone();
        if self
            .router
            .run_middlewares(&self.route, &mut request, response)
            .await?
            == Flow::Halt
        {
            return Ok(None);
        }
        self.route.execute(request).await.map(Some)
    }

    /// Checks the permissions and policies the route requires.
    ///
    /// Returns the authenticated principal, if any.
    pub async fn authorize(&self, request: &Request) -> Result<Option<Principal>> {
        let permissions = self.route.permissions();
        for permission in permissions {
            if !self.router.has_permission(permission) {
                return Err(RoutingError::invalid(format!(
                    "permission `{permission}` is not declared by router `{}`",
                    self.router_name
                )));
            }
        }
        let mut policies = Vec::with_capacity(self.route.policies().len());
        for name in self.route.policies() {
            let policy = self.router.policy(name).ok_or_else(|| {
                RoutingError::invalid(format!(
                    "policy `{name}` is not registered on router `{}`",
                    self.router_name
                ))
            })?;
            policies.push((name, policy));
        }

        let principal = match self.router.authenticator() {
            Some(authenticator) => authenticator.authenticate(request).await?,
            None => None,
        };

        if !permissions.is_empty() {
            let user = principal.as_ref().ok_or(RoutingError::Unauthenticated)?;
            if let Some(missing) = permissions.iter().find(|p| !user.has_permission(p)) {
                debug!(
                    route = %self.route,
                    principal = %user.id,
                    permission = %missing,
                    "access denied"
                );
                return Err(RoutingError::Forbidden(format!("missing permission `{missing}`")));
            }
        }

        for (name, policy) in policies {
            if !policy.allows(principal.as_ref(), request).await? {
                debug!(route = %self.route, policy = %name, "access denied");
                return Err(match principal {
                    None => RoutingError::Unauthenticated,
                    Some(_) => RoutingError::Forbidden(format!("policy `{name}` denied access")),
                });
            }
        }
        Ok(principal)
    }
}

impl fmt::Debug for ResolvedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedRoute")
            .field("route", &self.route)
            .field("router", &self.router_name)
            .field("params", &self.params)
            .finish()
    }
}

/// Finds the route serving a request.
pub struct RouteProcessor {
    context: Arc<RoutingContext>,
    config: RoutingConfig,
}

struct Resolution {
    resolved: Option<ResolvedRoute>,
    routers_visited: usize,
    index_rebuilds: usize,
}

impl RouteProcessor {
    /// Creates a processor over `context`.
    pub fn new(context: Arc<RoutingContext>, config: RoutingConfig) -> Self {
        Self { context, config }
    }

    /// The routing context.
    pub fn context(&self) -> &Arc<RoutingContext> {
        &self.context
    }

    /// The configuration.
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// The configured default router, else the context's.
    pub fn default_router(&self) -> Option<Arc<Router>> {
        match &self.config.default_router {
            Some(name) => match self.context.get(name) {
                Ok(router) => Some(router),
                Err(_) => {
                    warn!(router = %name, "configured default router is not registered");
                    None
                }
            },
            None => self.context.default_router(),
        }
    }

    fn resolve(&self, request: &Request) -> Resolution {
        let languages: Vec<&str> = request.preferred_languages().collect();
        let mut resolution = Resolution {
            resolved: None,
            routers_visited: 0,
            index_rebuilds: 0,
        };

        for (name, router) in self.context.routers() {
            resolution.routers_visited += 1;
            let lookup = router.lookup(
                self.config.algorithm,
                request.method,
                &request.path,
                &languages,
            );
            if lookup.index_rebuilt {
                resolution.index_rebuilds += 1;
            }
            if let Some((route, params)) = lookup.matched {
                resolution.resolved = Some(ResolvedRoute {
                    route,
                    router: Arc::clone(router),
                    router_name: name.to_string(),
                    params,
                });
                break;
            }
        }
        resolution
    }

    fn not_found(request: &Request) -> RoutingError {
        RoutingError::NotFound {
            method: request.method.to_string(),
            path: request.path.clone(),
        }
    }

    /// Selects a route without running param middlewares.
    pub fn find(&self, request: &Request) -> Result<ResolvedRoute> {
        self.resolve(request)
            .resolved
            .ok_or_else(|| Self::not_found(request))
    }

    /// Selects a route, runs param middlewares over the bound parameters
    /// and stores them on the request.
    ///
    /// When a param middleware fails, the changes made before the failure
    /// remain visible in `request.params`.
    pub async fn process(&self, request: &mut Request) -> Result<ResolvedRoute> {
        let start = Instant::now();
        let resolution = self.resolve(request);
        let elapsed = start.elapsed();

        if self.config.trace {
            request.trace = Some(RoutingTrace {
                algorithm: self.config.algorithm,
                router: resolution.resolved.as_ref().map(|r| r.router_name.clone()),
                elapsed,
                routers_visited: resolution.routers_visited,
                index_rebuilds: resolution.index_rebuilds,
            });
        }

        let Some(mut resolved) = resolution.resolved else {
            debug!(
                method = %request.method,
                path = %request.path,
                algorithm = %self.config.algorithm,
                "no route matched"
            );
            return Err(Self::not_found(request));
        };
        debug!(
            method = %request.method,
            path = %request.path,
            router = %resolved.router_name,
            route = %resolved.route,
            elapsed_us = elapsed.as_micros() as u64,
            "route resolved"
        );

        request.params = resolved.params.clone();
        self.context
            .param_middlewares()
            .run(&mut request.params)
            .await?;
        resolved.params = request.params.clone();
        Ok(resolved)
    }
}
