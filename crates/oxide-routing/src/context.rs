//! Router repository.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, RoutingError};
use crate::param::ParamMiddlewareRegistry;
use crate::route::{Route, RouteId};
use crate::router::Router;

/// Named routers, kept in registration order, plus the param middlewares
/// shared by all of them.
#[derive(Default)]
pub struct RoutingContext {
    routers: Vec<(String, Arc<Router>)>,
    default: Option<String>,
    param_middlewares: ParamMiddlewareRegistry,
}

impl RoutingContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a router under `name`.
    ///
    /// Router names are unique, and so are route names across all
    /// registered routers.
    pub fn register(&mut self, name: impl Into<String>, router: Arc<Router>) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(RoutingError::invalid("router name must not be empty"));
        }
        if self.routers.iter().any(|(n, _)| *n == name) {
            return Err(RoutingError::DuplicateId { kind: "router", id: name });
        }
        for route in router.routes() {
            let Some(route_name) = route.route_name() else {
                continue;
            };
            if self
                .routers
                .iter()
                .any(|(_, r)| r.route_by_name(route_name).is_some())
            {
                return Err(RoutingError::DuplicateId {
                    kind: "route name",
                    id: route_name.to_string(),
                });
            }
        }
        debug!(router = %name, routes = router.len(), "router registered");
        self.routers.push((name, router));
        Ok(())
    }

    /// Removes a router slot.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<Router>> {
        let pos = self.routers.iter().position(|(n, _)| n == name)?;
        if self.default.as_deref() == Some(name) {
            self.default = None;
        }
        Some(self.routers.remove(pos).1)
    }

    /// Returns the router registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<Router>> {
        self.routers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| Arc::clone(r))
            .ok_or_else(|| RoutingError::RouterNotFound(name.to_string()))
    }

    /// Marks a registered router as the default one.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        self.get(name)?;
        self.default = Some(name.to_string());
        Ok(())
    }

    /// The explicitly chosen default router, else the first registered.
    pub fn default_router(&self) -> Option<Arc<Router>> {
        match &self.default {
            Some(name) => self.get(name).ok(),
            None => self.routers.first().map(|(_, r)| Arc::clone(r)),
        }
    }

    /// Routers with their names, in registration order.
    pub fn routers(&self) -> impl Iterator<Item = (&str, &Arc<Router>)> {
        self.routers.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Number of registered routers.
    pub fn len(&self) -> usize {
        self.routers.len()
    }

    /// Returns `true` when no router is registered.
    pub fn is_empty(&self) -> bool {
        self.routers.is_empty()
    }

    /// Finds a named route in the first router that has it.
    pub fn route_by_name(&self, name: &str) -> Result<(Arc<Router>, Arc<Route>)> {
        self.routers
            .iter()
            .find_map(|(_, router)| router.route_by_name(name).map(|r| (Arc::clone(router), r)))
            .ok_or_else(|| RoutingError::RouteNotFound(name.to_string()))
    }

    /// Finds a route by id across all routers.
    pub fn route_by_id(&self, id: RouteId) -> Result<(Arc<Router>, Arc<Route>)> {
        self.routers
            .iter()
            .find_map(|(_, router)| router.route_by_id(id).map(|r| (Arc::clone(router), r)))
            .ok_or_else(|| RoutingError::RouteNotFound(id.to_string()))
    }

    /// Builds the URL of a named route, router prefix included.
    pub fn url_for<I, K, V>(&self, name: &str, params: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let (router, _) = self.route_by_name(name)?;
        router.url_for(name, params)
    }

    /// Param middlewares applied after route selection.
    pub fn param_middlewares(&self) -> &ParamMiddlewareRegistry {
        &self.param_middlewares
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Output;
    use crate::request::Request;

    async fn ok(_req: Request) -> Result<Output> {
        Ok(Output::Empty)
    }

    #[test]
    fn test_register_and_default() {
        let mut ctx = RoutingContext::new();
        assert!(ctx.default_router().is_none());

        let api = Arc::new(Router::new());
        let web = Arc::new(Router::new());
        ctx.register("api", Arc::clone(&api)).unwrap();
        ctx.register("web", Arc::clone(&web)).unwrap();
        assert!(matches!(
            ctx.register("api", Arc::new(Router::new())),
            Err(RoutingError::DuplicateId { .. })
        ));

        assert!(Arc::ptr_eq(&ctx.default_router().unwrap(), &api));
        ctx.set_default("web").unwrap();
        assert!(Arc::ptr_eq(&ctx.default_router().unwrap(), &web));
        assert!(ctx.set_default("missing").is_err());

        let names: Vec<&str> = ctx.routers().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["api", "web"]);

        assert!(ctx.unregister("web").is_some());
        assert!(Arc::ptr_eq(&ctx.default_router().unwrap(), &api));
        assert!(matches!(ctx.get("web"), Err(RoutingError::RouterNotFound(_))));
    }

    #[test]
    fn test_route_names_unique_across_routers() {
        let first = Router::new();
        first
            .add_route(Route::new("GET", "/first", ok).unwrap().name("home"))
            .unwrap();
        let second = Router::new();
        second
            .add_route(Route::new("GET", "/second", ok).unwrap().name("home"))
            .unwrap();

        let mut ctx = RoutingContext::new();
        ctx.register("a", Arc::new(first)).unwrap();
        let err = ctx.register("b", Arc::new(second)).unwrap_err();
        assert!(matches!(
            err,
            RoutingError::DuplicateId { kind: "route name", ref id } if id == "home"
        ));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.url_for("home", Vec::<(&str, &str)>::new()).unwrap(), "/first");
    }

    #[test]
    fn test_route_lookup_and_url_for() {
        let mut ctx = RoutingContext::new();
        let api = Arc::new(Router::new());
        api.set_prefix("/api").unwrap();
        let route = api
            .add_route(Route::new("GET", "/users/:id", ok).unwrap().name("user"))
            .unwrap();
        ctx.register("api", api).unwrap();

        let (_, found) = ctx.route_by_name("user").unwrap();
        assert_eq!(found.id(), route.id());
        let (_, found) = ctx.route_by_id(route.id()).unwrap();
        assert_eq!(found.route_name(), Some("user"));
        assert_eq!(ctx.url_for("user", [("id", "5")]).unwrap(), "/api/users/5");
        assert!(matches!(
            ctx.route_by_name("nope"),
            Err(RoutingError::RouteNotFound(_))
        ));
    }
}
