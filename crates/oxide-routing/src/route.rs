//! Route definitions.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::debug;

use crate::cors::CorsOptions;
use crate::error::{Result, RoutingError};
use crate::filter::Filter;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::output::Output;
use crate::path::{PathPattern, Segment, append_query};
use crate::request::{Method, MethodFilter, Params, Request, decode_segment};

/// A boxed async handler function.
pub type Handler = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<Output>> + Send + Sync>;

static NEXT_ROUTE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique route identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(u64);

impl RouteId {
    fn next() -> Self {
        Self(NEXT_ROUTE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a route does besides matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    /// A route with a user handler.
    Standard,
    /// Redirects to a fixed target.
    Redirect {
        /// Redirect location.
        target: String,
        /// Whether the redirect is permanent.
        permanent: bool,
    },
    /// Renders a template.
    View {
        /// Template name.
        template: String,
    },
    /// Serves files below a directory; matches by path prefix.
    Resource {
        /// Directory the sub-path is resolved against.
        directory: PathBuf,
    },
}

/// Name of the parameter a resource route binds its sub-path to.
pub const RESOURCE_PARAM: &str = "path";

/// A single route definition.
pub struct Route {
    id: RouteId,
    name: Option<String>,
    method: MethodFilter,
    pattern: PathPattern,
    kind: RouteKind,
    handler: Handler,
    filters: Vec<(String, Filter)>,
    language: RwLock<Option<String>>,
    middlewares: MiddlewareChain,
    permissions: Vec<String>,
    policies: Vec<String>,
    cors: Option<CorsOptions>,
    generation: Option<Arc<AtomicU64>>,
}

impl Route {
    /// Creates a new route.
    ///
    /// `method` is an HTTP verb or `*` for any verb.
    pub fn new<F, Fut>(method: &str, path: &str, handler: F) -> Result<Self>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Output>> + Send + 'static,
    {
        let method = method.parse::<MethodFilter>()?;
        Self::with_handler(method, path, boxed(handler))
    }

    /// Creates a route from an already boxed handler.
    pub fn with_handler(method: MethodFilter, path: &str, handler: Handler) -> Result<Self> {
        Self::build(method, PathPattern::parse(path)?, RouteKind::Standard, handler)
    }

    /// Creates a route answering any method on `from` with a redirect to `to`.
    pub fn redirect(from: &str, to: &str, permanent: bool) -> Result<Self> {
        if to.is_empty() {
            return Err(RoutingError::invalid("redirect target must not be empty"));
        }
        let target = to.to_string();
        let location = target.clone();
        let handler: Handler = Arc::new(move |_req: Request| {
            let location = location.clone();
            async move {
                Ok(Output::Redirect {
                    location,
                    permanent,
                })
            }
            .boxed()
        });
        Self::build(
            MethodFilter::Any,
            PathPattern::parse(from)?,
            RouteKind::Redirect { target, permanent },
            handler,
        )
    }

    /// Creates a GET route rendering `template` with the bound parameters as context.
    pub fn view(path: &str, template: &str) -> Result<Self> {
        if template.is_empty() {
            return Err(RoutingError::invalid("view template must not be empty"));
        }
        let name = template.to_string();
        let handler: Handler = Arc::new(move |req: Request| {
            let template = name.clone();
            async move {
                let context = req
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
                    .collect::<serde_json::Map<_, _>>();
                Ok(Output::View {
                    template,
                    context: serde_json::Value::Object(context),
                })
            }
            .boxed()
        });
        Self::build(
            MethodFilter::Only(Method::Get),
            PathPattern::parse(path)?,
            RouteKind::View {
                template: template.to_string(),
            },
            handler,
        )
    }

    /// Creates a GET route serving files from `directory` below `prefix`.
    ///
    /// The prefix must be literal. The remaining sub-path is bound as
    /// [`RESOURCE_PARAM`].
    pub fn resource(prefix: &str, directory: impl Into<PathBuf>) -> Result<Self> {
        let pattern = PathPattern::parse(prefix)?;
        if pattern.is_regex()
            || !pattern.parameters().is_empty()
            || !pattern.optional_parameters().is_empty()
        {
            return Err(RoutingError::invalid(format!(
                "resource prefix `{prefix}` must be a literal path"
            )));
        }
        let directory = directory.into();
        let root = directory.clone();
        let handler: Handler = Arc::new(move |req: Request| {
            let file = root.join(req.params.get(RESOURCE_PARAM).unwrap_or_default());
            async move { Ok(Output::File(file)) }.boxed()
        });
        Self::build(
            MethodFilter::Only(Method::Get),
            pattern,
            RouteKind::Resource { directory },
            handler,
        )
    }

    fn build(
        method: MethodFilter,
        pattern: PathPattern,
        kind: RouteKind,
        handler: Handler,
    ) -> Result<Self> {
        Ok(Self {
            id: RouteId::next(),
            name: None,
            method,
            pattern,
            kind,
            handler,
            filters: Vec::new(),
            language: RwLock::new(None),
            middlewares: MiddlewareChain::new(),
            permissions: Vec::new(),
            policies: Vec::new(),
            cors: None,
            generation: None,
        })
    }

    /// Sets the route name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a filter (`@alias` or regular expression) on a parameter.
    pub fn filter(mut self, param: &str, pattern: &str) -> Result<Self> {
        if !self.pattern.has_parameter(param) {
            return Err(RoutingError::invalid(format!(
                "filter on unknown parameter `{param}` for `{}`",
                self.pattern.pattern()
            )));
        }
        let filter = Filter::new(pattern)?;
        self.filters.retain(|(name, _)| name != param);
        self.filters.push((param.to_string(), filter));
        Ok(self)
    }

    /// Sets the route language.
    #[must_use]
    pub fn language(self, language: impl Into<String>) -> Self {
        *self.language.write() = Some(language.into());
        self
    }

    /// Appends a route-local middleware.
    pub fn middleware(
        mut self,
        id: impl Into<String>,
        mw: impl Middleware + 'static,
    ) -> Result<Self> {
        self.middlewares.add(id, Arc::new(mw))?;
        Ok(self)
    }

    /// Requires a permission to access the route.
    #[must_use]
    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    /// Requires a named policy to allow access to the route.
    #[must_use]
    pub fn policy(mut self, policy: impl Into<String>) -> Self {
        self.policies.push(policy.into());
        self
    }

    /// Sets route-specific CORS options.
    #[must_use]
    pub fn cors(mut self, cors: CorsOptions) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Links the route to the index generation of its router.
    pub(crate) fn attach(&mut self, generation: Arc<AtomicU64>) {
        self.generation = Some(generation);
    }

    /// Returns the route id.
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// Returns the route name.
    pub fn route_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the accepted method.
    pub fn method(&self) -> MethodFilter {
        self.method
    }

    /// Returns the path pattern string.
    pub fn path(&self) -> &str {
        self.pattern.pattern()
    }

    /// Returns the compiled pattern.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// Returns the route kind.
    pub fn kind(&self) -> &RouteKind {
        &self.kind
    }

    /// Returns the redirect target for redirect routes.
    pub fn redirect_target(&self) -> Option<&str> {
        match &self.kind {
            RouteKind::Redirect { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Returns `true` for prefix-matched resource routes.
    pub fn is_resource(&self) -> bool {
        matches!(self.kind, RouteKind::Resource { .. })
    }

    /// Required parameter names, in path order.
    pub fn parameters(&self) -> &[String] {
        self.pattern.parameters()
    }

    /// Optional parameter names, in path order.
    pub fn optional_parameters(&self) -> &[String] {
        self.pattern.optional_parameters()
    }

    /// Index bucket key: the dash-joined literal segments.
    pub fn tag(&self) -> String {
        self.pattern.tag()
    }

    /// Returns the current language.
    pub fn get_language(&self) -> Option<String> {
        self.language.read().clone()
    }

    /// Changes the language and marks the router index stale.
    pub fn set_language(&self, language: Option<String>) {
        *self.language.write() = language;
        if let Some(generation) = &self.generation {
            generation.fetch_add(1, Ordering::AcqRel);
        }
        debug!(route = %self, "route language changed");
    }

    /// Route-local middlewares.
    pub fn middlewares(&self) -> &MiddlewareChain {
        &self.middlewares
    }

    /// Required permission names.
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    /// Required policy names.
    pub fn policies(&self) -> &[String] {
        &self.policies
    }

    /// Route-specific CORS options.
    pub fn cors_options(&self) -> Option<&CorsOptions> {
        self.cors.as_ref()
    }

    /// Parameter filters.
    pub fn filters(&self) -> impl Iterator<Item = (&str, &Filter)> {
        self.filters.iter().map(|(name, f)| (name.as_str(), f))
    }

    /// Matches method, path and filters. Language is left to the caller
    /// since it depends on the other candidates.
    ///
    /// `path` is the request path below the router prefix, without query
    /// string; `parts` are its non-empty segments. Regex patterns see `path`
    /// as is, slashes included.
    pub fn matches(&self, method: Method, path: &str, parts: &[&str]) -> Option<Params> {
        if !self.method.accepts(method) {
            return None;
        }
        let params = if self.is_resource() {
            self.match_prefix(parts)?.1
        } else if self.pattern.is_regex() {
            self.pattern.match_path(path)?
        } else {
            self.pattern.match_segments(parts)?
        };
        self.filters_accept(&params).then_some(params)
    }

    /// For resource routes, returns the prefix length and the bound sub-path.
    pub fn match_prefix(&self, parts: &[&str]) -> Option<(usize, Params)> {
        let segments = self.pattern.segments()?;
        if !self.is_resource() || parts.len() < segments.len() {
            return None;
        }
        for (segment, part) in segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                _ => return None,
            }
        }
        let rest: Vec<String> = parts[segments.len()..]
            .iter()
            .map(|p| decode_segment(p))
            .collect();
        if rest.iter().any(|p| p == ".." || p == "." || p.contains('/') || p.contains('\\')) {
            return None;
        }
        let mut params = Params::new();
        params.insert(RESOURCE_PARAM, rest.join("/"));
        Some((segments.len(), params))
    }

    fn filters_accept(&self, params: &Params) -> bool {
        self.filters.iter().all(|(name, filter)| {
            params.get(name).map_or(true, |value| filter.accepts(value))
        })
    }

    /// Builds a concrete URL from parameter values.
    ///
    /// All required parameters must be supplied. Unconsumed pairs become a
    /// query string in input order.
    pub fn compile<I, K, V>(&self, params: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        if !self.is_resource() {
            return self.pattern.reverse(params);
        }

        let mut sub_path = None;
        let mut rest = Vec::new();
        for (k, v) in params {
            if k.as_ref() == RESOURCE_PARAM {
                sub_path = Some(v.to_string());
            } else {
                rest.push((k.as_ref().to_string(), v.to_string()));
            }
        }
        let mut url = self.pattern.reverse::<_, &str, &str>([])?;
        if let Some(sub) = sub_path.filter(|s| !s.is_empty()) {
            if !url.ends_with('/') {
                url.push('/');
            }
            let encoded: Vec<String> = sub
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| urlencoding::encode(s).into_owned())
                .collect();
            url.push_str(&encoded.join("/"));
        }
        append_query(&mut url, &rest);
        Ok(url)
    }

    /// Invokes the handler.
    pub async fn execute(&self, request: Request) -> Result<Output> {
        let start = Instant::now();
        let result = (self.handler)(request).await;
        debug!(
            route = %self,
            elapsed_us = start.elapsed().as_micros() as u64,
            ok = result.is_ok(),
            "route executed"
        );
        result
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.pattern.pattern())
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("method", &self.method)
            .field("path", &self.pattern.pattern())
            .field("kind", &self.kind)
            .field("language", &*self.language.read())
            .finish_non_exhaustive()
    }
}

/// Boxes an async closure into a [`Handler`].
pub fn boxed<F, Fut>(handler: F) -> Handler
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Output>> + Send + 'static,
{
    Arc::new(move |req| handler(req).boxed())
}
