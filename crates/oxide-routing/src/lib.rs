//! # oxide-routing
//!
//! Route registration, indexing and request resolution.
//!
//! This crate provides:
//! - Path patterns with required (`:name`), optional trailing (`?:name`) and
//!   regular-expression parameters
//! - Parameter filters (`@number`, `@slug`, raw regexes)
//! - Language-aware route selection
//! - An index keyed by segment count and literal tag, with a linear scan
//!   kept for diagnostics
//! - Router and route middleware chains, plus param middlewares
//! - Named routes for reverse URL lookup
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use oxide_routing::{
//!     Output, Request, Result, RouteProcessor, Router, RoutingConfig, RoutingContext,
//! };
//!
//! async fn user_handler(req: Request) -> Result<Output> {
//!     let id = req.params.require("id")?;
//!     Ok(Output::Json(serde_json::json!({ "id": id })))
//! }
//!
//! let router = Router::new();
//! router.get("/users/:id", user_handler).unwrap();
//!
//! let mut ctx = RoutingContext::new();
//! ctx.register("web", Arc::new(router)).unwrap();
//! let processor = RouteProcessor::new(Arc::new(ctx), RoutingConfig::default());
//!
//! let resolved = processor.find(&Request::get("/users/123")).unwrap();
//! assert_eq!(resolved.params().get("id"), Some("123"));
//! ```
//!
//! ## Path Parameters
//!
//! ```ignore
//! router.get("/posts/:post_id/comments/?:page", handler)?;
//! router.get(r"^/archive/(?P<year>\d{4})$", handler)?;
//! ```
//!
//! Bound values are percent-decoded and available in `request.params`.
//!
//! ## Middleware
//!
//! ```ignore
//! use oxide_routing::{Flow, LoggingMiddleware, from_fn};
//!
//! router.add_middleware("log", LoggingMiddleware)?;
//! router.add_middleware("maintenance", from_fn(|_req, res| {
//!     res.status = 503;
//!     Ok(Flow::Halt)
//! }))?;
//! ```
//!
//! ## Named Routes
//!
//! ```ignore
//! router.add_route(Route::new("GET", "/users/:id", handler)?.name("user_detail"))?;
//!
//! let url = router.url_for("user_detail", [("id", "123"), ("tab", "posts")])?;
//! assert_eq!(url, "/users/123?tab=posts");
//! ```

mod access;
mod config;
mod context;
mod cors;
mod error;
mod filter;
mod index;
mod middleware;
mod output;
mod param;
mod path;
mod processor;
mod request;
mod response;
mod route;
mod router;

pub use access::{Authenticator, BearerAuthenticator, FnPolicy, Policy, Principal, policy_fn};
pub use config::{Algorithm, RoutingConfig};
pub use context::RoutingContext;
pub use cors::{CorsMiddleware, CorsOptions};
pub use error::{Result, RoutingError};
pub use filter::Filter;
pub use futures::future::BoxFuture;
pub use index::RouteIndex;
pub use middleware::{FnMiddleware, Flow, LoggingMiddleware, Middleware, MiddlewareChain, from_fn};
pub use output::Output;
pub use param::{FnParamMiddleware, ParamMiddleware, ParamMiddlewareRegistry, param_fn};
pub use path::{PathPattern, Segment};
pub use processor::{ResolvedRoute, RouteProcessor, RoutingTrace};
pub use request::{Method, MethodFilter, Params, Request};
pub use response::Response;
pub use route::{Handler, RESOURCE_PARAM, Route, RouteId, RouteKind, boxed};
pub use router::Router;
