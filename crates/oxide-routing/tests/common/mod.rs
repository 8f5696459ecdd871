#![allow(dead_code)]

use std::sync::{Arc, Once};

use oxide_routing::{
    Algorithm, Output, Request, ResolvedRoute, Result, RouteProcessor, Router, RoutingConfig,
    RoutingContext,
};

static TRACING: Once = Once::new();

/// Installs a test subscriber so `RUST_LOG` shows routing logs.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub async fn ok(_req: Request) -> Result<Output> {
    Ok(Output::Empty)
}

/// Handler echoing the bound parameters as JSON.
pub async fn echo(req: Request) -> Result<Output> {
    let params: serde_json::Map<String, serde_json::Value> = req
        .params
        .iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
        .collect();
    Ok(Output::Json(serde_json::Value::Object(params)))
}

pub fn context(routers: Vec<(&str, Arc<Router>)>) -> Arc<RoutingContext> {
    let mut ctx = RoutingContext::new();
    for (name, router) in routers {
        ctx.register(name, router)
            .unwrap_or_else(|e| panic!("Failed to register router {name}: {e}"));
    }
    Arc::new(ctx)
}

pub fn processor(ctx: &Arc<RoutingContext>, algorithm: Algorithm) -> RouteProcessor {
    init_tracing();
    RouteProcessor::new(
        Arc::clone(ctx),
        RoutingConfig::default().algorithm(algorithm),
    )
}

/// Resolves `req` with both algorithms and checks they agree.
pub fn resolve_both(ctx: &Arc<RoutingContext>, req: &Request) -> Option<ResolvedRoute> {
    let subset = processor(ctx, Algorithm::Subset).find(req).ok();
    let linear = processor(ctx, Algorithm::Linear).find(req).ok();
    assert_eq!(
        subset.as_ref().map(|r| (r.route().id(), r.params().clone())),
        linear.as_ref().map(|r| (r.route().id(), r.params().clone())),
        "subset and linear disagree for {} {}",
        req.method,
        req.url
    );
    subset
}
