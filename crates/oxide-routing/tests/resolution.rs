//! Tests for route resolution across routers and algorithms.

mod common;
use common::*;

use std::sync::Arc;

use oxide_routing::{
    Algorithm, Method, Output, Request, Route, RouteKind, Router, RoutingError,
};

fn tricky_router() -> Arc<Router> {
    let router = Router::new();
    router.get("/", ok).unwrap();
    router.get("/users/:id", ok).unwrap();
    router.get("/users/me", ok).unwrap();
    router.post("/users/:id", ok).unwrap();
    router.get("/users/:id/posts/?:page", ok).unwrap();
    router.get("/users-posts/:id", ok).unwrap();
    router.get("/a-b/:x", ok).unwrap();
    router.get("/a/b", ok).unwrap();
    router.get("/:lang/about", ok).unwrap();
    router.get(r"^/archive/(?P<year>\d{4})/(?P<slug>[a-z-]+)$", ok).unwrap();
    router.get(r"^/files/(.+)$", ok).unwrap();
    router.any("/ping", ok).unwrap();
    router
        .add_route(Route::new("GET", "/item/:id", ok).unwrap().filter("id", "@number").unwrap())
        .unwrap();
    router.get("/item/:slug", ok).unwrap();
    router.resource("/static", "/srv/static").unwrap();
    Arc::new(router)
}

#[test]
fn subset_and_linear_agree() {
    let ctx = context(vec![("main", tricky_router())]);
    let paths = [
        "/",
        "/users/1",
        "/users/me",
        "/users/1/posts",
        "/users/1/posts/2",
        "/users/1/posts/2/3",
        "/users-posts/9",
        "/a-b/z",
        "/a/b",
        "/en/about",
        "/users/about",
        "/archive/2024/hello-world",
        "/archive/24/hello",
        "/files/a/b/c.txt",
        "/ping",
        "/item/42",
        "/item/forty-two",
        "/static/css/site.css",
        "/static/../secret",
        "/nothing/here",
        "/users/%F0%9F%A6%80",
    ];
    for path in paths {
        for method in [Method::Get, Method::Post, Method::Delete] {
            let req = Request::new(method, path);
            let first = resolve_both(&ctx, &req).map(|r| r.route().id());
            let second = resolve_both(&ctx, &req).map(|r| r.route().id());
            assert_eq!(first, second, "resolution of {method} {path} is not stable");
        }
    }
}

#[test]
fn first_registered_route_wins() {
    let ctx = context(vec![("main", tricky_router())]);
    let resolved = resolve_both(&ctx, &Request::get("/users/me")).unwrap();
    assert_eq!(resolved.route().path(), "/users/:id");
    assert_eq!(resolved.params().get("id"), Some("me"));
}

#[test]
fn method_is_part_of_the_match() {
    let ctx = context(vec![("main", tricky_router())]);
    let resolved = resolve_both(&ctx, &Request::post("/users/5")).unwrap();
    assert_eq!(resolved.route().method().to_string(), "POST");
    assert!(resolve_both(&ctx, &Request::new(Method::Delete, "/users/5")).is_none());
    assert!(resolve_both(&ctx, &Request::new(Method::Delete, "/ping")).is_some());
}

#[test]
fn filter_rejects_non_matching_values() {
    let router = Router::new();
    router
        .add_route(Route::new("GET", "/user/:id", ok).unwrap().filter("id", "@number").unwrap())
        .unwrap();
    let ctx = context(vec![("main", Arc::new(router))]);

    assert!(resolve_both(&ctx, &Request::get("/user/abc")).is_none());
    let err = processor(&ctx, Algorithm::Subset)
        .find(&Request::get("/user/abc"))
        .unwrap_err();
    assert!(matches!(err, RoutingError::NotFound { .. }));

    let resolved = resolve_both(&ctx, &Request::get("/user/456")).unwrap();
    assert_eq!(resolved.params().get("id"), Some("456"));
}

#[test]
fn filter_falls_through_to_next_route() {
    let ctx = context(vec![("main", tricky_router())]);
    let resolved = resolve_both(&ctx, &Request::get("/item/forty-two")).unwrap();
    assert_eq!(resolved.params().get("slug"), Some("forty-two"));
    let resolved = resolve_both(&ctx, &Request::get("/item/42")).unwrap();
    assert_eq!(resolved.params().get("id"), Some("42"));
}

#[test]
fn optional_parameter_boundary() {
    let router = Router::new();
    router.get("/user/:name/posts/?:page", ok).unwrap();
    let ctx = context(vec![("main", Arc::new(router))]);

    let resolved = resolve_both(&ctx, &Request::get("/user/sig/posts/")).unwrap();
    assert_eq!(resolved.params().get("name"), Some("sig"));
    assert_eq!(resolved.params().get("page"), None);

    let resolved = resolve_both(&ctx, &Request::get("/user/sig/posts/3")).unwrap();
    assert_eq!(resolved.params().get("page"), Some("3"));

    assert!(resolve_both(&ctx, &Request::get("/user/sig")).is_none());
    assert!(resolve_both(&ctx, &Request::get("/user/sig/posts/3/4")).is_none());
}

#[test]
fn regex_routes_bind_groups() {
    let ctx = context(vec![("main", tricky_router())]);
    let resolved = resolve_both(&ctx, &Request::get("/archive/2024/hello-world")).unwrap();
    assert_eq!(resolved.params().get("year"), Some("2024"));
    assert_eq!(resolved.params().get("slug"), Some("hello-world"));

    let resolved = resolve_both(&ctx, &Request::get("/files/a/b.txt")).unwrap();
    assert_eq!(resolved.params().get("1"), Some("a/b.txt"));
}

#[test]
fn parameters_are_percent_decoded() {
    let ctx = context(vec![("main", tricky_router())]);
    let resolved = resolve_both(&ctx, &Request::get("/users/j%C3%BCrgen")).unwrap();
    assert_eq!(resolved.params().get("id"), Some("jürgen"));
}

#[test]
fn query_string_is_ignored_for_matching() {
    let ctx = context(vec![("main", tricky_router())]);
    let req = Request::get("/users/3?tab=posts");
    let resolved = resolve_both(&ctx, &req).unwrap();
    assert_eq!(resolved.params().get("id"), Some("3"));
    assert_eq!(req.get_query("tab"), Some("posts"));
}

#[test]
fn regex_routes_see_trailing_and_double_slashes() {
    let router = Router::new();
    router.set_prefix("/api").unwrap();
    router.get(r"^/dir/$", ok).unwrap();
    router.get(r"^/raw//(?P<rest>.+)$", ok).unwrap();
    let ctx = context(vec![("main", Arc::new(router))]);

    assert!(resolve_both(&ctx, &Request::get("/api/dir/")).is_some());
    assert!(resolve_both(&ctx, &Request::get("/api/dir")).is_none());
    let resolved = resolve_both(&ctx, &Request::get("/api/raw//tail?x=1")).unwrap();
    assert_eq!(resolved.params().get("rest"), Some("tail"));
    assert!(resolve_both(&ctx, &Request::get("/api/raw/tail")).is_none());
}

#[test]
fn routers_are_visited_in_registration_order() {
    let api = Router::new();
    api.set_prefix("/api").unwrap();
    api.get("/users/:id", ok).unwrap();
    let web = Router::new();
    web.get("/:section/users/:id", ok).unwrap();
    web.get("/about", ok).unwrap();
    let ctx = context(vec![("api", Arc::new(api)), ("web", Arc::new(web))]);

    let resolved = resolve_both(&ctx, &Request::get("/api/users/1")).unwrap();
    assert_eq!(resolved.router_name(), "api");
    let resolved = resolve_both(&ctx, &Request::get("/about")).unwrap();
    assert_eq!(resolved.router_name(), "web");
    let resolved = resolve_both(&ctx, &Request::get("/v2/users/1")).unwrap();
    assert_eq!(resolved.router_name(), "web");
    assert_eq!(resolved.params().get("section"), Some("v2"));
}

#[tokio::test]
async fn resource_routes_serve_files() {
    let router = Router::new();
    router.get("/static/version", ok).unwrap();
    router.resource("/static", "/srv/static").unwrap();
    router.resource("/static/img", "/srv/images").unwrap();
    let ctx = context(vec![("main", Arc::new(router))]);

    let resolved = resolve_both(&ctx, &Request::get("/static/img/logo.png")).unwrap();
    assert!(matches!(resolved.route().kind(), RouteKind::Resource { .. }));
    assert_eq!(resolved.params().get("path"), Some("logo.png"));
    let mut res = oxide_routing::Response::ok();
    let output = resolved
        .dispatch(Request::get("/static/img/logo.png"), &mut res)
        .await
        .unwrap();
    match output {
        Some(Output::File(path)) => assert_eq!(path, std::path::Path::new("/srv/images/logo.png")),
        other => panic!("Expected file output, got {other:?}"),
    }

    let resolved = resolve_both(&ctx, &Request::get("/static/version")).unwrap();
    assert!(!resolved.route().is_resource());
    assert!(resolve_both(&ctx, &Request::get("/static/../etc/passwd")).is_none());
    assert!(resolve_both(&ctx, &Request::post("/static/app.js")).is_none());
}

#[test]
fn fifty_thousand_routes() {
    let router = Router::new();
    for i in 0..50_000 {
        router.get(&format!("/test-{i}/:id/"), ok).unwrap();
    }
    router.get("/test-49999/7777/", ok).unwrap();
    let ctx = context(vec![("main", Arc::new(router))]);

    let resolved = processor(&ctx, Algorithm::Subset)
        .find(&Request::get("/test-49999/7777/"))
        .unwrap();
    assert_eq!(resolved.route().path(), "/test-49999/:id/");
    assert_eq!(resolved.params().get("id"), Some("7777"));

    let linear = processor(&ctx, Algorithm::Linear)
        .find(&Request::get("/test-49999/7777/"))
        .unwrap();
    assert_eq!(linear.route().id(), resolved.route().id());
}

#[tokio::test]
async fn redirect_route_exposes_target() {
    let router = Router::new();
    router.redirect("/redirect", "/target", false).unwrap();
    let ctx = context(vec![("main", Arc::new(router))]);

    let mut req = Request::get("/redirect");
    let resolved = processor(&ctx, Algorithm::Subset)
        .process(&mut req)
        .await
        .unwrap();
    assert_eq!(resolved.redirect_target(), Some("/target"));

    let mut res = oxide_routing::Response::ok();
    let output = resolved.dispatch(req, &mut res).await.unwrap().unwrap();
    let response = output.into_response();
    assert_eq!(response.status, 302);
    assert_eq!(response.get_header("Location"), Some("/target"));
}
