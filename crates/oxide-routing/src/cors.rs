//! CORS metadata carried by routers and routes.
//!
//! The router only stores these options; a header-writing stage (or
//! [`CorsMiddleware`]) turns them into response headers.

use futures::future::BoxFuture;

use crate::error::Result;
use crate::middleware::{Flow, Middleware};
use crate::request::{Method, Request};
use crate::response::Response;

/// Cross-origin resource sharing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsOptions {
    /// Allowed origins.
    pub allowed_origins: Vec<String>,
    /// Allowed methods.
    pub allowed_methods: Vec<String>,
    /// Allowed headers.
    pub allowed_headers: Vec<String>,
    /// Whether credentials may be sent.
    pub allow_credentials: bool,
    /// Preflight cache duration in seconds.
    pub max_age: Option<u32>,
}

impl CorsOptions {
    /// Options that allow all origins.
    pub fn permissive() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
            allowed_headers: vec!["*".to_string()],
            allow_credentials: false,
            max_age: Some(86400),
        }
    }

    /// Options restricted to specific origins.
    pub fn new(origins: &[&str]) -> Self {
        Self {
            allowed_origins: origins.iter().map(|s| (*s).to_string()).collect(),
            allowed_methods: ["GET", "POST", "PUT", "DELETE"]
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            allow_credentials: false,
            max_age: None,
        }
    }

    /// Allows credentialed requests.
    #[must_use]
    pub fn credentials(mut self, allow: bool) -> Self {
        self.allow_credentials = allow;
        self
    }

    /// Returns the origin to echo for `origin`, if it is allowed.
    pub fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return Some("*".to_string());
        }
        let origin = origin?;
        self.allowed_origins
            .iter()
            .find(|o| o.as_str() == origin)
            .cloned()
    }

    /// Headers for a response to a request from `origin`.
    pub fn headers(&self, origin: Option<&str>, preflight: bool) -> Vec<(String, String)> {
        let Some(allowed) = self.allow_origin(origin) else {
            return Vec::new();
        };
        let mut headers = vec![("Access-Control-Allow-Origin".to_string(), allowed)];
        if self.allow_credentials {
            headers.push((
                "Access-Control-Allow-Credentials".to_string(),
                "true".to_string(),
            ));
        }
        if preflight {
            headers.push((
                "Access-Control-Allow-Methods".to_string(),
                self.allowed_methods.join(", "),
            ));
            headers.push((
                "Access-Control-Allow-Headers".to_string(),
                self.allowed_headers.join(", "),
            ));
            if let Some(max_age) = self.max_age {
                headers.push(("Access-Control-Max-Age".to_string(), max_age.to_string()));
            }
        }
        headers
    }
}

/// Middleware that applies [`CorsOptions`] and answers preflight requests.
pub struct CorsMiddleware {
    options: CorsOptions,
}

impl CorsMiddleware {
    /// Creates CORS middleware from options.
    pub fn new(options: CorsOptions) -> Self {
        Self { options }
    }
}

impl Middleware for CorsMiddleware {
    fn handle<'a>(
        &'a self,
        req: &'a mut Request,
        res: &'a mut Response,
    ) -> BoxFuture<'a, Result<Flow>> {
        Box::pin(async move {
            let preflight = req.method == Method::Options;
            for (key, value) in self.options.headers(req.get_header("Origin"), preflight) {
                res.set_header(key, value);
            }
            if preflight {
                res.status = 204;
                return Ok(Flow::Halt);
            }
            Ok(Flow::Continue)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_origins() {
        let cors = CorsOptions::new(&["https://a.example"]).credentials(true);
        assert_eq!(
            cors.allow_origin(Some("https://a.example")),
            Some("https://a.example".to_string())
        );
        assert_eq!(cors.allow_origin(Some("https://b.example")), None);
        let headers = cors.headers(Some("https://a.example"), false);
        assert!(headers.contains(&(
            "Access-Control-Allow-Credentials".to_string(),
            "true".to_string()
        )));
    }

    #[tokio::test]
    async fn test_preflight_halts() {
        let mw = CorsMiddleware::new(CorsOptions::permissive());
        let mut req = Request::new(Method::Options, "/api").header("Origin", "https://x.example");
        let mut res = Response::ok();
        let flow = mw.handle(&mut req, &mut res).await.unwrap();
        assert_eq!(flow, Flow::Halt);
        assert_eq!(res.status, 204);
        assert_eq!(res.get_header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(res.get_header("Access-Control-Max-Age"), Some("86400"));
    }

    #[tokio::test]
    async fn test_simple_request_continues() {
        let mw = CorsMiddleware::new(CorsOptions::permissive());
        let mut req = Request::get("/api");
        let mut res = Response::ok();
        assert_eq!(mw.handle(&mut req, &mut res).await.unwrap(), Flow::Continue);
        assert_eq!(res.get_header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(res.get_header("Access-Control-Allow-Methods"), None);
    }
}
