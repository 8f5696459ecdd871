//! Response descriptor handed through middleware chains.
//!
//! The routing core never writes a response to the wire. Middlewares may set
//! a status or headers on it, and [`Output::into_response`](crate::Output::into_response)
//! converts a handler result into one for hosts that want a ready value.

use std::collections::HashMap;

use crate::error::RoutingError;

/// An HTTP response under construction.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Creates an empty response with `status`.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// An empty 200 response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// A 200 response with a plain text body.
    pub fn text(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::ok()
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
    }

    /// A 200 response with a JSON body.
    pub fn json(data: &serde_json::Value) -> Self {
        // `Value` always serializes.
        let body = serde_json::to_vec(data).unwrap_or_default();
        Self::ok().header("Content-Type", "application/json").body(body)
    }

    /// Redirect to `url`: 301 when permanent, 302 otherwise.
    pub fn redirect(url: impl Into<String>, permanent: bool) -> Self {
        Self::new(if permanent { 301 } else { 302 }).header("Location", url)
    }

    /// The response a host would send for a routing failure.
    pub fn from_error(err: &RoutingError) -> Self {
        let status = err.status_code();
        Self::new(status).body(reason(status))
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key, value);
        self
    }

    /// Sets a header in place.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    /// Looks a header up, ignoring case.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(key).then_some(v.as_str()))
    }

    /// Replaces the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// The body as UTF-8, if it is.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect() {
        let res = Response::redirect("/login", false);
        assert_eq!(res.status, 302);
        assert_eq!(res.get_header("location"), Some("/login"));
        assert_eq!(Response::redirect("/home", true).status, 301);
    }

    #[test]
    fn test_from_error() {
        let err = RoutingError::NotFound {
            method: "GET".into(),
            path: "/x".into(),
        };
        let res = Response::from_error(&err);
        assert_eq!(res.status, 404);
        assert_eq!(res.body_string().as_deref(), Some("Not Found"));
        assert_eq!(Response::from_error(&RoutingError::Unauthenticated).status, 401);
    }

    #[test]
    fn test_headers_and_body() {
        let mut res = Response::text("Hello").header("X-Custom", "value");
        res.set_header("X-Other", "1");

        assert_eq!(res.status, 200);
        assert_eq!(res.get_header("x-custom"), Some("value"));
        assert_eq!(res.get_header("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(res.body_string().as_deref(), Some("Hello"));
    }
}
