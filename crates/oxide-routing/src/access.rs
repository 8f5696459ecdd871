//! Authentication and authorization collaborators.
//!
//! Routers only hold these. Resolution never calls them; the request
//! pipeline does, through [`ResolvedRoute::authorize`](crate::ResolvedRoute::authorize),
//! once a route has been selected.

use std::collections::HashSet;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::request::Request;

/// An authenticated identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    /// Identifier of the principal.
    pub id: String,
    /// Granted permission names.
    pub permissions: HashSet<String>,
}

impl Principal {
    /// Creates a principal without permissions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            permissions: HashSet::new(),
        }
    }

    /// Grants a permission.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// Returns whether the permission was granted.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Establishes who sent a request.
pub trait Authenticator: Send + Sync {
    /// Returns the principal behind the request, or `None` if anonymous.
    fn authenticate<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Option<Principal>>>;
}

/// A named access rule evaluated against a principal and request.
pub trait Policy: Send + Sync {
    /// Returns whether access is allowed.
    fn allows<'a>(
        &'a self,
        principal: Option<&'a Principal>,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<bool>>;
}

/// Policy built from a synchronous closure. See [`policy_fn`].
pub struct FnPolicy<F>(F);

impl<F> Policy for FnPolicy<F>
where
    F: Fn(Option<&Principal>, &Request) -> bool + Send + Sync,
{
    fn allows<'a>(
        &'a self,
        principal: Option<&'a Principal>,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<bool>> {
        futures::future::ready(Ok((self.0)(principal, request))).boxed()
    }
}

/// Wraps a synchronous closure as a policy.
pub fn policy_fn<F>(f: F) -> FnPolicy<F>
where
    F: Fn(Option<&Principal>, &Request) -> bool + Send + Sync,
{
    FnPolicy(f)
}

/// Authenticator reading a bearer token from the `Authorization` header.
///
/// Tokens map to principals through the supplied lookup closure.
pub struct BearerAuthenticator<F> {
    lookup: F,
}

impl<F> BearerAuthenticator<F> {
    /// Creates an authenticator from a token lookup.
    pub fn new(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<Principal> + Send + Sync,
    {
        Self { lookup }
    }
}

impl<F> Authenticator for BearerAuthenticator<F>
where
    F: Fn(&str) -> Option<Principal> + Send + Sync,
{
    fn authenticate<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<Option<Principal>>> {
        let principal = request
            .get_header("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
            .and_then(|token| (self.lookup)(token.trim()));
        futures::future::ready(Ok(principal)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bearer_authenticator() {
        let auth = BearerAuthenticator::new(|token| {
            (token == "secret").then(|| Principal::new("alice").with_permission("admin"))
        });

        let req = Request::get("/").header("Authorization", "Bearer secret");
        let principal = auth.authenticate(&req).await.unwrap().unwrap();
        assert_eq!(principal.id, "alice");
        assert!(principal.has_permission("admin"));

        let anonymous = Request::get("/");
        assert!(auth.authenticate(&anonymous).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_policy_fn() {
        let policy = policy_fn(|principal, _req| principal.is_some_and(|p| p.id == "alice"));
        let req = Request::get("/");
        let alice = Principal::new("alice");
        assert!(policy.allows(Some(&alice), &req).await.unwrap());
        assert!(!policy.allows(None, &req).await.unwrap());
    }
}
