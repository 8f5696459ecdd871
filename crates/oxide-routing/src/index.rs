//! Route index used by the subset resolution algorithm.
//!
//! Routes are bucketed by `(segment count, tag)`. For every segment count the
//! index also keeps the distinct *shapes* registered for it, i.e. the
//! positions of literal segments. An incoming path is looked up once per
//! shape: its segments at the shape's literal positions are joined into a tag
//! the same way a route's literals are.
//!
//! The index is a snapshot. It is built from a router's route list, stamped
//! with the router generation it reflects, and replaced wholesale when stale.

use std::collections::HashMap;
use std::sync::Arc;

use crate::route::Route;

/// A route as recorded in the index.
#[derive(Debug, Clone)]
pub(crate) struct IndexedRoute {
    pub route: Arc<Route>,
    pub language: Option<String>,
}

/// Candidate lookup structure for one router.
#[derive(Debug, Default)]
pub struct RouteIndex {
    generation: u64,
    routes: Vec<IndexedRoute>,
    buckets: HashMap<(usize, String), Vec<usize>>,
    shapes: HashMap<usize, Vec<Vec<usize>>>,
    regex: Vec<usize>,
    resources: Vec<usize>,
}

impl RouteIndex {
    /// Builds an index over `routes` for the given router generation.
    pub fn build(generation: u64, routes: &[Arc<Route>]) -> Self {
        let mut index = Self {
            generation,
            ..Self::default()
        };

        for (pos, route) in routes.iter().enumerate() {
            index.routes.push(IndexedRoute {
                route: Arc::clone(route),
                language: route.get_language(),
            });

            if route.is_resource() {
                index.resources.push(pos);
                continue;
            }
            let pattern = route.pattern();
            if pattern.is_regex() {
                index.regex.push(pos);
                continue;
            }

            let tag = pattern.tag();
            let (min, max) = pattern.segment_range();
            for count in min..=max {
                let shapes = index.shapes.entry(count).or_default();
                if !shapes.iter().any(|s| s.as_slice() == pattern.shape()) {
                    shapes.push(pattern.shape().to_vec());
                }
                index
                    .buckets
                    .entry((count, tag.clone()))
                    .or_default()
                    .push(pos);
            }
        }
        index
    }

    /// Router generation this index reflects.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of indexed routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` when no route is indexed.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Number of `(segment count, tag)` buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub(crate) fn routes(&self) -> &[IndexedRoute] {
        &self.routes
    }

    /// Positions of pattern routes that may match `parts`, in registration
    /// order. Regex routes are always candidates. Resource routes are not
    /// included; see [`RouteIndex::resource_candidates`].
    pub(crate) fn candidates(&self, parts: &[&str]) -> Vec<usize> {
        let count = parts.len();
        let mut found: Vec<usize> = self.regex.clone();
        if let Some(shapes) = self.shapes.get(&count) {
            for shape in shapes {
                let tag = shape
                    .iter()
                    .map(|&i| parts[i])
                    .collect::<Vec<_>>()
                    .join("-");
                if let Some(bucket) = self.buckets.get(&(count, tag)) {
                    found.extend_from_slice(bucket);
                }
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Positions of resource routes, in registration order.
    pub(crate) fn resource_candidates(&self) -> &[usize] {
        &self.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::output::Output;
    use crate::request::Request;

    async fn ok(_req: Request) -> Result<Output> {
        Ok(Output::Empty)
    }

    fn routes(paths: &[&str]) -> Vec<Arc<Route>> {
        paths
            .iter()
            .map(|p| Arc::new(Route::new("GET", p, ok).unwrap()))
            .collect()
    }

    #[test]
    fn test_candidates_by_shape() {
        let routes = routes(&["/users/:id", "/users/me", "/posts/:id", "/users/:id/posts"]);
        let index = RouteIndex::build(3, &routes);
        assert_eq!(index.generation(), 3);
        assert_eq!(index.len(), 4);

        assert_eq!(index.candidates(&["users", "me"]), vec![0, 1]);
        assert_eq!(index.candidates(&["users", "42"]), vec![0]);
        assert_eq!(index.candidates(&["posts", "1"]), vec![2]);
        assert_eq!(index.candidates(&["users", "1", "posts"]), vec![3]);
        assert!(index.candidates(&["nothing"]).is_empty());
    }

    #[test]
    fn test_optional_parameters_span_counts() {
        let routes = routes(&["/user/:name/posts/?:page"]);
        let index = RouteIndex::build(0, &routes);
        assert_eq!(index.candidates(&["user", "sig", "posts"]), vec![0]);
        assert_eq!(index.candidates(&["user", "sig", "posts", "3"]), vec![0]);
        assert!(index.candidates(&["user", "sig"]).is_empty());
    }

    #[test]
    fn test_regex_and_resources_are_separate() {
        let mut all = routes(&[r"^/files/(?P<name>.+)$", "/a"]);
        all.push(Arc::new(Route::resource("/static", "/srv").unwrap()));
        let index = RouteIndex::build(0, &all);
        assert_eq!(index.candidates(&["files", "x"]), vec![0]);
        assert_eq!(index.candidates(&["a"]), vec![0, 1]);
        assert_eq!(index.resource_candidates(), &[2]);
    }

    #[test]
    fn test_coincident_tags_are_deduplicated() {
        let routes = routes(&["/a-b/:x", "/a/b"]);
        let index = RouteIndex::build(0, &routes);
        assert_eq!(index.candidates(&["a-b", "z"]), vec![0, 1]);
    }
}
