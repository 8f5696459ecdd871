//! Path pattern parsing and matching.

use regex::Regex;

use crate::error::{Result, RoutingError};
use crate::request::{Params, decode_segment};

/// A segment in a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A literal string segment.
    Literal(String),
    /// A required parameter (e.g., `:id`).
    Required(String),
    /// An optional trailing parameter (e.g., `?:page`).
    Optional(String),
}

#[derive(Debug, Clone)]
enum Matcher {
    Segments(Vec<Segment>),
    Regex(Regex),
}

/// A compiled path pattern for matching URLs.
#[derive(Debug, Clone)]
pub struct PathPattern {
    /// The original pattern string.
    pattern: String,
    matcher: Matcher,
    /// Required parameter names in order.
    parameters: Vec<String>,
    /// Optional parameter names in order.
    optional: Vec<String>,
    /// Positions of literal segments.
    shape: Vec<usize>,
}

impl PathPattern {
    /// Parses a path pattern string.
    ///
    /// Pattern syntax:
    /// - `/users` - Literal path
    /// - `/users/:id` - Path with a required parameter
    /// - `/users/:id/posts/?:page` - Optional trailing parameter
    /// - `^/archive/(?P<year>[0-9]{4})$` - Regular expression
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_routing::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/posts/:id/comments/:comment_id").unwrap();
    /// let params = pattern.match_path("/posts/123/comments/456").unwrap();
    /// assert_eq!(params.get("id"), Some("123"));
    /// assert_eq!(params.get("comment_id"), Some("456"));
    /// ```
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(RoutingError::invalid("path must not be empty"));
        }
        if pattern.starts_with('^') {
            return Self::parse_regex(pattern);
        }
        if !pattern.starts_with('/') {
            return Err(RoutingError::invalid(format!(
                "path `{pattern}` must start with `/`"
            )));
        }

        let mut segments = Vec::new();
        let mut parameters: Vec<String> = Vec::new();
        let mut optional: Vec<String> = Vec::new();
        let mut shape = Vec::new();

        for (pos, part) in split_path(pattern).into_iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix("?:") {
                validate_name(pattern, name)?;
                Segment::Optional(name.to_string())
            } else if let Some(name) = part.strip_prefix(':') {
                validate_name(pattern, name)?;
                Segment::Required(name.to_string())
            } else {
                Segment::Literal(part.to_string())
            };

            if !optional.is_empty() && !matches!(segment, Segment::Optional(_)) {
                return Err(RoutingError::invalid(format!(
                    "path `{pattern}`: optional parameters must be trailing"
                )));
            }

            match &segment {
                Segment::Literal(_) => shape.push(pos),
                Segment::Required(name) | Segment::Optional(name) => {
                    if parameters.contains(name) || optional.contains(name) {
                        return Err(RoutingError::invalid(format!(
                            "path `{pattern}`: duplicate parameter `{name}`"
                        )));
                    }
                    if matches!(segment, Segment::Optional(_)) {
                        optional.push(name.clone());
                    } else {
                        parameters.push(name.clone());
                    }
                }
            }
            segments.push(segment);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            matcher: Matcher::Segments(segments),
            parameters,
            optional,
            shape,
        })
    }

    fn parse_regex(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| RoutingError::invalid(format!("invalid path regex `{pattern}`: {e}")))?;
        let parameters = regex
            .capture_names()
            .enumerate()
            .skip(1)
            .map(|(i, name)| name.map_or_else(|| i.to_string(), str::to_string))
            .collect();
        Ok(Self {
            pattern: pattern.to_string(),
            matcher: Matcher::Regex(regex),
            parameters,
            optional: Vec::new(),
            shape: Vec::new(),
        })
    }

    /// Returns the original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the parsed segments, or `None` for regex patterns.
    pub fn segments(&self) -> Option<&[Segment]> {
        match &self.matcher {
            Matcher::Segments(segments) => Some(segments),
            Matcher::Regex(_) => None,
        }
    }

    /// Returns the required parameter names.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Returns the optional parameter names.
    pub fn optional_parameters(&self) -> &[String] {
        &self.optional
    }

    /// Returns whether `name` is a parameter of this pattern.
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.iter().chain(&self.optional).any(|p| p == name)
    }

    /// Returns `true` for full regular-expression patterns.
    pub fn is_regex(&self) -> bool {
        matches!(self.matcher, Matcher::Regex(_))
    }

    /// Positions of the literal segments.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Dash-joined literal segments.
    pub fn tag(&self) -> String {
        match &self.matcher {
            Matcher::Segments(segments) => segments
                .iter()
                .filter_map(|s| match s {
                    Segment::Literal(lit) => Some(lit.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("-"),
            Matcher::Regex(_) => String::new(),
        }
    }

    /// Inclusive range of segment counts this pattern accepts.
    pub fn segment_range(&self) -> (usize, usize) {
        match &self.matcher {
            Matcher::Segments(segments) => {
                let min = segments.len() - self.optional.len();
                (min, segments.len())
            }
            Matcher::Regex(_) => (0, usize::MAX),
        }
    }

    /// Attempts to match a path against this pattern.
    ///
    /// Returns extracted parameters if the path matches.
    pub fn match_path(&self, path: &str) -> Option<Params> {
        match &self.matcher {
            Matcher::Segments(_) => self.match_segments(&split_path(path)),
            Matcher::Regex(regex) => {
                let caps = regex.captures(path)?;
                let mut params = Params::new();
                for (i, name) in self.parameters.iter().enumerate() {
                    if let Some(value) = caps.get(i + 1) {
                        params.insert(name.clone(), decode_segment(value.as_str()));
                    }
                }
                Some(params)
            }
        }
    }

    /// Matches already split path segments. Regex patterns rebuild the path.
    pub fn match_segments(&self, parts: &[&str]) -> Option<Params> {
        let segments = match &self.matcher {
            Matcher::Segments(segments) => segments,
            Matcher::Regex(_) => return self.match_path(&join_path(parts)),
        };
        let (min, max) = self.segment_range();
        if parts.len() < min || parts.len() > max {
            return None;
        }

        let mut params = Params::new();
        for (segment, part) in segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Required(name) | Segment::Optional(name) => {
                    params.insert(name.clone(), decode_segment(part));
                }
            }
        }
        Some(params)
    }

    /// Generates a path from parameters.
    ///
    /// Every required parameter must be supplied with a non-empty value.
    /// Optional parameters are emitted while present and non-empty. Pairs
    /// not consumed by the path are appended as a query string in input
    /// order.
    ///
    /// # Example
    ///
    /// ```
    /// use oxide_routing::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/posts/:id").unwrap();
    /// let path = pattern.reverse([("id", "123"), ("page", "2")]).unwrap();
    /// assert_eq!(path, "/posts/123?page=2");
    /// ```
    pub fn reverse<I, K, V>(&self, params: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let Matcher::Segments(segments) = &self.matcher else {
            return Err(RoutingError::invalid(format!(
                "cannot compile regex path `{}`",
                self.pattern
            )));
        };

        let mut remaining: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.to_string()))
            .collect();
        let mut take = |name: &str| {
            remaining
                .iter()
                .position(|(k, _)| k == name)
                .map(|pos| remaining.remove(pos).1)
        };

        let mut path = String::new();
        for segment in segments {
            match segment {
                Segment::Literal(lit) => {
                    path.push('/');
                    path.push_str(lit);
                }
                Segment::Required(name) => {
                    let value = take(name).filter(|v| !v.is_empty()).ok_or_else(|| {
                        RoutingError::invalid(format!(
                            "missing required parameter `{name}` for `{}`",
                            self.pattern
                        ))
                    })?;
                    path.push('/');
                    path.push_str(&urlencoding::encode(&value));
                }
                Segment::Optional(name) => match take(name).filter(|v| !v.is_empty()) {
                    Some(value) => {
                        path.push('/');
                        path.push_str(&urlencoding::encode(&value));
                    }
                    None => break,
                },
            }
        }

        if path.is_empty() {
            path.push('/');
        }

        append_query(&mut path, &remaining);
        Ok(path)
    }
}

/// Splits a path into its non-empty segments, ignoring any query string.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Appends `pairs` to `path` as an encoded query string.
pub(crate) fn append_query(path: &mut String, pairs: &[(String, String)]) {
    if pairs.is_empty() {
        return;
    }
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    path.push('?');
    path.push_str(&query);
}

pub(crate) fn join_path(parts: &[&str]) -> String {
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

fn validate_name(pattern: &str, name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(RoutingError::invalid(format!(
            "path `{pattern}`: invalid parameter name `{name}`"
        )));
    }
    Ok(())
}
