//! Parameter filters.
//!
//! A filter is either a named alias (`@number`, `@slug`, ...) or a raw
//! regular expression. Raw expressions are anchored so they must match the
//! whole captured value.

use regex::Regex;

use crate::error::{Result, RoutingError};

const ALIASES: &[(&str, &str)] = &[
    ("@number", r"^[0-9]+$"),
    ("@integer", r"^-?[0-9]+$"),
    ("@alpha", r"^[A-Za-z]+$"),
    ("@alphanumeric", r"^[A-Za-z0-9]+$"),
    ("@slug", r"^[a-z0-9]+(?:-[a-z0-9]+)*$"),
    (
        "@uuid",
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    ),
];

/// A compiled validation pattern for one route parameter.
#[derive(Debug, Clone)]
pub struct Filter {
    source: String,
    regex: Regex,
}

impl Filter {
    /// Compiles a filter from an alias or a raw expression.
    pub fn new(pattern: &str) -> Result<Self> {
        let expr = if pattern.starts_with('@') {
            ALIASES
                .iter()
                .find(|(alias, _)| *alias == pattern)
                .map(|(_, expr)| (*expr).to_string())
                .ok_or_else(|| RoutingError::invalid(format!("unknown filter alias `{pattern}`")))?
        } else {
            anchor(pattern)
        };
        let regex = Regex::new(&expr)
            .map_err(|e| RoutingError::invalid(format!("invalid filter `{pattern}`: {e}")))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Returns whether `value` passes the filter.
    pub fn accepts(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    /// The alias or expression the filter was built from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

fn anchor(pattern: &str) -> String {
    let inner = pattern.strip_prefix('^').unwrap_or(pattern);
    let inner = match inner.strip_suffix('$') {
        // An odd run of backslashes escapes the `$`.
        Some(head) if head.bytes().rev().take_while(|b| *b == b'\\').count() % 2 == 0 => head,
        _ => inner,
    };
    format!("^(?:{inner})$")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_alias() {
        let filter = Filter::new("@number").unwrap();
        assert!(filter.accepts("456"));
        assert!(!filter.accepts("abc"));
        assert!(!filter.accepts("12a"));
        assert!(!filter.accepts(""));
    }

    #[test]
    fn test_slug_and_uuid_aliases() {
        let slug = Filter::new("@slug").unwrap();
        assert!(slug.accepts("hello-world"));
        assert!(!slug.accepts("Hello World"));

        let uuid = Filter::new("@uuid").unwrap();
        assert!(uuid.accepts("67e55044-10b1-426f-9247-bb680e5fe0c8"));
        assert!(!uuid.accepts("67e55044"));
    }

    #[test]
    fn test_raw_regex_is_anchored() {
        let filter = Filter::new("[a-z]{2}").unwrap();
        assert!(filter.accepts("en"));
        assert!(!filter.accepts("eng"));

        let alternation = Filter::new("en|de").unwrap();
        assert!(alternation.accepts("de"));
        assert!(!alternation.accepts("den"));
    }

    #[test]
    fn test_escaped_dollar_kept() {
        let filter = Filter::new(r"foo\$").unwrap();
        assert!(filter.accepts("foo$"));
        assert!(!filter.accepts("foo"));

        let filter = Filter::new(r"foo\\$").unwrap();
        assert!(filter.accepts(r"foo\"));
        assert!(!filter.accepts(r"foo\$"));
    }

    #[test]
    fn test_unknown_alias_rejected() {
        assert!(Filter::new("@nope").is_err());
        assert!(Filter::new("(unclosed").is_err());
    }
}
