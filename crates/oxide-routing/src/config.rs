//! Resolver configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoutingError};

/// Strategy used to find candidate routes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// Index lookup by segment count and literal tag.
    #[default]
    Subset,
    /// Scan of every route in registration order.
    Linear,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subset => write!(f, "subset"),
            Self::Linear => write!(f, "linear"),
        }
    }
}

/// Route processor settings.
///
/// ```
/// use oxide_routing::{Algorithm, RoutingConfig};
///
/// let config = RoutingConfig::from_json(r#"{ "algorithm": "linear" }"#).unwrap();
/// assert_eq!(config.algorithm, Algorithm::Linear);
/// assert!(config.trace);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Candidate lookup strategy.
    pub algorithm: Algorithm,
    /// Router slot used when the host asks for the default router.
    pub default_router: Option<String>,
    /// Whether to record a `RoutingTrace` on processed requests.
    pub trace: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Subset,
            default_router: None,
            trace: true,
        }
    }
}

impl RoutingConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| RoutingError::invalid(format!("invalid routing config: {e}")))
    }

    /// Sets the algorithm.
    #[must_use]
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the default router slot.
    #[must_use]
    pub fn default_router(mut self, name: impl Into<String>) -> Self {
        self.default_router = Some(name.into());
        self
    }

    /// Enables or disables trace recording.
    #[must_use]
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }
}
