//! Engine configuration.
//!
//! Precedence, lowest to highest: defaults, JSON document, environment
//! variables, explicit setters (the CLI applies its flags last).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DiagError, Result};

/// Number of flows kept per bridge in the hit ranking.
pub const TOP_FLOWS_PER_BRIDGE: usize = 10;

/// Default bound on one external query.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 10;

/// Usage at or above this percentage is "caution".
pub const DEFAULT_CAUTION_PERCENT: f64 = 70.0;

/// Usage above this percentage is "warning".
pub const DEFAULT_WARNING_PERCENT: f64 = 90.0;

pub const ENV_TOP_N: &str = "OVSDIAG_TOP_N";
pub const ENV_QUERY_TIMEOUT: &str = "OVSDIAG_QUERY_TIMEOUT_SECS";
pub const ENV_OVSDB_TOOL: &str = "OVSDIAG_OVSDB_TOOL";
pub const ENV_WINDOW: &str = "OVSDIAG_WINDOW_SECS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Size of the per-bridge top flow ranking.
    pub top_n: usize,
    /// Bound on a single database query, in seconds.
    pub query_timeout_secs: u64,
    /// Executable used to query the snapshot.
    pub ovsdb_tool: String,
    /// Database name used in query transactions.
    pub database: String,
    /// Explicit observation window for coverage rates. Overrides any window
    /// found in the dump itself.
    pub observation_window_secs: Option<f64>,
    pub caution_percent: f64,
    pub warning_percent: f64,
    /// Extra interface-name conventions for pod mapping. Each regex must
    /// capture `pod` and may capture `namespace`.
    pub pod_name_patterns: Vec<String>,
    /// Parse dumps and analyze bridges on worker threads.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_n: TOP_FLOWS_PER_BRIDGE,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            ovsdb_tool: "ovsdb-tool".to_string(),
            database: "Open_vSwitch".to_string(),
            observation_window_secs: None,
            caution_percent: DEFAULT_CAUTION_PERCENT,
            warning_percent: DEFAULT_WARNING_PERCENT,
            pod_name_patterns: Vec::new(),
            parallel: true,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| DiagError::Config {
            message: format!("invalid JSON configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `OVSDIAG_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Overlay `OVSDIAG_*` environment variables onto this configuration.
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(v) = env_var(ENV_TOP_N) {
            self.top_n = parse_env(ENV_TOP_N, &v)?;
        }
        if let Some(v) = env_var(ENV_QUERY_TIMEOUT) {
            self.query_timeout_secs = parse_env(ENV_QUERY_TIMEOUT, &v)?;
        }
        if let Some(v) = env_var(ENV_OVSDB_TOOL) {
            self.ovsdb_tool = v;
        }
        if let Some(v) = env_var(ENV_WINDOW) {
            self.observation_window_secs = Some(parse_env(ENV_WINDOW, &v)?);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(DiagError::Config {
                message: "top_n must be at least 1".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.caution_percent)
            || !(0.0..=100.0).contains(&self.warning_percent)
            || self.caution_percent > self.warning_percent
        {
            return Err(DiagError::Config {
                message: format!(
                    "thresholds must satisfy 0 <= caution ({}) <= warning ({}) <= 100",
                    self.caution_percent, self.warning_percent
                ),
            });
        }
        if let Some(window) = self.observation_window_secs {
            if !(window.is_finite() && window > 0.0) {
                return Err(DiagError::Config {
                    message: format!("observation window must be positive, got {}", window),
                });
            }
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| DiagError::Config {
        message: format!("{}={:?} is not a valid value", name, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.top_n, 10);
        assert_eq!(config.query_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_document() {
        let config = EngineConfig::from_json_str(r#"{"top_n": 5, "observation_window_secs": 60}"#)
            .unwrap();
        assert_eq!(config.top_n, 5);
        assert_eq!(config.observation_window_secs, Some(60.0));
        assert_eq!(config.ovsdb_tool, "ovsdb-tool");
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let result =
            EngineConfig::from_json_str(r#"{"caution_percent": 95, "warning_percent": 90}"#);
        assert!(matches!(result, Err(DiagError::Config { .. })));
    }

    #[test]
    fn test_rejects_zero_window() {
        let config = EngineConfig {
            observation_window_secs: Some(0.0),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
