//! Configuration management for eventsieve.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::clock::Clock;
use crate::error::{Result, SieveError};
use crate::policy::PolicyNode;
use crate::ratelimit::{LimiterOptions, DEFAULT_CAPACITY, DEFAULT_CHECK_TIMEOUT};

/// Prefix of environment variables overriding file settings, e.g.
/// `EVENTSIEVE__LOG__LEVEL=debug`.
pub const ENV_PREFIX: &str = "EVENTSIEVE";

/// Main configuration for the eventsieve binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventsieveConfig {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Rate limiter state configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// The policy applied to every input; accepts everything when unset
    #[serde(default)]
    pub policy: PolicyNode,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Rate limiter state configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Keys tracked per quota before the least recently used are evicted
    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,

    /// Upper bound on a single state store call, in milliseconds
    #[serde(default = "default_check_timeout_ms")]
    pub check_timeout_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            store_capacity: default_store_capacity(),
            check_timeout_ms: default_check_timeout_ms(),
        }
    }
}

fn default_store_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_check_timeout_ms() -> u64 {
    DEFAULT_CHECK_TIMEOUT.as_millis() as u64
}

impl LimiterConfig {
    /// Limiter options reading time from `clock`.
    pub fn options(&self, clock: Arc<dyn Clock>) -> LimiterOptions {
        LimiterOptions {
            clock,
            store_capacity: self.store_capacity,
            check_timeout: Duration::from_millis(self.check_timeout_ms),
        }
    }
}

impl EventsieveConfig {
    /// Load configuration from a YAML file, with `EVENTSIEVE__*` environment
    /// overrides. A missing file yields the defaults plus overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), exists = path.exists(), "Loading configuration");

        config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SieveError::Config(e.to_string()))
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SieveError::Config(format!("Failed to parse config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::policy::NodeKind;

    #[test]
    fn test_defaults() {
        let config = EventsieveConfig::default();
        assert_eq!(config.log.level, "info");
        assert!(!config.log.json);
        assert_eq!(config.limiter.store_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.limiter.check_timeout_ms, 5000);
        assert!(matches!(config.policy.kind, NodeKind::AcceptAll));
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
log:
  level: debug
  json: true
limiter:
  store_capacity: 1000
  check_timeout_ms: 250
policy:
  type: kind_list
  kinds: [1]
  mode: allow
"#;
        let config = EventsieveConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.log.level, "debug");
        assert!(config.log.json);

        let options = config.limiter.options(Arc::new(SystemClock::new()));
        assert_eq!(options.store_capacity, 1000);
        assert_eq!(options.check_timeout, Duration::from_millis(250));
        assert!(matches!(config.policy.kind, NodeKind::KindList { .. }));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = EventsieveConfig::from_yaml("log:\n  json: true\n").unwrap();
        assert_eq!(config.log.level, "info");
        assert_eq!(config.limiter.store_capacity, DEFAULT_CAPACITY);
        assert!(matches!(config.policy.kind, NodeKind::AcceptAll));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = EventsieveConfig::from_file("/nonexistent/eventsieve.yaml").unwrap();
        assert!(matches!(config.policy.kind, NodeKind::AcceptAll));
    }

    #[test]
    fn test_invalid_policy_is_config_error() {
        let yaml = "policy:\n  type: kind_list\n  kinds: [1]\n  mode: sometimes\n";
        let err = EventsieveConfig::from_yaml(yaml);
        assert!(matches!(err, Err(SieveError::Config(_))));
    }
}
