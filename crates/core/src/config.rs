//! Controller configuration.
//!
//! Precedence, lowest first: defaults, TOML file, environment, CLI flags.
//! CLI flags are applied by the binary through the `with_*` setters.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// How target descriptors are turned into live resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    /// Fixed set of statically typed kinds.
    #[default]
    Typed,
    /// Any kind, addressed by group/version/resource.
    Dynamic,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed => write!(f, "typed"),
            Self::Dynamic => write!(f, "dynamic"),
        }
    }
}

impl FromStr for ResolutionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "typed" => Ok(Self::Typed),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(Error::invalid_config(format!(
                "unknown resolution strategy '{other}' (expected 'typed' or 'dynamic')"
            ))),
        }
    }
}

/// Requeue backoff applied by the controller after a failed pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay after the first failure.
    #[serde(rename = "base_ms", with = "duration_millis", default = "default_backoff_base")]
    pub base: Duration,

    /// Upper bound on the delay.
    #[serde(rename = "max_ms", with = "duration_millis", default = "default_backoff_max")]
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: default_backoff_base(),
            max: default_backoff_max(),
        }
    }
}

/// Configuration for the epha controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Resolution strategy, fixed for the lifetime of the process.
    #[serde(default)]
    pub strategy: ResolutionStrategy,

    /// Kinds the typed strategy accepts.
    #[serde(default = "default_typed_kinds")]
    pub typed_kinds: Vec<String>,

    /// Namespace to watch. `None` watches all namespaces.
    #[serde(default)]
    pub namespace: Option<String>,

    /// Tracing filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strategy: ResolutionStrategy::default(),
            typed_kinds: default_typed_kinds(),
            namespace: None,
            log_filter: default_log_filter(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TomlParseFailed`] on malformed input.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::toml_parse_failed(e.to_string()))
    }

    /// Apply `EPHA_STRATEGY`, `EPHA_NAMESPACE` and `EPHA_LOG` overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `EPHA_STRATEGY` names an unknown strategy.
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the strategy override names an unknown strategy.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(strategy) = lookup("EPHA_STRATEGY") {
            self.strategy = strategy.parse()?;
        }
        if let Some(namespace) = lookup("EPHA_NAMESPACE").filter(|ns| !ns.is_empty()) {
            self.namespace = Some(namespace);
        }
        if let Some(filter) = lookup("EPHA_LOG").filter(|f| !f.is_empty()) {
            self.log_filter = filter;
        }
        Ok(self)
    }

    /// Set the resolution strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Restrict the watch to one namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Check internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.backoff.base.is_zero() {
            return Err(Error::invalid_config("backoff.base_ms must be greater than zero"));
        }
        if self.backoff.base > self.backoff.max {
            return Err(Error::invalid_config(format!(
                "backoff.base_ms ({}) exceeds backoff.max_ms ({})",
                self.backoff.base.as_millis(),
                self.backoff.max.as_millis()
            )));
        }
        if self.strategy == ResolutionStrategy::Typed && self.typed_kinds.is_empty() {
            return Err(Error::invalid_config(
                "typed_kinds must not be empty with the typed strategy",
            ));
        }
        Ok(())
    }
}

fn default_typed_kinds() -> Vec<String> {
    vec!["Deployment".to_string(), "ReplicaSet".to_string()]
}

fn default_log_filter() -> String {
    "info".to_string()
}

const fn default_backoff_base() -> Duration {
    Duration::from_millis(500)
}

const fn default_backoff_max() -> Duration {
    Duration::from_secs(300)
}

/// Serialization helper for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.strategy, ResolutionStrategy::Typed);
        assert_eq!(config.typed_kinds, vec!["Deployment", "ReplicaSet"]);
        assert!(config.namespace.is_none());
        assert_eq!(config.backoff.base, Duration::from_millis(500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
strategy = "dynamic"
namespace = "team-a"
log_filter = "epha=debug"

[backoff]
base_ms = 250
max_ms = 10000
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.strategy, ResolutionStrategy::Dynamic);
        assert_eq!(config.namespace.as_deref(), Some("team-a"));
        assert_eq!(config.log_filter, "epha=debug");
        assert_eq!(config.backoff.base, Duration::from_millis(250));
        assert_eq!(config.backoff.max, Duration::from_secs(10));
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file(Path::new("/nonexistent/epha.toml"));
        assert!(matches!(result, Err(Error::FileReadFailed { .. })));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::from_toml("strategy = ");
        assert!(matches!(result, Err(Error::TomlParseFailed { .. })));
    }

    #[test]
    fn test_unknown_strategy_in_file() {
        assert!(Config::from_toml(r#"strategy = "magic""#).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("EPHA_STRATEGY", "Dynamic"),
            ("EPHA_NAMESPACE", "ns1"),
            ("EPHA_LOG", "debug"),
        ]);

        let config = Config::default()
            .with_overrides(|name| vars.get(name).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.strategy, ResolutionStrategy::Dynamic);
        assert_eq!(config.namespace.as_deref(), Some("ns1"));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_bad_strategy_override() {
        let result = Config::default().with_overrides(|name| {
            (name == "EPHA_STRATEGY").then(|| "sometimes".to_string())
        });
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_validate_rejects_inverted_backoff() {
        let mut config = Config::default();
        config.backoff.base = Duration::from_secs(10);
        config.backoff.max = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_base() {
        let mut config = Config::default();
        config.backoff.base = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_typed_kinds_only_matter_for_typed() {
        let mut config = Config::default();
        config.typed_kinds.clear();
        assert!(config.validate().is_err());
        assert!(config.with_strategy(ResolutionStrategy::Dynamic).validate().is_ok());
    }
}
