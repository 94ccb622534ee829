//! Process configuration for the publisher binary

use crate::client::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS};
use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration, read from `BUILDFLUX_*` environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the Target store
    pub config_dir: PathBuf,

    /// JSON file describing the finished build
    pub build_file: Option<PathBuf>,

    /// Description of the Target the job selected explicitly
    pub target: Option<String>,

    /// Log level
    pub log_level: String,

    /// Log format (json or pretty)
    pub log_format: LogFormat,

    pub http_timeout: Duration,
    pub http_connect_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("{other} (expected 'json' or 'pretty')")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("."),
            build_file: None,
            target: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            http_connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_blank("BUILDFLUX_CONFIG_DIR") {
            config.config_dir = PathBuf::from(dir);
        }

        config.build_file = non_blank("BUILDFLUX_BUILD_FILE").map(PathBuf::from);
        config.target = non_blank("BUILDFLUX_TARGET").map(|t| t.trim().to_string());

        if let Some(level) = non_blank("BUILDFLUX_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Some(format) = non_blank("BUILDFLUX_LOG_FORMAT") {
            config.log_format = format.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "BUILDFLUX_LOG_FORMAT".to_string(),
                reason,
            })?;
        }

        if let Some(secs) = non_blank("BUILDFLUX_HTTP_TIMEOUT_SECS") {
            config.http_timeout = parse_secs("BUILDFLUX_HTTP_TIMEOUT_SECS", &secs)?;
        }

        if let Some(secs) = non_blank("BUILDFLUX_HTTP_CONNECT_TIMEOUT_SECS") {
            config.http_connect_timeout = parse_secs("BUILDFLUX_HTTP_CONNECT_TIMEOUT_SECS", &secs)?;
        }

        Ok(config)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: key.to_string(),
        reason,
    };
    let secs: u64 = value.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    if secs == 0 {
        return Err(invalid("must be greater than zero".to_string()));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.config_dir, PathBuf::from("."));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.http_connect_timeout, Duration::from_secs(10));
        assert!(config.target.is_none());
    }

    #[test]
    fn test_config_from_vars() {
        let config = Config::from_lookup(lookup(&[
            ("BUILDFLUX_CONFIG_DIR", "/var/lib/buildflux"),
            ("BUILDFLUX_BUILD_FILE", "build.json"),
            ("BUILDFLUX_TARGET", " primary "),
            ("BUILDFLUX_LOG_FORMAT", "JSON"),
            ("BUILDFLUX_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.config_dir, PathBuf::from("/var/lib/buildflux"));
        assert_eq!(config.build_file, Some(PathBuf::from("build.json")));
        assert_eq!(config.target.as_deref(), Some("primary"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Config::from_lookup(lookup(&[("BUILDFLUX_LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BUILDFLUX_LOG_FORMAT"));

        assert!(Config::from_lookup(lookup(&[("BUILDFLUX_HTTP_TIMEOUT_SECS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BUILDFLUX_HTTP_CONNECT_TIMEOUT_SECS", "0")])).is_err());
    }

    #[test]
    fn test_blank_target_is_none() {
        let config = Config::from_lookup(lookup(&[("BUILDFLUX_TARGET", "  ")])).unwrap();
        assert!(config.target.is_none());
    }
}
