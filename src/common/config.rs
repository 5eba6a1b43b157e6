//! Configuration file handling

use serde::Deserialize;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Default settings, overridden by command line flags
    #[serde(default)]
    pub defaults: Defaults,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Default settings
#[derive(Debug, Deserialize)]
pub struct Defaults {
    /// Base URL that relative request URLs are resolved against
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Trim trailing whitespace from entities before comparing
    #[serde(default = "default_true")]
    pub trim_entity: bool,

    /// Expand `${...}` expressions in request templates
    #[serde(default = "default_true")]
    pub interpolate: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            trim_entity: true,
            interpolate: true,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost/".to_string()
}

fn default_true() -> bool {
    true
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Mock listener I/O timeout, also the graceful shutdown drain bound
    #[serde(default = "default_io")]
    pub io_secs: u64,

    /// Timeout for a single test request
    #[serde(default = "default_request")]
    pub request_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            io_secs: default_io(),
            request_secs: default_request(),
        }
    }
}

fn default_io() -> u64 {
    10
}
fn default_request() -> u64 {
    30
}

impl Timeouts {
    pub fn io(&self) -> Duration {
        Duration::from_secs(self.io_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return Self::parse(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.defaults.base_url, "http://localhost/");
        assert!(config.defaults.trim_entity);
        assert_eq!(config.timeouts.io(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
[defaults]
base_url = "http://api.test:8080/"
trim_entity = false

[timeouts]
request_secs = 5
"#,
        )
        .unwrap();
        assert_eq!(config.defaults.base_url, "http://api.test:8080/");
        assert!(!config.defaults.trim_entity);
        assert!(config.defaults.interpolate);
        assert_eq!(config.timeouts.request(), Duration::from_secs(5));
        assert_eq!(config.timeouts.io_secs, 10);
    }

    #[test]
    fn test_invalid_config() {
        let err = Config::parse("[defaults]\ntrim_entity = \"maybe\"").unwrap_err();
        assert!(matches!(err, crate::common::Error::ConfigParse(_)));
    }
}
