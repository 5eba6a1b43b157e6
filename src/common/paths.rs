//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/hunit/`
//! - macOS: `~/Library/Application Support/hunit/`
//! - Windows: `%APPDATA%\hunit\`

use std::path::PathBuf;

/// Application name used for directory lookup
const APP_NAME: &str = "hunit";

/// Environment variable overriding the configuration file location
pub const CONFIG_ENV: &str = "HUNIT_CONFIG";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
///
/// `HUNIT_CONFIG` takes precedence over the platform location.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    config_dir().map(|dir| dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_valid() {
        let dir = config_dir();
        assert!(dir.is_some());
    }

    #[test]
    fn test_config_path_is_toml() {
        if std::env::var(CONFIG_ENV).is_err() {
            let path = config_path().unwrap();
            assert_eq!(path.file_name().unwrap(), "config.toml");
        }
    }
}
