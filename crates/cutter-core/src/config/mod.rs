//! Configuration management for cutter

mod backup;
pub mod serde_utils;
mod tunnel;

pub use backup::BackupConfig;
pub use tunnel::TunnelConfig;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cutter")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// On-disk layout of `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// `[backup]` section
    pub backup: BackupConfig,
    /// `[tunnel]` section
    pub tunnel: TunnelConfig,
}

impl ConfigFile {
    /// Load from an explicit path, or the default path if it exists
    ///
    /// An explicit path must exist. A missing default file yields the
    /// built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => load_config(path),
            None => {
                let path = default_config_path();
                if path.exists() {
                    load_config(&path)
                } else {
                    tracing::debug!("No config at {:?}, using defaults", path);
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");
        let err = ConfigFile::load_or_default(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == path));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ConfigFile::default();
        config.backup.container_runtime = "podman".to_string();
        config.tunnel.ready_timeout = Duration::from_secs(30);
        save_config(&path, &config).unwrap();

        let loaded: ConfigFile = load_config(&path).unwrap();
        assert_eq!(loaded.backup.container_runtime, "podman");
        assert_eq!(loaded.tunnel.ready_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tunnel]\nssh_program = \"/usr/local/bin/ssh\"\n").unwrap();

        let loaded = ConfigFile::load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded.tunnel.ssh_program, "/usr/local/bin/ssh");
        assert_eq!(loaded.tunnel.probe_interval, Duration::from_millis(250));
        assert_eq!(loaded.backup.container_runtime, "docker");
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[backup\n").unwrap();
        assert!(matches!(
            ConfigFile::load_or_default(Some(&path)),
            Err(ConfigError::Parse(_))
        ));
    }
}
