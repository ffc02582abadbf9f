//! src/config.rs
//! ============================================================================
//! # Config: dispatch and logging settings
//!
//! Loads and saves settings as TOML from the platform config path using the
//! [`directories`](https://docs.rs/directories) crate. Every field has a
//! default, so a partial (or missing) file is always usable.
//!
//! ## Example
//! ```rust,ignore
//! let config = Config::load().await?;
//! let view = View::with_config(&config.dispatch);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing::info;

use crate::error::{SwitchboardError, SwitchboardResult};
use crate::logging::LoggerConfig;

/// Tuning knobs for the interest registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Pre-sized capacity for the name-keyed maps
    pub initial_capacity: usize,

    /// Deliver broadcasts that share a notification name one at a time.
    ///
    /// A broadcast issued while that name is already being delivered (from a
    /// callback, or from another thread) is queued and returns `Ok(())`
    /// immediately; the in-flight broadcaster delivers it next, taking a fresh
    /// snapshot. Errors from queued deliveries are logged, not returned.
    pub serialize_broadcasts: bool,

    /// Broadcasts slower than this are logged at WARN
    #[serde(with = "humantime_serde")]
    pub slow_broadcast_threshold: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            serialize_broadcasts: false,
            slow_broadcast_threshold: Duration::from_millis(250),
        }
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub logging: LoggerConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> SwitchboardResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> SwitchboardResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads config from the platform config dir, writing defaults if absent.
    pub async fn load() -> SwitchboardResult<Self> {
        let path = Self::config_path()?;
        Self::load_from_path(&path).await
    }

    pub async fn load_from_path(path: &Path) -> SwitchboardResult<Self> {
        if path.exists() {
            info!("Loading config from {}", path.display());
            let text = TokioFs::read_to_string(path)
                .await
                .map_err(|e| SwitchboardError::config_io(path, e))?;

            Self::from_toml_str(&text)
        } else {
            info!(
                "No config file found at {}, using default configuration. Creating it now.",
                path.display()
            );

            let default_config = Self::default();
            default_config.save_to_path(path).await?;

            Ok(default_config)
        }
    }

    pub async fn save(&self) -> SwitchboardResult<()> {
        let path = Self::config_path()?;
        self.save_to_path(&path).await
    }

    pub async fn save_to_path(&self, path: &Path) -> SwitchboardResult<()> {
        info!("Saving config to {}", path.display());

        if let Some(parent) = path.parent() {
            TokioFs::create_dir_all(parent)
                .await
                .map_err(|e| SwitchboardError::config_io(parent, e))?;
        }

        let toml_str = self.to_toml_string()?;
        TokioFs::write(path, toml_str)
            .await
            .map_err(|e| SwitchboardError::config_io(path, e))?;

        Ok(())
    }

    /// Returns the canonical config file path using `directories::ProjectDirs`.
    pub fn config_path() -> SwitchboardResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> SwitchboardResult<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "switchboard", "Switchboard")
            .ok_or(SwitchboardError::ConfigDirUnavailable)?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str(
            r#"
            [dispatch]
            serialize_broadcasts = true
            slow_broadcast_threshold = "2s"
            "#,
        )
        .unwrap();

        assert!(config.dispatch.serialize_broadcasts);
        assert_eq!(config.dispatch.slow_broadcast_threshold, Duration::from_secs(2));
        assert_eq!(config.dispatch.initial_capacity, 64);
        assert_eq!(config.logging, LoggerConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = Config::from_toml_str("dispatch = 12").unwrap_err();
        assert_eq!(err.operation_type(), "configuration");
    }

    #[tokio::test]
    async fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.toml");

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.dispatch.initial_capacity = 8;
        config.logging.stderr = true;
        config.save_to_path(&path).await.unwrap();

        let loaded = Config::load_from_path(&path).await.unwrap();
        assert_eq!(loaded, config);
    }
}
