//! `logging.rs`
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` plus a JSON
//! `fmt` layer writing through a non-blocking rolling file appender.
//! The registries themselves only ever use the `tracing` macros.

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tokio::fs as TokioFs;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, filter::Directive, layer::SubscriberExt, util::SubscriberInitExt,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub log_dir: PathBuf,
    pub log_file_prefix: CompactString,
    pub log_level: CompactString,
    pub max_log_files: usize,
    pub rotation: LogRotation,

    /// Mirror events to stderr in human-readable form as well
    pub stderr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRotation {
    Never,
    Hourly,
    Daily,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: CompactString::const_new("switchboard"),
            log_level: CompactString::const_new("info"),
            max_log_files: 10,
            rotation: LogRotation::Daily,
            stderr: false,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("Invalid log directory: {0}")]
    InvalidLogDirectory(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationFailed(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub struct LoggerBuilder {
    config: LoggerConfig,
}

impl LoggerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.config.log_level = CompactString::new(level);
        self
    }

    /// Install the global subscriber. Keep the returned guard alive for as
    /// long as log lines should be flushed to disk.
    pub async fn build(self) -> Result<WorkerGuard> {
        validate_config(&self.config)?;
        setup_log_directory(&self.config.log_dir).await?;

        let file_appender = RollingFileAppender::builder()
            .rotation(self.config.rotation.into())
            .filename_prefix(self.config.log_file_prefix.as_str())
            .filename_suffix("jsonl")
            .max_log_files(self.config.max_log_files)
            .build(&self.config.log_dir)
            .context("Failed to create file appender")?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let level_str = self.config.log_level.clone();
        let make_filter = || -> Result<EnvFilter> {
            Ok(EnvFilter::from_default_env().add_directive(
                Directive::from_str(&level_str).context("Invalid log level in config")?,
            ))
        };

        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(make_filter()?);

        let stderr_layer = self.config.stderr.then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::new(level_str.as_str()))
        });

        tracing_subscriber::registry()
            .with(json_layer)
            .with(stderr_layer)
            .try_init()
            .map_err(|_| LoggingError::AlreadyInitialized)?;

        Ok(guard)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_config(config: &LoggerConfig) -> Result<()> {
    if config.max_log_files == 0 {
        return Err(
            LoggingError::ConfigError("max_log_files must be greater than 0".to_string()).into(),
        );
    }

    if config.log_file_prefix.is_empty() {
        return Err(
            LoggingError::ConfigError("log_file_prefix must not be empty".to_string()).into(),
        );
    }

    validate_log_directory(&config.log_dir)?;
    Ok(())
}

fn validate_log_directory(path: &Path) -> Result<()> {
    if path.components().count() == 0 {
        return Err(LoggingError::InvalidLogDirectory("Empty path".to_string()).into());
    }

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(LoggingError::InvalidLogDirectory(
            "Path contains parent directory references".to_string(),
        )
        .into());
    }

    Ok(())
}

async fn setup_log_directory(log_dir: &Path) -> Result<()> {
    if !log_dir.exists() {
        TokioFs::create_dir_all(log_dir)
            .await
            .map_err(LoggingError::from)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    }
    Ok(())
}

pub async fn init_default_logging() -> Result<WorkerGuard> {
    LoggerBuilder::new().build().await
}

pub async fn init_logging_with_level(level: &str) -> Result<WorkerGuard> {
    LoggerBuilder::new().with_level(level).build().await
}

pub async fn init_logging_with_config(config: LoggerConfig) -> Result<WorkerGuard> {
    LoggerBuilder::new().with_config(config).build().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_parent_dir_escape() {
        let config = LoggerConfig {
            log_dir: PathBuf::from("../outside"),
            ..LoggerConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_retention() {
        let config = LoggerConfig {
            max_log_files: 0,
            ..LoggerConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&LoggerConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_setup_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");

        setup_log_directory(&logs).await.unwrap();
        assert!(logs.is_dir());
    }
}
