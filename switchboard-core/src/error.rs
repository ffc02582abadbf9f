//! src/error.rs
//! ============================================================================
//! # `SwitchboardError`: unified error type for the dispatch framework
//!
//! Dispatch itself is best-effort: lookup misses, duplicate registrations and
//! removals of absent entries are *not* errors and never surface here. What
//! does surface is input validation, failures raised by observer callbacks
//! (which abort the rest of a broadcast), and configuration I/O.

use std::{io, path::PathBuf};

use compact_str::CompactString;
use smallvec::{SmallVec, smallvec};
use thiserror::Error;
use tracing::{Level, event};

/// Convenient alias carrying the unified error type
pub type SwitchboardResult<T> = Result<T, SwitchboardError>;

/// Primary error enumeration (grouped by concern)
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SwitchboardError {
    // ────────────────────────────────────────────────────────────
    // Input validation
    // ────────────────────────────────────────────────────────────
    #[error("Invalid input: {field} - {message}")]
    InvalidInput {
        field: CompactString,
        message: CompactString,
    },

    // ────────────────────────────────────────────────────────────
    // Callback failures
    // ────────────────────────────────────────────────────────────
    /// Raised by a listener, command or raw observer callback.
    #[error(transparent)]
    Handler(#[from] anyhow::Error),

    // ────────────────────────────────────────────────────────────
    // Configuration
    // ────────────────────────────────────────────────────────────
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Failed to access config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not determine config directory")]
    ConfigDirUnavailable,

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(CompactString),
}

impl SwitchboardError {
    #[inline]
    #[must_use]
    pub fn invalid_input(field: &str, message: &str) -> Self {
        Self::InvalidInput {
            field: CompactString::new(field),
            message: CompactString::new(message),
        }
    }

    /// Wrap any displayable failure raised inside a callback.
    #[must_use]
    pub fn handler<M>(message: M) -> Self
    where
        M: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        Self::Handler(anyhow::Error::msg(message))
    }

    #[inline]
    #[must_use]
    pub fn config_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ConfigIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure came from user callback code rather than the framework
    #[inline]
    #[must_use]
    pub const fn is_handler_failure(&self) -> bool {
        matches!(self, Self::Handler(_))
    }

    #[inline]
    #[must_use]
    pub const fn operation_type(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "input_validation",

            Self::Handler(_) => "callback",

            Self::Config(_)
            | Self::ConfigSerialize(_)
            | Self::ConfigIo { .. }
            | Self::ConfigDirUnavailable => "configuration",

            Self::Other(_) => "unknown_error",
        }
    }

    // ────────────────────────────────────────────────────────────
    // Structured-field extraction (SmallVec avoids heap ≤4 items)
    // ────────────────────────────────────────────────────────────
    #[must_use]
    pub fn extract_trace_fields(&self) -> SmallVec<[(&'static str, CompactString); 4]> {
        match self {
            Self::InvalidInput { field, message } => smallvec![
                ("field", field.clone()),
                ("message", message.clone()),
            ],

            Self::ConfigIo { path, source } => smallvec![
                ("path", CompactString::from(path.display().to_string())),
                ("error_kind", CompactString::from(format!("{:?}", source.kind()))),
            ],

            _ => smallvec![],
        }
    }

    /// Emit a single structured ERROR event and hand the error back.
    #[must_use]
    pub fn trace(self) -> Self {
        let extra = self.extract_trace_fields();

        event!(
            Level::ERROR,
            op_type = self.operation_type(),
            error = %self,
            handler_failure = self.is_handler_failure(),
            extra_len = extra.len(),
            extra = ?extra,
        );

        self
    }
}
