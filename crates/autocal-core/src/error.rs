//! Calibration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for calibration operations.
pub type CalResult<T> = Result<T, CalError>;

/// Errors that can occur while preparing or running a calibration.
///
/// A missing colorimeter is a probe result and has no variant here.
#[derive(Debug, Error)]
pub enum CalError {
    /// An RGB trim override outside [-100, 100].
    #[error("{channel} trim {value}% is outside [-100, 100]")]
    TrimOutOfRange {
        /// Channel name.
        channel: &'static str,
        /// Offending value in percent.
        value: f64,
    },

    /// Any other rejected override value.
    #[error("invalid {field}: {reason}")]
    InvalidSetting {
        /// Setting name.
        field: &'static str,
        /// Description of what's wrong.
        reason: String,
    },

    /// Hour outside 0..=23.
    #[error("hour {0} is outside 0..=23")]
    InvalidHour(u32),

    /// External tool exited with a non-zero status.
    #[error("{tool} exited with status {code}")]
    ToolFailed {
        /// Program that failed.
        tool: String,
        /// Exit code, -1 when terminated by a signal.
        code: i32,
    },

    /// External tool could not be started.
    #[error("failed to start {tool}: {source}")]
    Spawn {
        /// Program that failed to start.
        tool: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No stored profile for the requested bucket.
    #[error("profile {name} not found in search paths")]
    ProfileNotFound {
        /// File name that was searched for.
        name: String,
    },

    /// Config file not found.
    #[error("config file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched.
        path: PathBuf,
    },

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CalError {
    /// Returns true for errors raised before any subprocess runs.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::TrimOutOfRange { .. } | Self::InvalidSetting { .. } | Self::InvalidHour(_)
        )
    }
}
