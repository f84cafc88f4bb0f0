//! Configuration error types.

use std::path::PathBuf;

/// Errors that can occur while building the supervisor configuration.
///
/// All of these are fatal and reported before any child is spawned.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Interval is empty, not a number, or out of range.
    #[error("Invalid interval: {0:?}")]
    InvalidDuration(String),

    /// Interval carries a unit suffix that is not recognized.
    #[error("Invalid interval suffix {suffix:?} in {input:?}")]
    UnknownSuffix { input: String, suffix: String },

    /// No command to supervise was given.
    #[error("No command")]
    MissingCommand,

    /// Backoff ceiling is shorter than the base restart interval.
    #[error("Max interval {max} is shorter than restart interval {interval}")]
    CeilingBelowInterval { interval: String, max: String },

    /// Config file could not be read.
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema.
    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Log file path cannot be made absolute.
    #[error("Invalid log file path {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
