//! Config file loading and merging with command-line values.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{parse_interval, ConfigError, SupervisorConfig};

/// Unresolved settings, as written in a TOML file or given as flags.
///
/// Intervals stay as strings until [`RawConfig::resolve`] so that file and
/// command-line values share one parser and one error path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfig {
    pub name: Option<String>,
    pub interval: Option<String>,
    pub cooloff: Option<String>,
    pub max_interval: Option<String>,
    pub foreground: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl RawConfig {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Layer `other` on top of `self`; values set in `other` win.
    #[must_use]
    pub fn overlay(self, other: Self) -> Self {
        Self {
            name: other.name.or(self.name),
            interval: other.interval.or(self.interval),
            cooloff: other.cooloff.or(self.cooloff),
            max_interval: other.max_interval.or(self.max_interval),
            foreground: other.foreground.or(self.foreground),
            log_file: other.log_file.or(self.log_file),
        }
    }

    /// Parse the settings and attach them to `command`.
    ///
    /// # Errors
    ///
    /// Returns the first interval or command error found, or a validation
    /// error for inconsistent intervals.
    pub fn resolve(self, command: Vec<OsString>) -> Result<SupervisorConfig, ConfigError> {
        let mut config = SupervisorConfig::new(command)?;

        if let Some(name) = self.name {
            config = config.name(name);
        }
        if let Some(interval) = self.interval.as_deref() {
            config = config.interval(parse_interval(interval)?);
        }
        if let Some(cooloff) = self.cooloff.as_deref() {
            config = config.cooloff(parse_interval(cooloff)?);
        }
        if let Some(max) = self.max_interval.as_deref() {
            config = config.max_interval(parse_interval(max)?);
        }
        if let Some(foreground) = self.foreground {
            config = config.foreground(foreground);
        }
        if let Some(path) = self.log_file {
            config = config.log_file(path);
        }

        config.validate()?;
        Ok(config)
    }
}
