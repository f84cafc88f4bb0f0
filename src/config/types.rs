//! Configuration types.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{humanize, ConfigError};

/// Default delay before the first restart.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default uptime after which the backoff resets.
pub const DEFAULT_COOLOFF: Duration = Duration::from_secs(15 * 60);

/// Resolved configuration for one supervised command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Name used as the log identity.
    pub name: String,
    /// Base restart interval.
    pub interval: Duration,
    /// Uptime after which the interval resets to `interval`.
    pub cooloff: Duration,
    /// Upper bound on the restart interval.
    pub max_interval: Option<Duration>,
    /// Stay attached to the terminal instead of detaching.
    pub foreground: bool,
    /// Append log records to this file.
    pub log_file: Option<PathBuf>,
    /// Program to execute, looked up in `PATH`.
    pub program: OsString,
    /// Arguments passed to `program`.
    pub args: Vec<OsString>,
}

impl SupervisorConfig {
    /// Create a configuration with defaults for the given command line.
    ///
    /// The name defaults to the base name of the program.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingCommand` if `command` is empty.
    pub fn new<I, S>(command: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut command = command.into_iter().map(Into::into);
        let program = command.next().ok_or(ConfigError::MissingCommand)?;
        if program.is_empty() {
            return Err(ConfigError::MissingCommand);
        }

        Ok(Self {
            name: default_name(&program),
            interval: DEFAULT_INTERVAL,
            cooloff: DEFAULT_COOLOFF,
            max_interval: None,
            foreground: false,
            log_file: None,
            program,
            args: command.collect(),
        })
    }

    /// Override the log identity.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the base restart interval.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the cooloff threshold.
    #[must_use]
    pub fn cooloff(mut self, cooloff: Duration) -> Self {
        self.cooloff = cooloff;
        self
    }

    /// Cap the restart interval.
    #[must_use]
    pub fn max_interval(mut self, max: Duration) -> Self {
        self.max_interval = Some(max);
        self
    }

    /// Run in the foreground.
    #[must_use]
    pub fn foreground(mut self, foreground: bool) -> Self {
        self.foreground = foreground;
        self
    }

    /// Append log records to a file.
    #[must_use]
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::CeilingBelowInterval` when the ceiling is
    /// shorter than the base interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.max_interval {
            Some(max) if max < self.interval => Err(ConfigError::CeilingBelowInterval {
                interval: humanize(self.interval),
                max: humanize(max),
            }),
            _ => Ok(()),
        }
    }

    /// The full command line, program first.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn default_name(program: &OsStr) -> String {
    Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_string_lossy()
        .into_owned()
}
