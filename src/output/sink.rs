//! Log sink for captured output and supervisor lifecycle records.

use std::fmt;

/// Severity of a log record, in syslog terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Notice,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Notice => "notice",
            Self::Info => "info",
        })
    }
}

/// Destination for log records.
///
/// Every call is one synchronous record; implementations must not buffer
/// across calls in a way that reorders them.
pub trait LogSink {
    fn log(&self, severity: Severity, message: &str);
}

impl<T: LogSink + ?Sized> LogSink for &T {
    fn log(&self, severity: Severity, message: &str) {
        (**self).log(severity, message);
    }
}

/// Sink that forwards records to `tracing`.
///
/// `tracing` has no notice level; notices are emitted as `WARN` so that
/// they stay visible under the default `info` filter and stand out from
/// routine output.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Error => tracing::error!("{message}"),
            Severity::Notice => tracing::warn!("{message}"),
            Severity::Info => tracing::info!("{message}"),
        }
    }
}
