//! Detaching from the controlling terminal.
//!
//! Must run before the tokio runtime or any other thread exists.

/// Error type for detaching.
#[derive(thiserror::Error, Debug)]
pub enum DaemonError {
    #[error("daemon: {0}")]
    Detach(#[from] nix::Error),
    #[error("Detaching is not supported on this platform; use --foreground")]
    Unsupported,
}

/// Fork into the background, start a new session and change to `/`.
///
/// Standard streams are redirected to `/dev/null` unless `keep_stdio` is
/// set.
///
/// # Errors
///
/// Returns `DaemonError::Detach` if the fork or session setup fails.
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "illumos",
    target_os = "solaris"
))]
pub fn detach(keep_stdio: bool) -> Result<(), DaemonError> {
    nix::unistd::daemon(false, keep_stdio)?;
    Ok(())
}

/// # Errors
///
/// Always returns `DaemonError::Unsupported`.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "illumos",
    target_os = "solaris"
)))]
pub fn detach(_keep_stdio: bool) -> Result<(), DaemonError> {
    Err(DaemonError::Unsupported)
}
