//! The supervised child process.
//!
//! At most one child is tracked at a time. Each child is placed in its own
//! process group so that forwarded signals reach everything it started
//! without touching the supervisor.

use std::io::{self, PipeWriter};
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::config::SupervisorConfig;

/// Exit status a shell uses for a command it could not execute.
pub const EXIT_NOT_EXECUTABLE: i32 = 127;

/// Error type for spawning the child.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The program was not found.
    #[error("Command not found")]
    NotFound,
    /// The program is not executable by this user.
    #[error("Permission denied")]
    PermissionDenied,
    /// The program exists but the kernel refused to execute it.
    #[error("Cannot execute: {0}")]
    Exec(#[source] io::Error),
    /// Other I/O error, typically resource exhaustion.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => return Self::NotFound,
            io::ErrorKind::PermissionDenied => return Self::PermissionDenied,
            _ => {}
        }
        match err.raw_os_error().map(Errno::from_raw) {
            Some(
                Errno::ENOEXEC
                | Errno::ETXTBSY
                | Errno::ELOOP
                | Errno::ENOTDIR
                | Errno::ENAMETOOLONG
                | Errno::EISDIR,
            ) => Self::Exec(err),
            _ => Self::Io(err),
        }
    }

    /// Whether retrying can never succeed.
    ///
    /// A program that cannot be executed is the in-process counterpart of a
    /// child exiting with [`EXIT_NOT_EXECUTABLE`].
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::NotFound | Self::PermissionDenied | Self::Exec(_))
    }
}

/// Errors from signalling or reaping the child. None of these are fatal.
#[derive(thiserror::Error, Debug)]
pub enum ChildError {
    #[error("wait: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: io::Error,
    },
    #[error("killpg: {0}")]
    Signal(#[from] nix::Error),
}

/// How a child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// Exited with status 0.
    Success,
    /// Exited with a nonzero status other than 127.
    Failed(i32),
    /// Exited with status 127: the command could not be executed.
    NotExecutable,
    /// Killed by the given signal number.
    Signaled(i32),
    /// Status could not be determined.
    Unknown,
}

impl ChildExit {
    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(0), _) => Self::Success,
            (Some(EXIT_NOT_EXECUTABLE), _) => Self::NotExecutable,
            (Some(code), _) => Self::Failed(code),
            (None, Some(signal)) => Self::Signaled(signal),
            (None, None) => Self::Unknown,
        }
    }

    /// Whether the supervisor should give up instead of restarting.
    #[must_use]
    pub fn is_permanent(self) -> bool {
        self == Self::NotExecutable
    }

    /// Log line for this exit, if it is worth one.
    ///
    /// Clean exits and deaths by SIGTERM, which the supervisor itself sends,
    /// are silent.
    #[must_use]
    pub fn describe(self) -> Option<String> {
        match self {
            Self::Success => None,
            Self::Failed(code) => Some(format!("child exited {code}")),
            Self::NotExecutable => Some(format!("child exited {EXIT_NOT_EXECUTABLE}")),
            Self::Signaled(signal) if signal == Signal::SIGTERM as i32 => None,
            Self::Signaled(signal) => Some(format!("child got signal {}", signal_name(signal))),
            Self::Unknown => Some("child exited with unknown status".to_string()),
        }
    }
}

fn signal_name(signal: i32) -> String {
    Signal::try_from(signal).map_or_else(|_| signal.to_string(), |s| s.to_string())
}

/// A reaped child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reaped {
    pub pid: u32,
    pub uptime: Duration,
    pub exit: ChildExit,
}

#[derive(Debug)]
struct RunningChild {
    pid: u32,
    started: Instant,
    child: Child,
}

/// Owner of the (at most one) live child.
#[derive(Debug, Default)]
pub struct ChildHandle {
    current: Option<RunningChild>,
}

impl ChildHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Process id of the live child, which is also its process group id.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.current.as_ref().map(|c| c.pid)
    }

    /// How long the live child has been up.
    #[must_use]
    pub fn uptime(&self, now: Instant) -> Option<Duration> {
        self.current
            .as_ref()
            .map(|c| now.saturating_duration_since(c.started))
    }

    /// Start the configured command with its output on the capture pipes.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process cannot be created or the
    /// program cannot be executed.
    pub fn spawn(
        &mut self,
        config: &SupervisorConfig,
        stdout: &PipeWriter,
        stderr: &PipeWriter,
        now: Instant,
    ) -> Result<u32, SpawnError> {
        debug_assert!(self.current.is_none(), "spawn with a live child");

        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args)
            .stdout(stdout.try_clone()?)
            .stderr(stderr.try_clone()?)
            .process_group(0);

        let child = cmd.spawn().map_err(SpawnError::from_io)?;
        let pid = child
            .id()
            .ok_or_else(|| SpawnError::Io(io::Error::other("spawned child has no pid")))?;

        tracing::debug!(pid, command = %config.command_line(), "Spawned child");
        self.current = Some(RunningChild {
            pid,
            started: now,
            child,
        });
        Ok(pid)
    }

    /// Send `signal` to the child's process group.
    ///
    /// Returns `false` without doing anything if no child is running.
    ///
    /// # Errors
    ///
    /// Returns `ChildError::Signal` if delivery fails.
    pub fn signal(&self, signal: Signal) -> Result<bool, ChildError> {
        let Some(pid) = self.pid() else {
            return Ok(false);
        };
        let pgid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        killpg(pgid, signal)?;
        Ok(true)
    }

    /// Resolve once the live child has terminated.
    ///
    /// Never resolves while no child is running. Cancel safe.
    pub async fn exited(&mut self) {
        match self.current.as_mut() {
            Some(running) => {
                // Errors surface again from `reap`.
                let _ = running.child.wait().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Collect the live child's exit status without blocking.
    ///
    /// Returns `None` if there is no child or it is still running. On
    /// success the handle becomes empty.
    ///
    /// # Errors
    ///
    /// Returns `ChildError::Wait` if the status cannot be queried; the
    /// child stays tracked.
    pub fn reap(&mut self, now: Instant) -> Result<Option<Reaped>, ChildError> {
        let Some(running) = self.current.as_mut() else {
            return Ok(None);
        };

        let status = match running.child.try_wait() {
            Ok(Some(status)) => status,
            Ok(None) => return Ok(None),
            Err(source) => {
                return Err(ChildError::Wait {
                    pid: running.pid,
                    source,
                })
            }
        };

        Ok(self.current.take().map(|running| Reaped {
            pid: running.pid,
            uptime: now.saturating_duration_since(running.started),
            exit: ChildExit::from_status(status),
        }))
    }

    /// Stop tracking the live child without an exit status.
    ///
    /// Used when the child can no longer be waited for.
    pub fn abandon(&mut self, now: Instant) -> Option<Reaped> {
        self.current.take().map(|running| Reaped {
            pid: running.pid,
            uptime: now.saturating_duration_since(running.started),
            exit: ChildExit::Unknown,
        })
    }
}
