//! Supervisor loop.
//!
//! One task, one child. Each iteration acts on pending signals, decides how
//! long it may block, waits for the first of signal delivery, child exit,
//! captured output or the restart deadline, drains output, and spawns a new
//! child once the deadline has passed.

use std::io;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use tokio::time::Instant;

use crate::config::{humanize, SupervisorConfig};
use crate::output::{CapturePipe, LogSink, Severity};
use crate::supervisor::{
    BackoffClock, ChildError, ChildHandle, PendingSignals, Reaped, RunState, RunStateMachine,
    SignalKind, SignalSource, SpawnError,
};

/// Error type for fatal supervisor failures.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// Capture pipes could not be set up.
    #[error("Failed to create output pipe: {0}")]
    Pipe(#[source] io::Error),
    /// Signal handlers could not be installed.
    #[error("Failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
    /// The child could not be created at all.
    #[error("Failed to spawn child: {0}")]
    Spawn(#[from] SpawnError),
}

/// How the supervisor finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Stopped on request after the child was reaped.
    Stopped,
    /// The command cannot be executed; restarting is pointless.
    Failed,
}

impl Outcome {
    /// Process exit status for this outcome.
    #[must_use]
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Failed => 1,
        }
    }
}

/// What ended a blocking wait.
#[derive(Debug)]
enum Wake {
    Signal(SignalKind),
    SignalsClosed,
    ChildExited,
    Stdout(io::Result<()>),
    Stderr(io::Result<()>),
    Deadline,
}

/// Supervisor for a single command.
pub struct Supervisor<S, L> {
    config: SupervisorConfig,
    signals: S,
    signals_open: bool,
    sink: L,
    pending: PendingSignals,
    state: RunStateMachine,
    clock: BackoffClock,
    child: ChildHandle,
    restart_now: bool,
    stdout: CapturePipe,
    stderr: CapturePipe,
}

impl<S: SignalSource, L: LogSink> Supervisor<S, L> {
    /// Create a supervisor with its capture pipes.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Pipe` if the capture pipes cannot be
    /// created.
    pub fn new(config: SupervisorConfig, signals: S, sink: L) -> Result<Self, SupervisorError> {
        let clock = BackoffClock::new(
            config.interval,
            config.cooloff,
            config.max_interval,
            Instant::now(),
        );
        Ok(Self {
            config,
            signals,
            signals_open: true,
            sink,
            pending: PendingSignals::new(),
            state: RunStateMachine::new(),
            clock,
            child: ChildHandle::new(),
            restart_now: false,
            stdout: CapturePipe::new(Severity::Info).map_err(SupervisorError::Pipe)?,
            stderr: CapturePipe::new(Severity::Notice).map_err(SupervisorError::Pipe)?,
        })
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state.state()
    }

    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.state.is_stopping()
    }

    /// Number of children spawned so far.
    #[must_use]
    pub fn spawns(&self) -> u64 {
        self.state.spawns()
    }

    /// Delay the next quick exit will wait.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.clock.interval()
    }

    /// Pid of the live child, if any.
    #[must_use]
    pub fn child_pid(&self) -> Option<u32> {
        self.child.pid()
    }

    /// Run until stopped or until the command proves unrunnable.
    ///
    /// Buffered output, including a trailing partial line, is logged before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Spawn` if a child cannot be created for a
    /// reason other than the program itself.
    pub async fn run(&mut self) -> Result<Outcome, SupervisorError> {
        let result = self.run_loop().await;
        self.stdout.finish(&self.sink);
        self.stderr.finish(&self.sink);
        tracing::debug!(?result, spawns = self.state.spawns(), "Supervisor finished");
        result
    }

    async fn run_loop(&mut self) -> Result<Outcome, SupervisorError> {
        loop {
            if let Some(outcome) = self.handle_pending() {
                return Ok(outcome);
            }
            if self.state.is_stopping() && !self.child.is_running() {
                return Ok(Outcome::Stopped);
            }

            let deadline = (!self.child.is_running()).then(|| self.clock.deadline());
            match self.wait(deadline).await {
                // Acted on at the top of the next iteration, before any spawn.
                Wake::Signal(kind) => {
                    self.pending.raise(kind);
                    continue;
                }
                Wake::ChildExited => {
                    self.pending.raise(SignalKind::ChildExited);
                    continue;
                }
                Wake::SignalsClosed => {
                    tracing::debug!("Signal source closed");
                    self.signals_open = false;
                }
                Wake::Stdout(ready) | Wake::Stderr(ready) => {
                    self.log_poll_error(&ready);
                    self.stdout.drain(&self.sink);
                    self.stderr.drain(&self.sink);
                    // A stream that is always readable must not keep the
                    // signal and process drivers from running.
                    tokio::task::yield_now().await;
                }
                Wake::Deadline => {}
            }

            if self.state.may_spawn() && self.clock.is_due(Instant::now()) {
                if let Some(outcome) = self.spawn()? {
                    return Ok(outcome);
                }
            }
        }
    }

    /// Block until something needs attention.
    ///
    /// `deadline` is `None` while a child runs: no spawn can be due then.
    async fn wait(&mut self, deadline: Option<Instant>) -> Wake {
        let sleep = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            kind = self.signals.recv(), if self.signals_open => {
                kind.map_or(Wake::SignalsClosed, Wake::Signal)
            }
            () = self.child.exited() => Wake::ChildExited,
            ready = self.stdout.readable() => Wake::Stdout(ready),
            ready = self.stderr.readable() => Wake::Stderr(ready),
            () = sleep => Wake::Deadline,
        }
    }

    /// Act on every raised flag, in priority order.
    ///
    /// Returns the outcome if the loop must end now.
    fn handle_pending(&mut self) -> Option<Outcome> {
        if self.pending.take(SignalKind::Reload) {
            self.reload();
        }

        for kind in [SignalKind::Interrupt, SignalKind::Terminate] {
            if self.pending.take(kind) {
                self.state.request_stop();
                if !self.child.is_running() {
                    return Some(Outcome::Stopped);
                }
                self.relay(kind);
            }
        }

        if self.pending.take(SignalKind::Status) {
            self.log_status();
        }

        for kind in [SignalKind::User1, SignalKind::User2] {
            if self.pending.take(kind) {
                self.relay(kind);
            }
        }

        if self.pending.take(SignalKind::ChildExited) {
            return self.reap();
        }

        debug_assert!(self.pending.is_empty());
        None
    }

    fn reload(&mut self) {
        tracing::debug!(state = ?self.state.state(), "Reload requested");
        self.clock.on_reload(Instant::now());
        if self.child.is_running() {
            self.restart_now = true;
            self.forward(Signal::SIGTERM);
        }
    }

    fn log_status(&self) {
        let now = Instant::now();
        let message = match (self.child.pid(), self.child.uptime(now)) {
            (Some(pid), Some(uptime)) => format!("child {pid} up {}", humanize(uptime)),
            _ => format!("restarting in {}", humanize(self.clock.remaining(now))),
        };
        self.sink.log(Severity::Info, &message);
    }

    /// Pass the operator signal behind `kind` on to the child.
    fn relay(&self, kind: SignalKind) {
        if let Some(signal) = kind.os_signal() {
            self.forward(signal);
        }
    }

    /// Send `signal` to the child's group, if there is a child.
    fn forward(&self, signal: Signal) {
        match self.child.signal(signal) {
            Ok(true) => tracing::debug!(%signal, pid = ?self.child.pid(), "Forwarded signal"),
            Ok(false) => {}
            // The group is already gone; its exit is about to be reaped.
            Err(ChildError::Signal(Errno::ESRCH)) => {}
            Err(e) => self.sink.log(Severity::Error, &e.to_string()),
        }
    }

    fn reap(&mut self) -> Option<Outcome> {
        let now = Instant::now();
        let reaped = match self.child.reap(now) {
            Ok(Some(reaped)) => reaped,
            Ok(None) => return None,
            Err(e) => {
                self.sink.log(Severity::Error, &e.to_string());
                self.child.abandon(now)?
            }
        };
        self.on_exit(reaped, now)
    }

    fn on_exit(&mut self, reaped: Reaped, now: Instant) -> Option<Outcome> {
        self.state.transition(RunState::Backoff);
        tracing::debug!(
            pid = reaped.pid,
            uptime = ?reaped.uptime,
            exit = ?reaped.exit,
            "Child reaped"
        );

        if let Some(message) = reaped.exit.describe() {
            self.sink.log(Severity::Notice, &message);
        }
        if reaped.exit.is_permanent() {
            return Some(Outcome::Failed);
        }
        if self.state.is_stopping() {
            return Some(Outcome::Stopped);
        }

        let delay = if std::mem::take(&mut self.restart_now) {
            self.clock.restart_now(now);
            Duration::ZERO
        } else {
            self.clock.on_exit(reaped.uptime, now)
        };
        self.sink
            .log(Severity::Info, &format!("restarting in {}", humanize(delay)));
        None
    }

    fn spawn(&mut self) -> Result<Option<Outcome>, SupervisorError> {
        let now = Instant::now();
        match self
            .child
            .spawn(&self.config, self.stdout.writer(), self.stderr.writer(), now)
        {
            Ok(pid) => {
                self.state.transition(RunState::Running);
                self.sink.log(Severity::Info, &format!("child {pid} started"));
                Ok(None)
            }
            Err(e) if e.is_permanent() => {
                self.sink.log(
                    Severity::Notice,
                    &format!("{}: {e}", self.config.program.to_string_lossy()),
                );
                Ok(Some(Outcome::Failed))
            }
            Err(e) => {
                self.sink.log(Severity::Error, &format!("spawn: {e}"));
                Err(SupervisorError::Spawn(e))
            }
        }
    }

    fn log_poll_error(&self, ready: &io::Result<()>) {
        if let Err(e) = ready {
            self.sink.log(Severity::Error, &format!("poll: {e}"));
        }
    }
}
