//! Signal relay.
//!
//! Operator signals are observed through tokio's signal driver, whose
//! handler only records the delivery and wakes the reactor. The loop turns
//! each delivery into a flag in [`PendingSignals`] and acts on the flags at
//! the top of its next iteration, so no real work ever runs in signal
//! context and a delivery that lands just before the loop blocks is still
//! seen on wake-up.

use std::io;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, Signal as SignalStream, SignalKind as StreamKind};
use tokio::sync::mpsc;

/// Signal used to ask for a status line.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub const STATUS_SIGNAL: Signal = Signal::SIGPWR;

/// Signal used to ask for a status line.
#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub const STATUS_SIGNAL: Signal = Signal::SIGINFO;

/// Signal kinds the supervisor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Reset backoff and restart the child now.
    Reload,
    /// Stop, forwarding SIGINT to the child.
    Interrupt,
    /// Stop, forwarding SIGTERM to the child.
    Terminate,
    /// Log uptime or time to restart.
    Status,
    /// Forwarded to the child verbatim.
    User1,
    /// Forwarded to the child verbatim.
    User2,
    /// The child has terminated and must be reaped.
    ChildExited,
}

impl SignalKind {
    /// The OS signal that delivers this kind.
    ///
    /// `ChildExited` is reported by the child handle rather than a signal
    /// stream and has none.
    #[must_use]
    pub fn os_signal(self) -> Option<Signal> {
        match self {
            Self::Reload => Some(Signal::SIGHUP),
            Self::Interrupt => Some(Signal::SIGINT),
            Self::Terminate => Some(Signal::SIGTERM),
            Self::Status => Some(STATUS_SIGNAL),
            Self::User1 => Some(Signal::SIGUSR1),
            Self::User2 => Some(Signal::SIGUSR2),
            Self::ChildExited => None,
        }
    }
}

/// One flag per signal kind, raised on delivery and cleared when handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSignals {
    reload: bool,
    interrupt: bool,
    terminate: bool,
    status: bool,
    user1: bool,
    user2: bool,
    child_exited: bool,
}

impl PendingSignals {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: SignalKind) -> &mut bool {
        match kind {
            SignalKind::Reload => &mut self.reload,
            SignalKind::Interrupt => &mut self.interrupt,
            SignalKind::Terminate => &mut self.terminate,
            SignalKind::Status => &mut self.status,
            SignalKind::User1 => &mut self.user1,
            SignalKind::User2 => &mut self.user2,
            SignalKind::ChildExited => &mut self.child_exited,
        }
    }

    pub fn raise(&mut self, kind: SignalKind) {
        *self.slot(kind) = true;
    }

    /// Clear the flag for `kind`, returning whether it was raised.
    pub fn take(&mut self, kind: SignalKind) -> bool {
        std::mem::take(self.slot(kind))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Source of signal deliveries for the supervisor loop.
#[async_trait]
pub trait SignalSource: Send {
    /// Wait for the next delivery. `None` means the source is closed and
    /// will deliver nothing more.
    async fn recv(&mut self) -> Option<SignalKind>;
}

/// Signals delivered to this process by the operating system.
#[derive(Debug)]
pub struct OsSignals {
    hangup: SignalStream,
    interrupt: SignalStream,
    terminate: SignalStream,
    status: SignalStream,
    user1: SignalStream,
    user2: SignalStream,
}

impl OsSignals {
    /// Install handlers for every recognized signal.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be registered.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            hangup: listen(SignalKind::Reload)?,
            interrupt: listen(SignalKind::Interrupt)?,
            terminate: listen(SignalKind::Terminate)?,
            status: listen(SignalKind::Status)?,
            user1: listen(SignalKind::User1)?,
            user2: listen(SignalKind::User2)?,
        })
    }
}

fn listen(kind: SignalKind) -> io::Result<SignalStream> {
    let os_signal = kind.os_signal().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{kind:?} is not delivered by a signal"),
        )
    })?;
    signal(StreamKind::from_raw(os_signal as i32))
}

#[async_trait]
impl SignalSource for OsSignals {
    async fn recv(&mut self) -> Option<SignalKind> {
        tokio::select! {
            biased;

            Some(()) = self.hangup.recv() => Some(SignalKind::Reload),
            Some(()) = self.interrupt.recv() => Some(SignalKind::Interrupt),
            Some(()) = self.terminate.recv() => Some(SignalKind::Terminate),
            Some(()) = self.status.recv() => Some(SignalKind::Status),
            Some(()) = self.user1.recv() => Some(SignalKind::User1),
            Some(()) = self.user2.recv() => Some(SignalKind::User2),
            else => None,
        }
    }
}

/// Signals injected through a channel instead of the operating system.
///
/// Lets an embedding program or a test drive the supervisor directly.
#[derive(Debug)]
pub struct ChannelSignals {
    rx: mpsc::UnboundedReceiver<SignalKind>,
}

impl ChannelSignals {
    /// Create a source and the sender that feeds it.
    #[must_use]
    pub fn new() -> (mpsc::UnboundedSender<SignalKind>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }
}

#[async_trait]
impl SignalSource for ChannelSignals {
    async fn recv(&mut self) -> Option<SignalKind> {
        self.rx.recv().await
    }
}
