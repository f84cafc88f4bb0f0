//! Supervisor module tests.


use std::ffi::OsString;

use kitd::config::SupervisorConfig;
use kitd::output::{LogSink, Severity};
use kitd::supervisor::{ChannelSignals, SignalKind, Supervisor};
use tokio::sync::mpsc;

pub type Record = (Severity, String);

/// Sink that hands every record to the test.
pub struct ChannelSink(mpsc::UnboundedSender<Record>);

impl LogSink for ChannelSink {
    fn log(&self, severity: Severity, message: &str) {
        let _ = self.0.send((severity, message.to_string()));
    }
}

/// Receiving side of a [`ChannelSink`], remembering everything seen.
pub struct Records {
    rx: mpsc::UnboundedReceiver<Record>,
    seen: Vec<Record>,
}

impl Records {
    /// Wait for the next record containing `needle`.
    pub async fn wait_for(&mut self, needle: &str) -> Record {
        loop {
            let record = self
                .rx
                .recv()
                .await
                .unwrap_or_else(|| panic!("log closed before {needle:?}; saw {:?}", self.seen));
            self.seen.push(record.clone());
            if record.1.contains(needle) {
                return record;
            }
        }
    }

    /// Everything logged so far, including records not yet waited for.
    pub fn all(&mut self) -> &[Record] {
        while let Ok(record) = self.rx.try_recv() {
            self.seen.push(record);
        }
        &self.seen
    }

    pub fn contains(&mut self, severity: Severity, message: &str) -> bool {
        self.all()
            .iter()
            .any(|(s, m)| *s == severity && m == message)
    }
}

pub struct Harness {
    pub supervisor: Supervisor<ChannelSignals, ChannelSink>,
    pub signals: mpsc::UnboundedSender<SignalKind>,
    pub records: Records,
}

/// Build a supervisor for `command`, letting the test adjust the config.
pub fn harness<F>(command: &[&str], configure: F) -> Harness
where
    F: FnOnce(SupervisorConfig) -> SupervisorConfig,
{
    let config = SupervisorConfig::new(command.iter().map(OsString::from))
        .expect("valid command");
    let config = configure(config.foreground(true));
    let (signals, source) = ChannelSignals::new();
    let (tx, rx) = mpsc::unbounded_channel();
    let supervisor =
        Supervisor::new(config, source, ChannelSink(tx)).expect("Failed to create supervisor");

    Harness {
        supervisor,
        signals,
        records: Records {
            rx,
            seen: Vec::new(),
        },
    }
}

/// Verify the public supervisor types are exported from the library.
#[test]
fn test_all_supervisor_types_exported() {
    use kitd::supervisor::{
        BackoffClock, ChildExit, ChildHandle, Outcome, PendingSignals, RunState,
        RunStateMachine, SpawnError, SupervisorError, INTERVAL_LIMIT, STATUS_SIGNAL,
    };

    let _ = ChildHandle::new();
    let _ = PendingSignals::new();
    let _ = RunStateMachine::new();
    let _ = RunState::Idle;
    let _ = ChildExit::Success;
    let _ = Outcome::Stopped;
    let _: fn() -> SupervisorError = || SupervisorError::Spawn(SpawnError::NotFound);
    let _ = (INTERVAL_LIMIT, STATUS_SIGNAL);
    let _ = BackoffClock::new;
}
