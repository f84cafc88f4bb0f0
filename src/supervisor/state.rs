//! Supervisor run state machine.

/// What the supervisor is doing with its child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    /// Nothing spawned yet.
    #[default]
    Idle,
    /// A child is alive.
    Running,
    /// No child; a restart deadline is pending.
    Backoff,
}

/// Run state plus the sticky stop request.
#[derive(Debug, Clone, Default)]
pub struct RunStateMachine {
    state: RunState,
    stopping: bool,
    spawns: u64,
}

impl RunStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether a stop signal has been observed.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Number of children spawned so far.
    #[must_use]
    pub fn spawns(&self) -> u64 {
        self.spawns
    }

    pub fn transition(&mut self, new_state: RunState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        if new_state == RunState::Running {
            self.spawns = self.spawns.saturating_add(1);
        }
        self.state = new_state;
    }

    /// Latch the stop request. No further spawns happen afterwards.
    pub fn request_stop(&mut self) {
        if !self.stopping {
            tracing::debug!(state = ?self.state, "Stop requested");
        }
        self.stopping = true;
    }

    /// True once the supervisor may spawn again.
    #[must_use]
    pub fn may_spawn(&self) -> bool {
        !self.stopping && self.state != RunState::Running
    }
}
