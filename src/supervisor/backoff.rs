//! Restart backoff with cooloff reset.

use std::time::Duration;

use tokio::time::Instant;

/// Largest interval used when no ceiling is configured.
///
/// Keeps `deadline + interval` arithmetic representable however often the
/// interval doubles.
pub const INTERVAL_LIMIT: Duration = Duration::from_secs(4_294_967_295);

/// Tracks the restart interval and the deadline of the next spawn.
///
/// The delay applied after an exit is the current interval; the interval
/// then doubles for the following exit. A child that stayed up for at least
/// the cooloff threshold resets the interval to the base first.
#[derive(Debug, Clone)]
pub struct BackoffClock {
    base: Duration,
    cooloff: Duration,
    ceiling: Duration,
    interval: Duration,
    deadline: Instant,
}

impl BackoffClock {
    /// Create a clock whose first deadline is `now`.
    #[must_use]
    pub fn new(base: Duration, cooloff: Duration, ceiling: Option<Duration>, now: Instant) -> Self {
        let ceiling = ceiling.unwrap_or(INTERVAL_LIMIT).min(INTERVAL_LIMIT);
        Self {
            base: base.min(ceiling),
            cooloff,
            ceiling,
            interval: base.min(ceiling),
            deadline: now,
        }
    }

    /// Interval that the next exit will wait.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Instant at which the next spawn is due.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Record a child exit after `uptime` and schedule the next spawn.
    ///
    /// Returns the delay until the next spawn.
    pub fn on_exit(&mut self, uptime: Duration, now: Instant) -> Duration {
        if uptime >= self.cooloff {
            self.interval = self.base;
        }

        let delay = self.interval;
        self.deadline = now + delay;
        self.interval = self.interval.saturating_mul(2).min(self.ceiling);
        delay
    }

    /// Reset to the base interval and make a spawn due immediately.
    pub fn on_reload(&mut self, now: Instant) {
        self.interval = self.base;
        self.deadline = now;
    }

    /// Make a spawn due immediately without touching the interval.
    pub fn restart_now(&mut self, now: Instant) {
        self.deadline = now;
    }

    /// Time left until the deadline, zero once it has passed.
    #[must_use]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline <= now
    }
}
