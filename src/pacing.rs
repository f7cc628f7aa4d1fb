//! Wall-clock plumbing for the edge loop: the [`Clock`] seam, the gates
//! that pace logging and capture signals, and the LED blink phase. The
//! loop never calls [`std::time::SystemTime`] directly so tests can drive
//! these with a [`ManualClock`].

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock time, expressed as a duration since the Unix
/// epoch.
pub trait Clock {
    /// The current time.
    fn now(&self) -> Duration;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A hand-cranked clock for tests. Clones share the same time, so a test
/// can keep one handle and advance it while the loop holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<Mutex<Duration>>);

impl ManualClock {
    /// A clock frozen at the epoch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }

    /// Jumps the clock to an absolute time.
    pub fn set(&self, to: Duration) {
        *self.0.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.0.lock().unwrap()
    }
}

/// Fires at most once per period, starting one full period after
/// construction. Paces the log/telemetry flush.
#[derive(Debug)]
pub struct IntervalGate {
    period: Duration,
    last: Duration,
}

impl IntervalGate {
    /// A gate that first opens `period` after `now`.
    pub fn new(period: Duration, now: Duration) -> Self {
        Self { period, last: now }
    }

    /// True when at least one period has elapsed; opening the gate resets
    /// it.
    pub fn ready(&mut self, now: Duration) -> bool {
        let due = now
            .checked_sub(self.last)
            .map_or(false, |elapsed| elapsed >= self.period);
        if due {
            self.last = now;
        }
        due
    }
}

/// Enforces a minimum spacing between successful events. Unlike
/// [`IntervalGate`] it starts open and is only re-armed explicitly, so a
/// failed attempt leaves it open for an immediate retry.
#[derive(Debug)]
pub struct CooldownGate {
    period: Duration,
    last: Option<Duration>,
}

impl CooldownGate {
    /// An open gate with the given spacing.
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// True when the gate is open at `now`.
    pub fn ready(&self, now: Duration) -> bool {
        match self.last {
            None => true,
            Some(last) => now
                .checked_sub(last)
                .map_or(false, |elapsed| elapsed >= self.period),
        }
    }

    /// Closes the gate until `now + period`. Call only after the guarded
    /// event actually succeeded.
    pub fn arm(&mut self, now: Duration) {
        self.last = Some(now);
    }
}

/// Blink phase for the alarm LED: 2 Hz derived from wall-clock parity
/// rather than a timer, so every observer of the same clock agrees on the
/// phase.
pub fn blink_on(now: Duration) -> bool {
    (now.as_secs_f64() * 2.0) as u64 % 2 == 0
}
