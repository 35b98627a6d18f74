//! Backoff between non-blocking polls.
//!
//! Readers never block; a caller polling an empty source pauses through a
//! [`Pauser`] and calls [`Pauser::reset`] once work arrives.

use std::time::Duration;

/// Pluggable pause policy for polling loops.
pub trait Pauser {
    /// Wait a little before the next poll.
    fn pause(&mut self);

    /// Work arrived; start the next idle period from the cheapest step.
    fn reset(&mut self);
}

/// Spin, then yield, then sleep with growing intervals.
#[derive(Debug, Clone)]
pub struct BackoffPauser {
    spins: u32,
    yields: u32,
    min_sleep: Duration,
    max_sleep: Duration,
    count: u32,
    sleep: Duration,
}

impl BackoffPauser {
    pub fn new(spins: u32, yields: u32, min_sleep: Duration, max_sleep: Duration) -> Self {
        Self {
            spins,
            yields,
            min_sleep,
            max_sleep: max_sleep.max(min_sleep),
            count: 0,
            sleep: min_sleep,
        }
    }

    /// Low-latency profile: long spin phase, short sleeps.
    pub fn busy() -> Self {
        Self::new(10_000, 100, Duration::from_micros(10), Duration::from_millis(1))
    }

    /// Current step, for diagnostics.
    pub fn stage(&self) -> PauseStage {
        if self.count < self.spins {
            PauseStage::Spin
        } else if self.count < self.spins.saturating_add(self.yields) {
            PauseStage::Yield
        } else {
            PauseStage::Sleep(self.sleep)
        }
    }
}

impl Default for BackoffPauser {
    fn default() -> Self {
        Self::new(100, 20, Duration::from_micros(50), Duration::from_millis(20))
    }
}

impl Pauser for BackoffPauser {
    fn pause(&mut self) {
        match self.stage() {
            PauseStage::Spin => std::hint::spin_loop(),
            PauseStage::Yield => std::thread::yield_now(),
            PauseStage::Sleep(interval) => {
                std::thread::sleep(interval);
                self.sleep = (interval * 2).min(self.max_sleep);
            }
        }
        self.count = self.count.saturating_add(1);
    }

    fn reset(&mut self) {
        self.count = 0;
        self.sleep = self.min_sleep;
    }
}

/// Which step a [`BackoffPauser`] is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseStage {
    Spin,
    Yield,
    Sleep(Duration),
}

/// Always sleeps for a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct FixedPauser(pub Duration);

impl Pauser for FixedPauser {
    fn pause(&mut self) {
        std::thread::sleep(self.0);
    }

    fn reset(&mut self) {}
}
