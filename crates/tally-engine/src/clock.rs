//! Time source abstraction
//!
//! Cycle timestamps come from a [`Clock`] so production uses wall time
//! while tests and simulations pin or step time explicitly. Block hashes
//! include the timestamp, which makes a controllable clock the difference
//! between flaky and deterministic chain tests.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current moment, UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time for production use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock for testing and simulation.
///
/// Clones share the same underlying instant, so a test can hand the clock
/// to the engine and still advance it from outside.
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl SimulatedClock {
    /// Create a simulated clock frozen at the given instant.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Set the absolute simulated time.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut current = self.current.lock().unwrap();
        *current = instant;
    }

    /// Advance simulated time by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap();
        *current += duration;
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }
}
