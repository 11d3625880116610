//! Deterministic collaborator doubles, for this crate's own tests and for
//! external integration tests. Not behind `#[cfg(test)]` since an
//! integration-test crate under `tests/` only sees the library's normal
//! build, not its internal test configuration.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::recurrence::RecurrenceEvaluator;

/// A clock whose `now()` is set explicitly and can be advanced, instead of
/// tracking the wall clock.
pub struct FixedClock {
    offset_millis: AtomicI64,
    epoch: DateTime<Utc>,
}

impl FixedClock {
    /// A clock that reports `start` until advanced.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            offset_millis: AtomicI64::new(0),
            epoch: start,
        }
    }

    /// Move the reported time forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.offset_millis
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.epoch + Duration::milliseconds(self.offset_millis.load(Ordering::SeqCst))
    }
}

/// A recurrence evaluator that re-arms every schedule a fixed interval
/// after it fires, regardless of the expression string, unless the
/// expression is the sentinel `"invalid"`.
pub struct FixedIntervalEvaluator {
    interval: Duration,
}

impl FixedIntervalEvaluator {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl RecurrenceEvaluator for FixedIntervalEvaluator {
    fn next_occurrence(&self, expression: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
        if expression == "invalid" {
            return Err("unrecognized recurrence expression".into());
        }
        Ok(after + self.interval)
    }
}
