//! Injected time source, so deadline and schedule comparisons are testable.

use chrono::{DateTime, Utc};

/// A source of "now". All deadline and scheduled-time comparisons in the
/// lane core go through this trait instead of calling `Utc::now()` directly.
pub trait Clock: Send + Sync {
    /// Current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
