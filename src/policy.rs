//! Per-lane tunable bounds.

use std::time::Duration;

/// Policy governing a single lane instance.
///
/// A value type: construct it, pass it to a lane, and treat it as
/// read-only afterward. `max_concurrency` only matters to the Subagent
/// lane, and `dedup_window` only to the Main lane — unused fields are
/// simply ignored by the other lane kinds.
#[derive(Debug, Clone, Copy)]
pub struct LanePolicy {
    /// Hard cap per priority sub-queue.
    pub max_queue_depth: usize,
    /// Cap on live Subagent workers (observational only, see §4.5).
    pub max_concurrency: usize,
    /// Advisory bound on how long a producer may wait for capacity. The
    /// core itself never blocks an enqueue on this — it's surfaced for
    /// the submitter's own retry/backoff layer.
    pub backpressure_timeout: Duration,
    /// Sliding window for Main-lane idempotency-key memory.
    pub dedup_window: Duration,
}

impl LanePolicy {
    /// Construct a policy, asserting the invariants from §4.1: capacities
    /// must be at least 1, durations must be positive.
    pub fn new(
        max_queue_depth: usize,
        max_concurrency: usize,
        backpressure_timeout: Duration,
        dedup_window: Duration,
    ) -> Self {
        assert!(max_queue_depth >= 1, "max_queue_depth must be >= 1");
        assert!(max_concurrency >= 1, "max_concurrency must be >= 1");
        assert!(
            !backpressure_timeout.is_zero(),
            "backpressure_timeout must be > 0"
        );
        assert!(!dedup_window.is_zero(), "dedup_window must be > 0");
        Self {
            max_queue_depth,
            max_concurrency,
            backpressure_timeout,
            dedup_window,
        }
    }
}

impl Default for LanePolicy {
    fn default() -> Self {
        Self {
            max_queue_depth: 500,
            max_concurrency: 100,
            backpressure_timeout: Duration::from_secs(30),
            dedup_window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Clamp a requested priority into the valid `[0, 10]` range.
///
/// Reference behavior per §7: out-of-range priorities are clamped
/// silently rather than rejected.
pub fn clamp_priority(priority: i32) -> usize {
    priority.clamp(0, 10) as usize
}
