//! Lane error taxonomy.

use thiserror::Error;

/// Errors produced by lane operations.
///
/// `invalid-priority` has no variant here: out-of-range priorities are
/// clamped silently to `[0, 10]` rather than rejected (see [`crate::policy::clamp_priority`]).
#[derive(Debug, Error)]
pub enum LaneError {
    /// The target priority sub-queue is at its configured max depth.
    #[error("lane at capacity (max queue depth {max_depth})")]
    CapacityExceeded {
        /// The configured bound that was hit.
        max_depth: usize,
    },

    /// The task's own deadline had already passed at submission time.
    #[error("task deadline has already passed")]
    DeadlineExpired,

    /// A cron submission's scheduled time was not strictly in the future.
    #[error("scheduled time must be strictly in the future")]
    InvalidSchedule,

    /// A blocking dequeue was cancelled via its [`crate::cancel::CancelToken`].
    #[error("dequeue cancelled")]
    Cancelled,

    /// The injected recurrence evaluator failed for a due schedule.
    #[error("recurrence evaluation failed: {0}")]
    RecurrenceEvaluationFailed(String),
}

/// Result alias for lane operations.
pub type LaneResult<T> = Result<T, LaneError>;
