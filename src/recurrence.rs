//! Recurrence evaluator collaborator interface.
//!
//! The core does not parse schedule expressions — recurrence strings are
//! opaque to it. A caller supplies an evaluator at [`crate::cron_lane::CronLane`]
//! construction time.

use chrono::{DateTime, Utc};

/// Computes the next occurrence of a recurrence expression.
///
/// Implementations own the expression grammar entirely; the core only
/// calls this during the evaluation sweep for schedules that have a
/// recurrence set.
pub trait RecurrenceEvaluator: Send + Sync {
    /// Given an opaque recurrence expression and the reference instant a
    /// schedule just fired at, return the next occurrence strictly after
    /// `after`, or an error message if the expression is invalid or
    /// produces no future occurrence.
    fn next_occurrence(&self, expression: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, String>;
}
