//! Data model: `Task`, `ScheduledTask`, `SubagentTask`, and their submission
//! wrappers. The core treats goals, resource budgets, tool lists, context,
//! and agent bindings as opaque — they pass through as [`serde_json::Value`]
//! without being inspected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A user-submitted task, the Main Lane's unit of work.
///
/// The core never mutates a `Task` after it's handed to it; it is owned by
/// the submitter until enqueue succeeds, after which the lane holds a
/// logical reference until dequeue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Globally unique task identifier.
    pub id: Uuid,
    /// Opaque goal payload.
    pub goal: Value,
    /// Who submitted this task.
    pub submitter_id: String,
    /// Tenant this task belongs to — the isolation boundary.
    pub tenant_id: String,
    /// Optional hard deadline; a task is expired once `now` passes it.
    pub deadline: Option<DateTime<Utc>>,
    /// Idempotency key used for Main-lane deduplication. Must be non-empty.
    pub idempotency_key: String,
    /// Opaque resource budget (cpu/memory/timeout hints for the executor).
    pub resource_budget: Value,
    /// Opaque tool identifiers available to the executor.
    pub tool_ids: Vec<String>,
    /// Opaque context blob (already redacted by the submitter, if needed).
    pub context: Value,
    /// Optional trace identifier for downstream observability.
    pub trace_id: Option<String>,
}

impl Task {
    /// A task is expired iff its deadline is set and `now` is strictly
    /// after it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }
}

/// Submission envelope for the Main Lane: a `Task` plus its requested
/// priority. Priority lives on the wrapper, not the inner payload, per the
/// tagged-variant design note in §9.
#[derive(Debug, Clone)]
pub struct MainSubmission {
    /// The task to enqueue.
    pub task: Task,
    /// Requested priority; clamped to `[0, 10]` on submission.
    pub priority: i32,
}

/// A future-dated one-shot or recurring schedule, the Cron Lane's unit of
/// work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// The task to execute when this schedule fires.
    pub task: Task,
    /// When this schedule is due. Must be strictly in the future at
    /// submission time.
    pub scheduled_time: DateTime<Utc>,
    /// Opaque recurrence expression. `None` means one-shot.
    pub recurrence: Option<String>,
    /// Maximum retry count on failure (consumed by the executor, not the
    /// core).
    pub max_retries: u32,
    /// Globally unique schedule identifier.
    pub schedule_id: Uuid,
    /// Derived next-execution timestamp; equals `scheduled_time` until a
    /// recurring schedule re-arms.
    pub next_execution: Option<DateTime<Utc>>,
}

impl ScheduledTask {
    /// Create a schedule request. `next_execution` is left unset — the
    /// Cron Lane derives it on successful `schedule()`.
    pub fn new(
        task: Task,
        scheduled_time: DateTime<Utc>,
        recurrence: Option<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            task,
            scheduled_time,
            recurrence,
            max_retries,
            schedule_id: Uuid::new_v4(),
            next_execution: None,
        }
    }

    /// Due iff `now` has reached or passed `scheduled_time`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.scheduled_time
    }
}

/// A parallel-worker unit of work, the Subagent Lane's unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubagentTask {
    /// Opaque agent binding (which agent/model/config to run).
    pub agent_binding: Value,
    /// Opaque goals handed to the spawned agent.
    pub goals: Vec<Value>,
    /// Identifier of the parent execution that spawned this subagent.
    pub parent_execution_id: Uuid,
    /// Who submitted this spawn.
    pub submitter_id: String,
    /// Tenant this subagent belongs to.
    pub tenant_id: String,
    /// Optional hard deadline.
    pub deadline: Option<DateTime<Utc>>,
    /// Opaque inter-agent message-queue handle.
    pub message_queue: Value,
    /// Globally unique identifier for this subagent execution.
    pub subagent_execution_id: Uuid,
    /// Optional trace identifier.
    pub trace_id: Option<String>,
}

impl SubagentTask {
    /// A subagent task is expired iff its deadline is set and `now` is
    /// strictly after it.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now > deadline)
    }
}

/// Submission envelope for the Subagent Lane: a `SubagentTask` plus its
/// requested priority.
#[derive(Debug, Clone)]
pub struct SubagentSubmission {
    /// The subagent task to spawn.
    pub task: SubagentTask,
    /// Requested priority; clamped to `[0, 10]` on submission.
    pub priority: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn base_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            goal: Value::Null,
            submitter_id: "user-1".into(),
            tenant_id: "tenant-a".into(),
            deadline: None,
            idempotency_key: "k".into(),
            resource_budget: Value::Null,
            tool_ids: vec![],
            context: Value::Null,
            trace_id: None,
        }
    }

    #[test]
    fn no_deadline_never_expires() {
        let task = base_task();
        assert!(!task.is_expired(Utc::now()));
    }

    #[test]
    fn deadline_exactly_now_is_not_expired() {
        let now = Utc::now();
        let mut task = base_task();
        task.deadline = Some(now);
        assert!(!task.is_expired(now));
    }

    #[test]
    fn deadline_in_the_past_is_expired() {
        let now = Utc::now();
        let mut task = base_task();
        task.deadline = Some(now - Duration::seconds(1));
        assert!(task.is_expired(now));
    }

    #[test]
    fn scheduled_time_exactly_now_is_due() {
        let now = Utc::now();
        let sched = ScheduledTask::new(base_task(), now, None, 0);
        assert!(sched.is_due(now));
    }
}
