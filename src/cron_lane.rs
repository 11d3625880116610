//! Cron Lane: time-scheduled tasks. Sorted-by-time index, due-evaluation
//! sweep, recurrence reschedule.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{LaneError, LaneResult};
use crate::policy::LanePolicy;
use crate::recurrence::RecurrenceEvaluator;
use crate::task::ScheduledTask;

struct CronLaneState {
    /// schedule_id -> ScheduledTask. Source of truth for each schedule.
    schedule_map: HashMap<Uuid, ScheduledTask>,
    /// (scheduled_time, schedule_id) ordered ascending. Every id in
    /// `schedule_map` appears exactly once here, and vice versa.
    index: BTreeSet<(DateTime<Utc>, Uuid)>,
}

/// A single tenant's Cron Lane.
pub struct CronLane {
    policy: LanePolicy,
    clock: Arc<dyn Clock>,
    evaluator: Arc<dyn RecurrenceEvaluator>,
    state: Mutex<CronLaneState>,
}

/// Result of an evaluation sweep: the due schedules plus any per-schedule
/// recurrence failures encountered along the way. A failure never fails
/// the sweep as a whole (§4.4).
#[derive(Debug, Default)]
pub struct SweepResult {
    /// Schedules that fired this sweep, in ascending original
    /// scheduled-time order.
    pub due: Vec<ScheduledTask>,
    /// `(schedule_id, error message)` for schedules whose recurrence
    /// evaluator failed; those schedules were removed, same as a
    /// one-shot.
    pub errors: Vec<(Uuid, String)>,
}

impl CronLane {
    pub(crate) fn new(
        policy: LanePolicy,
        clock: Arc<dyn Clock>,
        evaluator: Arc<dyn RecurrenceEvaluator>,
    ) -> Self {
        Self {
            policy,
            clock,
            evaluator,
            state: Mutex::new(CronLaneState {
                schedule_map: HashMap::new(),
                index: BTreeSet::new(),
            }),
        }
    }

    /// Schedule a task. See §4.4: reject a non-future scheduled time,
    /// reject at capacity, reject a reused schedule identifier, else
    /// insert into the map and index.
    pub async fn schedule(&self, mut scheduled_task: ScheduledTask) -> LaneResult<Uuid> {
        let now = self.clock.now();
        if scheduled_task.scheduled_time <= now {
            return Err(LaneError::InvalidSchedule);
        }

        let mut state = self.state.lock().await;

        // schedule_id is supposed to be globally unique (§3); a retry that
        // naively reconstructs a ScheduledTask with the same id must be
        // rejected rather than silently overwriting the mapping while
        // leaving a second, stale entry in the index (§8 round-trip laws).
        if state.schedule_map.contains_key(&scheduled_task.schedule_id) {
            return Err(LaneError::InvalidSchedule);
        }

        if state.schedule_map.len() >= self.policy.max_queue_depth {
            return Err(LaneError::CapacityExceeded {
                max_depth: self.policy.max_queue_depth,
            });
        }

        scheduled_task.next_execution = Some(scheduled_task.scheduled_time);
        let schedule_id = scheduled_task.schedule_id;
        state
            .index
            .insert((scheduled_task.scheduled_time, schedule_id));
        state.schedule_map.insert(schedule_id, scheduled_task);

        tracing::info!(schedule_id = %schedule_id, "cron lane: scheduled");
        Ok(schedule_id)
    }

    /// Walk the index ascending, collecting everything due at
    /// `reference_time`. One-shot schedules are removed; recurring
    /// schedules are re-armed via the injected evaluator and reinserted
    /// at their new position.
    pub async fn evaluate_due(&self, reference_time: DateTime<Utc>) -> SweepResult {
        let mut state = self.state.lock().await;

        let due_keys: Vec<(DateTime<Utc>, Uuid)> = state
            .index
            .iter()
            .take_while(|(time, _)| *time <= reference_time)
            .copied()
            .collect();

        let mut result = SweepResult::default();

        for (time, schedule_id) in due_keys {
            state.index.remove(&(time, schedule_id));

            let Some(fired) = state.schedule_map.get(&schedule_id).cloned() else {
                continue;
            };
            result.due.push(fired.clone());

            match &fired.recurrence {
                None => {
                    state.schedule_map.remove(&schedule_id);
                }
                Some(expression) => {
                    match self.evaluator.next_occurrence(expression, reference_time) {
                        Ok(next_time) => {
                            if let Some(entry) = state.schedule_map.get_mut(&schedule_id) {
                                entry.scheduled_time = next_time;
                                entry.next_execution = Some(next_time);
                            }
                            state.index.insert((next_time, schedule_id));
                        }
                        Err(message) => {
                            tracing::warn!(
                                schedule_id = %schedule_id,
                                error = %message,
                                "cron lane: recurrence evaluation failed, dropping schedule"
                            );
                            state.schedule_map.remove(&schedule_id);
                            result.errors.push((schedule_id, message));
                        }
                    }
                }
            }
        }

        tracing::debug!(due = result.due.len(), "cron lane: sweep complete");
        result
    }

    /// Upper-bound hint for sleep-until: the scheduled time of the index
    /// head, or `None` if nothing is scheduled. Callers must re-evaluate
    /// after waking since new schedules may have been inserted meanwhile.
    pub async fn next_execution_time(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.index.iter().next().map(|(t, _)| *t)
    }

    pub async fn scheduled_count(&self) -> usize {
        self.state.lock().await.schedule_map.len()
    }

    pub(crate) fn policy(&self) -> &LanePolicy {
        &self.policy
    }
}

/// Snapshot statistics for a tenant's Cron Lane.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CronLaneStats {
    pub scheduled_count: usize,
    pub next_execution: Option<DateTime<Utc>>,
}

impl CronLane {
    pub(crate) async fn stats(&self) -> CronLaneStats {
        CronLaneStats {
            scheduled_count: self.scheduled_count().await,
            next_execution: self.next_execution_time().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use chrono::Duration;
    use serde_json::Value;
    use std::time::Duration as StdDuration;

    struct HourlyEvaluator;
    impl RecurrenceEvaluator for HourlyEvaluator {
        fn next_occurrence(&self, expression: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
            if expression == "every 1h" {
                Ok(after + Duration::hours(1))
            } else {
                Err(format!("unsupported expression: {expression}"))
            }
        }
    }

    fn base_task() -> crate::task::Task {
        crate::task::Task {
            id: Uuid::new_v4(),
            goal: Value::Null,
            submitter_id: "u".into(),
            tenant_id: "t".into(),
            deadline: None,
            idempotency_key: "k".into(),
            resource_budget: Value::Null,
            tool_ids: vec![],
            context: Value::Null,
            trace_id: None,
        }
    }

    fn lane() -> CronLane {
        let policy = LanePolicy::new(10, 1, StdDuration::from_secs(30), StdDuration::from_secs(60));
        CronLane::new(policy, Arc::new(SystemClock), Arc::new(HourlyEvaluator))
    }

    #[tokio::test]
    async fn rejects_non_future_schedule() {
        let lane = lane();
        let now = Utc::now();
        let sched = ScheduledTask::new(base_task(), now, None, 0);
        let err = lane.schedule(sched).await.unwrap_err();
        assert!(matches!(err, LaneError::InvalidSchedule));
    }

    #[tokio::test]
    async fn rejects_a_reused_schedule_id() {
        let lane = lane();
        let now = Utc::now();
        let first = ScheduledTask::new(base_task(), now + Duration::seconds(1), None, 0);
        let schedule_id = first.schedule_id;
        lane.schedule(first).await.unwrap();

        let mut retry = ScheduledTask::new(base_task(), now + Duration::seconds(30), None, 0);
        retry.schedule_id = schedule_id;
        let err = lane.schedule(retry).await.unwrap_err();
        assert!(matches!(err, LaneError::InvalidSchedule));

        // the original entry is untouched and the index has exactly one entry for it.
        assert_eq!(lane.scheduled_count().await, 1);
        assert_eq!(lane.next_execution_time().await, Some(now + Duration::seconds(1)));
    }

    #[tokio::test]
    async fn one_shot_vs_recurring_sweep() {
        let lane = lane();
        let now = Utc::now();
        let fire_at = now + Duration::seconds(1);

        let s1 = ScheduledTask::new(base_task(), fire_at, None, 0);
        let s1_id = s1.schedule_id;
        let s2 = ScheduledTask::new(base_task(), fire_at, Some("every 1h".into()), 0);
        let s2_id = s2.schedule_id;

        lane.schedule(s1).await.unwrap();
        lane.schedule(s2).await.unwrap();

        let result = lane.evaluate_due(now + Duration::seconds(2)).await;
        assert_eq!(result.due.len(), 2);
        assert_eq!(result.due[0].schedule_id, s1_id);
        assert_eq!(result.due[1].schedule_id, s2_id);
        assert!(result.errors.is_empty());

        assert_eq!(lane.scheduled_count().await, 1);
        let next = lane.next_execution_time().await.unwrap();
        assert!(next > now + Duration::minutes(59));
        assert!(next < now + Duration::minutes(61));
    }

    #[tokio::test]
    async fn failed_recurrence_drops_schedule_without_failing_sweep() {
        let lane = lane();
        let now = Utc::now();
        let bad = ScheduledTask::new(
            base_task(),
            now + Duration::seconds(1),
            Some("bogus".into()),
            0,
        );
        let bad_id = bad.schedule_id;
        lane.schedule(bad).await.unwrap();

        let result = lane.evaluate_due(now + Duration::seconds(2)).await;
        assert_eq!(result.due.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].0, bad_id);
        assert_eq!(lane.scheduled_count().await, 0);
    }

    #[tokio::test]
    async fn capacity_exceeded_at_boundary() {
        let policy = LanePolicy::new(1, 1, StdDuration::from_secs(30), StdDuration::from_secs(60));
        let lane = CronLane::new(policy, Arc::new(SystemClock), Arc::new(HourlyEvaluator));
        let now = Utc::now();
        lane.schedule(ScheduledTask::new(base_task(), now + Duration::seconds(1), None, 0))
            .await
            .unwrap();
        let err = lane
            .schedule(ScheduledTask::new(base_task(), now + Duration::seconds(1), None, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, LaneError::CapacityExceeded { max_depth: 1 }));
    }

    #[tokio::test]
    async fn next_execution_time_reflects_the_soonest_schedule() {
        let lane = lane();
        let now = Utc::now();
        assert_eq!(lane.next_execution_time().await, None);
        let soon = now + Duration::seconds(5);
        let later = now + Duration::seconds(50);
        lane.schedule(ScheduledTask::new(base_task(), later, None, 0))
            .await
            .unwrap();
        lane.schedule(ScheduledTask::new(base_task(), soon, None, 0))
            .await
            .unwrap();
        assert_eq!(lane.next_execution_time().await, Some(soon));
    }
}
