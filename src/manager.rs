//! Lane Manager: routes `(tenant_id, lane kind)` to a lazily-created lane
//! instance and exposes the aggregate submission/query surface.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::cron_lane::{CronLane, CronLaneStats};
use crate::error::LaneResult;
use crate::main_lane::{MainLane, MainLaneStats};
use crate::policy::LanePolicy;
use crate::recurrence::RecurrenceEvaluator;
use crate::subagent_lane::{SubagentLane, SubagentLaneStats};
use crate::task::{MainSubmission, ScheduledTask, SubagentSubmission};

/// Which of the three lane kinds a tenant's lane instance is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    Main,
    Cron,
    Subagent,
}

/// A lane handle returned by [`LaneManager::get_lane`], typed by which
/// kind was requested.
#[derive(Clone)]
pub enum LaneHandle {
    Main(Arc<MainLane>),
    Cron(Arc<CronLane>),
    Subagent(Arc<SubagentLane>),
}

/// Routes tenants to their lane instances, creating each lane the first
/// time it's addressed (§4.6). A tenant that never submits to the Cron
/// Lane, for instance, never has one allocated.
pub struct LaneManager {
    policy: LanePolicy,
    clock: Arc<dyn Clock>,
    recurrence_evaluator: Arc<dyn RecurrenceEvaluator>,
    main_lanes: RwLock<HashMap<String, Arc<MainLane>>>,
    cron_lanes: RwLock<HashMap<String, Arc<CronLane>>>,
    subagent_lanes: RwLock<HashMap<String, Arc<SubagentLane>>>,
}

impl LaneManager {
    /// Construct a manager with a production system clock. Use
    /// [`Self::with_collaborators`] to inject a fake clock and recurrence
    /// evaluator for tests.
    pub fn new(policy: LanePolicy, recurrence_evaluator: Arc<dyn RecurrenceEvaluator>) -> Self {
        Self::with_collaborators(policy, Arc::new(SystemClock), recurrence_evaluator)
    }

    /// Construct a manager with explicit collaborators.
    pub fn with_collaborators(
        policy: LanePolicy,
        clock: Arc<dyn Clock>,
        recurrence_evaluator: Arc<dyn RecurrenceEvaluator>,
    ) -> Self {
        Self {
            policy,
            clock,
            recurrence_evaluator,
            main_lanes: RwLock::new(HashMap::new()),
            cron_lanes: RwLock::new(HashMap::new()),
            subagent_lanes: RwLock::new(HashMap::new()),
        }
    }

    /// Get or lazily create the Main Lane for `tenant_id`.
    pub async fn main_lane(&self, tenant_id: &str) -> Arc<MainLane> {
        if let Some(lane) = self.main_lanes.read().await.get(tenant_id) {
            return lane.clone();
        }
        let mut lanes = self.main_lanes.write().await;
        lanes
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(MainLane::new(self.policy, self.clock.clone())))
            .clone()
    }

    /// Get or lazily create the Cron Lane for `tenant_id`.
    pub async fn cron_lane(&self, tenant_id: &str) -> Arc<CronLane> {
        if let Some(lane) = self.cron_lanes.read().await.get(tenant_id) {
            return lane.clone();
        }
        let mut lanes = self.cron_lanes.write().await;
        lanes
            .entry(tenant_id.to_string())
            .or_insert_with(|| {
                Arc::new(CronLane::new(
                    self.policy,
                    self.clock.clone(),
                    self.recurrence_evaluator.clone(),
                ))
            })
            .clone()
    }

    /// Get or lazily create the Subagent Lane for `tenant_id`.
    pub async fn subagent_lane(&self, tenant_id: &str) -> Arc<SubagentLane> {
        if let Some(lane) = self.subagent_lanes.read().await.get(tenant_id) {
            return lane.clone();
        }
        let mut lanes = self.subagent_lanes.write().await;
        lanes
            .entry(tenant_id.to_string())
            .or_insert_with(|| Arc::new(SubagentLane::new(self.policy, self.clock.clone())))
            .clone()
    }

    /// Look up an existing lane by `(tenant_id, kind)` without creating
    /// one. Returns `None` if that tenant has never addressed a lane of
    /// that kind.
    pub async fn get_lane(&self, tenant_id: &str, kind: LaneKind) -> Option<LaneHandle> {
        match kind {
            LaneKind::Main => self
                .main_lanes
                .read()
                .await
                .get(tenant_id)
                .cloned()
                .map(LaneHandle::Main),
            LaneKind::Cron => self
                .cron_lanes
                .read()
                .await
                .get(tenant_id)
                .cloned()
                .map(LaneHandle::Cron),
            LaneKind::Subagent => self
                .subagent_lanes
                .read()
                .await
                .get(tenant_id)
                .cloned()
                .map(LaneHandle::Subagent),
        }
    }

    /// Submit a user task to its tenant's Main Lane, creating the lane if
    /// needed.
    pub async fn enqueue_main_task(&self, submission: MainSubmission) -> LaneResult<Uuid> {
        let tenant_id = submission.task.tenant_id.clone();
        self.main_lane(&tenant_id).await.enqueue(submission).await
    }

    /// Submit a schedule to its tenant's Cron Lane, creating the lane if
    /// needed.
    pub async fn schedule_cron_task(&self, scheduled_task: ScheduledTask) -> LaneResult<Uuid> {
        let tenant_id = scheduled_task.task.tenant_id.clone();
        self.cron_lane(&tenant_id).await.schedule(scheduled_task).await
    }

    /// Spawn a subagent on its tenant's Subagent Lane, creating the lane if
    /// needed.
    pub async fn spawn_subagent(&self, submission: SubagentSubmission) -> LaneResult<Uuid> {
        let tenant_id = submission.task.tenant_id.clone();
        self.subagent_lane(&tenant_id).await.spawn(submission).await
    }

    /// Snapshot statistics for `tenant_id` across whichever lanes it
    /// actually has. A tenant with no lanes at all yields an entirely
    /// empty [`TenantStats`], per §9's reference behavior for
    /// never-addressed tenants.
    pub async fn stats(&self, tenant_id: &str) -> TenantStats {
        let main = self
            .main_lanes
            .read()
            .await
            .get(tenant_id)
            .cloned();
        let cron = self
            .cron_lanes
            .read()
            .await
            .get(tenant_id)
            .cloned();
        let subagent = self
            .subagent_lanes
            .read()
            .await
            .get(tenant_id)
            .cloned();

        TenantStats {
            main: match main {
                Some(lane) => Some(lane.stats().await),
                None => None,
            },
            cron: match cron {
                Some(lane) => Some(lane.stats().await),
                None => None,
            },
            subagent: match subagent {
                Some(lane) => Some(lane.stats().await),
                None => None,
            },
        }
    }
}

/// Per-tenant snapshot across the three lane kinds. Lanes the tenant has
/// never addressed are omitted from serialized output entirely.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TenantStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<MainLaneStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron: Option<CronLaneStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subagent: Option<SubagentLaneStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{SubagentTask, Task};
    use crate::testing::FixedIntervalEvaluator;
    use chrono::Duration as ChronoDuration;
    use serde_json::Value;
    use std::time::Duration;

    fn manager() -> LaneManager {
        let policy = LanePolicy::new(10, 5, Duration::from_secs(30), Duration::from_secs(60));
        LaneManager::new(policy, Arc::new(FixedIntervalEvaluator::new(ChronoDuration::hours(1))))
    }

    fn task(tenant_id: &str) -> Task {
        Task {
            id: Uuid::new_v4(),
            goal: Value::Null,
            submitter_id: "u".into(),
            tenant_id: tenant_id.into(),
            deadline: None,
            idempotency_key: Uuid::new_v4().to_string(),
            resource_budget: Value::Null,
            tool_ids: vec![],
            context: Value::Null,
            trace_id: None,
        }
    }

    #[tokio::test]
    async fn lanes_are_created_lazily_and_isolated_per_tenant() {
        let manager = manager();
        manager
            .enqueue_main_task(MainSubmission { task: task("tenant-a"), priority: 5 })
            .await
            .unwrap();

        assert_eq!(manager.main_lane("tenant-a").await.queue_size().await, 1);
        // tenant-b never submitted anything; its stats are entirely empty.
        let stats_b = manager.stats("tenant-b").await;
        assert!(stats_b.main.is_none());
        assert!(stats_b.cron.is_none());
        assert!(stats_b.subagent.is_none());
    }

    #[tokio::test]
    async fn get_lane_does_not_create_one() {
        let manager = manager();
        assert!(manager.get_lane("tenant-a", LaneKind::Main).await.is_none());

        manager
            .enqueue_main_task(MainSubmission { task: task("tenant-a"), priority: 5 })
            .await
            .unwrap();

        assert!(matches!(
            manager.get_lane("tenant-a", LaneKind::Main).await,
            Some(LaneHandle::Main(_))
        ));
        assert!(manager.get_lane("tenant-a", LaneKind::Cron).await.is_none());
    }

    #[tokio::test]
    async fn stats_only_reports_lanes_the_tenant_has_touched() {
        let manager = manager();
        manager
            .enqueue_main_task(MainSubmission { task: task("tenant-a"), priority: 5 })
            .await
            .unwrap();

        let stats = manager.stats("tenant-a").await;
        assert!(stats.main.is_some());
        assert!(stats.cron.is_none());
        assert!(stats.subagent.is_none());
    }

    #[tokio::test]
    async fn spawn_subagent_routes_to_the_right_tenant() {
        let manager = manager();
        let subagent = SubagentTask {
            agent_binding: Value::Null,
            goals: vec![],
            parent_execution_id: Uuid::new_v4(),
            submitter_id: "u".into(),
            tenant_id: "tenant-a".into(),
            deadline: None,
            message_queue: Value::Null,
            subagent_execution_id: Uuid::new_v4(),
            trace_id: None,
        };
        manager
            .spawn_subagent(SubagentSubmission { task: subagent, priority: 5 })
            .await
            .unwrap();

        assert_eq!(manager.subagent_lane("tenant-a").await.live_count(), 1);
        assert_eq!(manager.subagent_lane("tenant-b").await.live_count(), 0);
    }
}
