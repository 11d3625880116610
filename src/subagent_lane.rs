//! Subagent Lane: parallel-worker spawn/complete with a live concurrency
//! counter and priority queue.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::error::{LaneError, LaneResult};
use crate::policy::{LanePolicy, clamp_priority};
use crate::queue::PriorityQueue;
use crate::task::{SubagentSubmission, SubagentTask};

struct SubagentLaneState {
    queue: PriorityQueue<SubagentTask>,
    live_executions: HashMap<Uuid, SubagentTask>,
}

/// A single tenant's Subagent Lane.
pub struct SubagentLane {
    policy: LanePolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<SubagentLaneState>,
    work_notify: Notify,
    /// Live-worker counter: spawn acknowledgements minus completion
    /// acknowledgements. Mirrored here as an atomic for cheap reads by
    /// `stats()`; all writes happen under `state`'s lock so it always
    /// agrees with `live_executions.len()`.
    live_count: AtomicI64,
}

impl SubagentLane {
    pub(crate) fn new(policy: LanePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(SubagentLaneState {
                queue: PriorityQueue::new(policy.max_queue_depth),
                live_executions: HashMap::new(),
            }),
            policy,
            clock,
            work_notify: Notify::new(),
            live_count: AtomicI64::new(0),
        }
    }

    /// Spawn a subagent. See §4.5: reject expired tasks, reject at
    /// per-level capacity, else enqueue, register as live, and bump the
    /// counter.
    ///
    /// `max_concurrency` is observational only (§4.5) — spawns are never
    /// refused for being over the concurrency cap; that's left to an
    /// external admission controller watching `stats()`.
    pub async fn spawn(&self, submission: SubagentSubmission) -> LaneResult<Uuid> {
        let now = self.clock.now();
        let SubagentSubmission { task, priority } = submission;

        if task.is_expired(now) {
            tracing::debug!(execution_id = %task.subagent_execution_id, "subagent lane: rejecting expired spawn");
            return Err(LaneError::DeadlineExpired);
        }

        let priority = clamp_priority(priority);
        let execution_id = task.subagent_execution_id;

        let mut state = self.state.lock().await;
        state.queue.enqueue(priority, task.clone())?;
        state.live_executions.insert(execution_id, task);
        self.live_count.fetch_add(1, Ordering::SeqCst);
        drop(state);

        tracing::info!(execution_id = %execution_id, priority, "subagent lane: spawned");
        self.work_notify.notify_waiters();
        Ok(execution_id)
    }

    /// Block until a subagent task is available or `cancel` fires. Does
    /// not change the live-worker counter — only `complete()` does.
    pub async fn dequeue(&self, cancel: &CancelToken) -> LaneResult<SubagentTask> {
        loop {
            let notified = self.work_notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(task) = state.queue.dequeue() {
                    tracing::debug!(execution_id = %task.subagent_execution_id, "subagent lane: dequeued");
                    return Ok(task);
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Err(LaneError::Cancelled),
            }
        }
    }

    /// Release a concurrency slot. Idempotent: completing an
    /// already-completed (or never-spawned) identifier is a no-op.
    pub async fn complete(&self, execution_id: Uuid) {
        let mut state = self.state.lock().await;
        if state.live_executions.remove(&execution_id).is_some() {
            self.live_count.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!(execution_id = %execution_id, "subagent lane: completed");
        }
    }

    /// Current live-worker count. Always equal to the cardinality of the
    /// live-executions map (§8 invariant 6).
    pub fn live_count(&self) -> i64 {
        self.live_count.load(Ordering::SeqCst)
    }

    pub async fn queue_size(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub(crate) fn policy(&self) -> &LanePolicy {
        &self.policy
    }
}

/// Snapshot statistics for a tenant's Subagent Lane.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SubagentLaneStats {
    pub queue_size: usize,
    pub live_count: i64,
    pub concurrency_percent: f64,
}

impl SubagentLane {
    pub(crate) async fn stats(&self) -> SubagentLaneStats {
        let size = self.queue_size().await;
        let live = self.live_count();
        SubagentLaneStats {
            queue_size: size,
            live_count: live,
            concurrency_percent: live as f64 / self.policy.max_concurrency as f64 * 100.0,
        }
    }
}
