//! Main Lane: user-submitted tasks. Admission, dedup cache, priority
//! enqueue, deadline check.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::dedup::DedupCache;
use crate::error::{LaneError, LaneResult};
use crate::policy::{LanePolicy, clamp_priority};
use crate::queue::PriorityQueue;
use crate::task::{MainSubmission, Task};

struct MainLaneState {
    queue: PriorityQueue<Task>,
    dedup: DedupCache,
}

/// A single tenant's Main Lane.
pub struct MainLane {
    policy: LanePolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<MainLaneState>,
    /// Fired whenever an enqueue succeeds, so blocked dequeuers can
    /// recheck the queue.
    work_notify: Notify,
}

impl MainLane {
    pub(crate) fn new(policy: LanePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(MainLaneState {
                queue: PriorityQueue::new(policy.max_queue_depth),
                dedup: DedupCache::new(policy.dedup_window),
            }),
            policy,
            clock,
            work_notify: Notify::new(),
        }
    }

    /// Enqueue a task. See §4.3:
    /// 1. reject expired tasks,
    /// 2. short-circuit on a live dedup hit,
    /// 3. enqueue at the clamped priority level or reject at capacity,
    /// 4. record the dedup entry on first-time success.
    pub async fn enqueue(&self, submission: MainSubmission) -> LaneResult<Uuid> {
        let now = self.clock.now();
        let MainSubmission { task, priority } = submission;

        if task.is_expired(now) {
            tracing::debug!(task_id = %task.id, "main lane: rejecting expired task");
            return Err(LaneError::DeadlineExpired);
        }

        let priority = clamp_priority(priority);
        let task_id = task.id;
        let idempotency_key = task.idempotency_key.clone();

        let mut state = self.state.lock().await;

        if let Some(cached_id) = state.dedup.get(&idempotency_key, now) {
            tracing::debug!(
                idempotency_key = %idempotency_key,
                task_id = %cached_id,
                "main lane: idempotent resubmission, returning cached id"
            );
            return Ok(cached_id);
        }

        state.queue.enqueue(priority, task)?;
        state.dedup.insert(idempotency_key, task_id, now);
        drop(state);

        tracing::debug!(task_id = %task_id, priority, "main lane: enqueued");
        self.work_notify.notify_waiters();
        Ok(task_id)
    }

    /// Block until a task is available or `cancel` fires.
    pub async fn dequeue(&self, cancel: &CancelToken) -> LaneResult<Task> {
        loop {
            let notified = self.work_notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(task) = state.queue.dequeue() {
                    tracing::debug!(task_id = %task.id, "main lane: dequeued");
                    return Ok(task);
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return Err(LaneError::Cancelled),
            }
        }
    }

    /// Current total queue size across all priority levels.
    pub async fn queue_size(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub(crate) fn policy(&self) -> &LanePolicy {
        &self.policy
    }
}

/// Snapshot statistics for a tenant's Main Lane.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MainLaneStats {
    pub queue_size: usize,
    pub queue_depth_percent: f64,
}

impl MainLane {
    pub(crate) async fn stats(&self) -> MainLaneStats {
        let size = self.queue_size().await;
        MainLaneStats {
            queue_size: size,
            queue_depth_percent: size as f64 / self.policy.max_queue_depth as f64 * 100.0,
        }
    }
}
