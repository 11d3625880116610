//! Cancellation source propagated into blocking dequeues.
//!
//! Mirrors the `Arc<tokio::sync::Notify>` abort-handle shape used for the
//! HTTP gateway's server shutdown signal, generalized into a reusable
//! one-shot cancellation primitive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A cloneable, one-shot cancellation signal.
///
/// Cloning a `CancelToken` shares the same underlying signal — cancelling
/// any clone cancels all of them.
#[derive(Clone, Default)]
pub struct CancelToken {
    notify: Arc<Notify>,
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, not-yet-cancelled token.
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether [`Self::cancel`] has already been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once the token is cancelled; resolves immediately if it
    /// already was.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            // Register interest before re-checking the flag, otherwise a
            // cancel() between the check above and the await below would
            // be missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}
