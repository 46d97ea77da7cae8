//! Run status tracking shared with the presentation layer
//!
//! [`StatusTracker`] is a cheap cloneable handle. The run state lives in a
//! `tokio::sync::watch` channel: every mutation goes through `send_modify` (one
//! writer at a time), readers get a copied-out [`RunStatus`] from [`StatusTracker::snapshot`]
//! or await changes through [`StatusTracker::subscribe`]. The cancellation tokens
//! for the run and for the item in flight are kept next to it, so pause/cancel
//! requests from another task reach the pipeline at its next check point.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::types::{
    ChannelRef, Direction, JobOutcome, MessageId, QueueEntry, RunState, RunStatus, TransferJob,
};

struct Tokens {
    run: CancellationToken,
    item: CancellationToken,
}

impl Tokens {
    fn fresh() -> Self {
        let run = CancellationToken::new();
        let item = run.child_token();
        Self { run, item }
    }
}

/// Synchronized run state, owned by the orchestrator and polled by the presentation layer
#[derive(Clone)]
pub struct StatusTracker {
    status: Arc<watch::Sender<RunStatus>>,
    tokens: Arc<Mutex<Tokens>>,
    preview_len: usize,
}

impl StatusTracker {
    /// Create an idle tracker whose queue preview holds at most `preview_len` entries
    pub fn new(preview_len: usize) -> Self {
        let (status, _rx) = watch::channel(RunStatus::default());
        Self {
            status: Arc::new(status),
            tokens: Arc::new(Mutex::new(Tokens::fresh())),
            preview_len: preview_len.max(1),
        }
    }

    fn tokens(&self) -> MutexGuard<'_, Tokens> {
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a run over `total` message ids; returns the run's cancellation token
    pub fn begin(&self, total: Option<u64>) -> CancellationToken {
        let run = {
            let mut tokens = self.tokens();
            *tokens = Tokens::fresh();
            tokens.run.clone()
        };
        self.status.send_modify(|s| {
            *s = RunStatus {
                state: RunState::Running,
                total,
                started_at: Some(Utc::now()),
                ..RunStatus::default()
            };
        });
        run
    }

    /// Whether a run is in progress (callers reject a second run while this is true)
    pub fn is_active(&self) -> bool {
        self.status.borrow().state != RunState::Idle
    }

    /// A fresh item token, cancelled along with the run
    pub fn child_token(&self) -> CancellationToken {
        self.tokens().run.child_token()
    }

    /// Make `id` the item in flight; cancel-current will cancel `token`
    pub fn begin_item(&self, id: MessageId, filename: &str, token: &CancellationToken) {
        self.tokens().item = token.clone();
        self.status.send_modify(|s| {
            s.current_id = Some(id);
            s.current_filename = Some(filename.to_string());
            s.current_destination = None;
            s.direction = None;
            s.bytes_done = 0;
            s.bytes_total = 0;
            s.cancel_current = false;
        });
    }

    /// Update the current filename and destination in progress
    pub fn set_current(&self, filename: &str, destination: Option<&ChannelRef>) {
        self.status.send_modify(|s| {
            s.current_filename = Some(filename.to_string());
            s.current_destination = destination.cloned();
        });
    }

    /// Report transfer progress for item `id`
    ///
    /// Progress of items other than the one in flight (prefetched downloads) is not
    /// shown.
    pub fn advance_progress(
        &self,
        id: MessageId,
        bytes_done: u64,
        bytes_total: u64,
        direction: Direction,
    ) {
        self.status.send_if_modified(|s| {
            if s.current_id != Some(id) {
                return false;
            }
            s.bytes_done = bytes_done;
            s.bytes_total = bytes_total;
            s.direction = Some(direction);
            true
        });
    }

    /// Replace the queue preview with the next upcoming items
    pub fn set_queue_preview<I>(&self, upcoming: I)
    where
        I: IntoIterator<Item = QueueEntry>,
    {
        let preview: Vec<QueueEntry> = upcoming.into_iter().take(self.preview_len).collect();
        self.status.send_modify(|s| s.queue_preview = preview);
    }

    /// Account for a finished job
    pub fn record_outcome(&self, job: &TransferJob) {
        self.status.send_modify(|s| {
            s.processed += 1;
            match &job.outcome {
                JobOutcome::Succeeded => s.succeeded += 1,
                JobOutcome::Skipped(_) => s.skipped += 1,
                JobOutcome::Failed(_) => s.failed += 1,
                JobOutcome::Pending => {}
            }
            if s.current_id == Some(job.item.id) {
                s.current_id = None;
                s.current_filename = None;
                s.current_destination = None;
                s.direction = None;
                s.bytes_done = 0;
                s.bytes_total = 0;
                s.cancel_current = false;
            }
        });
    }

    /// Account for message ids that produced no job (no media, missing, unfetchable)
    pub fn mark_processed(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.status.send_modify(|s| s.processed += count);
    }

    /// Account for message ids whose batch could not be fetched; they count as failed
    pub fn record_unfetched(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.status.send_modify(|s| {
            s.processed += count;
            s.failed += count;
        });
    }

    /// Hold the pipeline before the next item; returns false if no run is active
    pub fn pause(&self) -> bool {
        self.status.send_if_modified(|s| {
            if s.state == RunState::Running {
                s.state = RunState::Paused;
                true
            } else {
                false
            }
        })
    }

    /// Release a paused pipeline; returns false if it was not paused
    pub fn resume(&self) -> bool {
        self.status.send_if_modified(|s| {
            if s.state == RunState::Paused {
                s.state = RunState::Running;
                true
            } else {
                false
            }
        })
    }

    /// Stop the run: abort the item in flight and issue no further items
    pub fn request_cancel_all(&self) {
        let active = self.status.send_if_modified(|s| {
            if s.state == RunState::Idle {
                return false;
            }
            s.state = RunState::Cancelling;
            s.cancel_all = true;
            true
        });
        if active {
            self.tokens().run.cancel();
        }
    }

    /// Abort only the item in flight
    pub fn request_cancel_current(&self) {
        let in_flight = self.status.send_if_modified(|s| {
            if s.current_id.is_none() {
                return false;
            }
            s.cancel_current = true;
            true
        });
        if in_flight {
            self.tokens().item.cancel();
        }
    }

    /// Whether cancel-all has been requested for the active run
    pub fn is_cancel_all_requested(&self) -> bool {
        self.tokens().run.is_cancelled()
    }

    /// Wait while the run is paused
    ///
    /// Returns immediately when not paused, and as soon as the run is cancelled.
    pub async fn wait_while_paused(&self) {
        let mut rx = self.status.subscribe();
        let run = self.tokens().run.clone();
        tokio::select! {
            _ = run.cancelled() => {}
            _ = rx.wait_for(|s| s.state != RunState::Paused) => {}
        }
    }

    /// Consistent point-in-time copy of the run state
    pub fn snapshot(&self) -> RunStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    /// Return to idle, cancelling whatever is still running under the old run token
    pub fn reset(&self) {
        {
            let mut tokens = self.tokens();
            tokens.run.cancel();
            *tokens = Tokens::fresh();
        }
        self.status.send_modify(|s| *s = RunStatus::default());
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new(5)
    }
}
