//! Range transfer orchestration
//!
//! [`Relay`] ties the pipeline together: resolve the two links, take one rules
//! snapshot, walk the range, hand every qualifying item to the
//! [`TransferEngine`](crate::engine::TransferEngine), and return a [`RunSummary`].
//! Per-item problems end up in the summary; only fatal errors (lost
//! authorization) and unusable input (bad links, no destinations) come back as
//! `Err`.
//!
//! - [`summary`] - the run summary and its text rendering
//! - `pipeline` - the sequential and pipelined processing loops

mod pipeline;
pub mod summary;


pub use summary::RunSummary;

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use crate::client::ChatClient;
use crate::config::{Config, RetryConfig, TransferConfig};
use crate::engine::TransferEngine;
use crate::error::Result;
use crate::links::resolve_range;
use crate::range::RangeIterator;
use crate::settings::SettingsStore;
use crate::status::StatusTracker;
use crate::types::Event;

use pipeline::{JobPlan, RunContext};

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Range transfer orchestrator (cloneable, all fields are shared)
#[derive(Clone)]
pub struct Relay {
    /// Chat transport
    client: Arc<dyn ChatClient>,
    /// Where per-run rules snapshots come from
    settings: Arc<dyn SettingsStore>,
    /// Transfer behavior, fixed for the relay's lifetime
    transfer: Arc<TransferConfig>,
    /// Retry policy for every network operation
    retry: RetryConfig,
    /// Run status shared with the presentation layer
    tracker: StatusTracker,
    /// Moves individual items
    engine: TransferEngine,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
}

impl Relay {
    /// Create a relay
    ///
    /// The transfer section of `config` is validated here; the rules are read from
    /// `settings` (and validated) at the start of every run.
    pub fn new(
        client: Arc<dyn ChatClient>,
        settings: Arc<dyn SettingsStore>,
        config: &Config,
    ) -> Result<Self> {
        config.transfer.validate()?;

        let transfer = Arc::new(config.transfer.clone());
        let tracker = StatusTracker::new(transfer.queue_preview_len);
        let engine = TransferEngine::new(
            client.clone(),
            tracker.clone(),
            transfer.clone(),
            config.retry.clone(),
        );
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            settings,
            transfer,
            retry: config.retry.clone(),
            tracker,
            engine,
            event_tx,
        })
    }

    /// Status handle for pause/resume/cancel requests and snapshots
    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    /// Subscribe to run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Transfer every qualifying message between two permalinks (inclusive)
    ///
    /// One run at a time: callers must not start a run while
    /// [`StatusTracker::is_active`] is true. The tracker is reset when the run ends,
    /// whatever the outcome.
    pub async fn process_range(&self, start_link: &str, end_link: &str) -> Result<RunSummary> {
        let range = resolve_range(start_link, end_link)?;
        let rules = self.settings.snapshot();
        rules.validate()?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let token = self.tracker.begin(Some(range.len()));

        tracing::info!(
            range = %range,
            total = range.len(),
            destinations = rules.destinations.len(),
            concurrency = self.transfer.download_concurrency,
            "Starting range transfer"
        );
        self.emit(Event::RunStarted {
            range: range.clone(),
            total: range.len(),
        });

        let iter = RangeIterator::new(
            self.client.clone(),
            range.clone(),
            self.transfer.batch_size,
            self.retry.clone(),
            token.clone(),
        );
        let ctx = RunContext {
            plan: Arc::new(JobPlan::new(&rules)),
            rules: Arc::new(rules),
            token: token.clone(),
        };
        let mut summary = RunSummary::new(range, started_at);

        let outcome = match self.transfer.download_concurrency {
            0 | 1 => self.run_sequential(iter, &ctx, &mut summary).await,
            depth => self.run_pipelined(iter, &ctx, &mut summary, depth).await,
        };

        summary.cancelled = token.is_cancelled();
        summary.elapsed = clock.elapsed();
        self.tracker.reset();

        match outcome {
            Ok(()) => {
                tracing::info!(
                    succeeded = summary.succeeded,
                    skipped = summary.skipped_total(),
                    failed = summary.failed_total(),
                    cancelled = summary.cancelled,
                    "Range transfer finished"
                );
                self.emit(Event::RunFinished {
                    succeeded: summary.succeeded,
                    skipped: summary.skipped_total(),
                    failed: summary.failed_total(),
                    cancelled: summary.cancelled,
                });
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(error = %e, "Range transfer aborted");
                Err(e)
            }
        }
    }
}
