//! Transfer engine: moves one media item to every configured destination
//!
//! Per job: size gate, chunked download into staging, sequential upload to each
//! destination, staging cleanup. Per-item failures become the job's outcome; only
//! fatal errors (lost authorization) come back as `Err`.
//!
//! # Module Organization
//!
//! - [`staging`] - transient staging files, removed on drop
//! - `download` - chunked download with per-chunk timeout, retry and cancellation
//! - `upload` - per-destination part upload and send

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::ChatClient;
use crate::config::{RetryConfig, TransferConfig, TransformRules};
use crate::error::{Error, Result};
use crate::status::StatusTracker;
use crate::types::{FailReason, JobOutcome, MediaItem, SkipReason, TransferJob};

mod download;
pub mod staging;
mod upload;


pub use staging::StagedMedia;

/// Moves media items from the source to destinations
#[derive(Clone)]
pub struct TransferEngine {
    client: Arc<dyn ChatClient>,
    tracker: StatusTracker,
    config: Arc<TransferConfig>,
    retry: RetryConfig,
}

impl TransferEngine {
    /// Create an engine reporting progress to `tracker`
    pub fn new(
        client: Arc<dyn ChatClient>,
        tracker: StatusTracker,
        config: Arc<TransferConfig>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            tracker,
            config,
            retry,
        }
    }

    /// Size gate: items above the premium threshold need `premium_allowed`
    pub fn gate(&self, item: &MediaItem, premium_allowed: bool) -> Option<SkipReason> {
        (item.size > self.config.premium_threshold && !premium_allowed)
            .then_some(SkipReason::SizeLimit)
    }

    /// Run the whole job: gate, download, deliver, clean up
    pub async fn transfer(
        &self,
        job: TransferJob,
        rules: &TransformRules,
        token: &CancellationToken,
    ) -> Result<TransferJob> {
        if let Some(reason) = self.gate(&job.item, rules.premium_allowed) {
            tracing::info!(
                message_id = job.item.id.0,
                size = job.item.size,
                threshold = self.config.premium_threshold,
                "Skipping item above the size limit"
            );
            return Ok(job.settle(JobOutcome::Skipped(reason)));
        }

        match self.download(&job.item, token).await {
            Ok(staged) => self.finish(job, staged, rules, token).await,
            Err(e) => settle_download_error(job, e),
        }
    }

    /// Deliver an already staged job and remove its staging file
    pub async fn finish(
        &self,
        mut job: TransferJob,
        staged: StagedMedia,
        rules: &TransformRules,
        token: &CancellationToken,
    ) -> Result<TransferJob> {
        job.bytes_downloaded = staged.size();
        let delivered = self.deliver(job, &staged, rules, token).await;
        staged.release();
        delivered
    }
}

/// Turn a download error into the job's outcome, letting only fatal errors through
pub(crate) fn settle_download_error(job: TransferJob, error: Error) -> Result<TransferJob> {
    if error.is_fatal() {
        return Err(error);
    }
    if error.is_cancelled() {
        tracing::info!(message_id = job.item.id.0, "Item cancelled during download");
        return Ok(job.settle(JobOutcome::Failed(FailReason::Cancelled)));
    }
    tracing::warn!(
        message_id = job.item.id.0,
        filename = %job.output_filename,
        error = %error,
        "Download failed"
    );
    Ok(job.settle(JobOutcome::Failed(FailReason::Download)))
}
