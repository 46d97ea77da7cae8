//! Per-run processing loops
//!
//! Both loops walk the range in id order and account for every id exactly once.
//! The sequential loop transfers one item at a time. The pipelined loop spawns a
//! producer that runs iteration, classification and downloads ahead through an
//! ordered `buffered(n)` stream into a bounded channel, while this task uploads the
//! staged items one by one in range order.

use futures::{StreamExt, TryStreamExt, stream};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Relay;
use super::summary::RunSummary;
use crate::caption::{CaptionRenderer, CaptionVars};
use crate::classify::classify;
use crate::client::RawMessage;
use crate::config::TransformRules;
use crate::engine::{StagedMedia, TransferEngine, settle_download_error};
use crate::error::{Error, Result};
use crate::filter::FilterChain;
use crate::language;
use crate::range::{Batch, RangeIterator};
use crate::rename::FilenameTransformer;
use crate::status::StatusTracker;
use crate::types::{Event, FailReason, JobOutcome, MessageId, QueueEntry, TransferJob};

/// Rules compiled once per run: filter, filename rewrite, caption template
pub(crate) struct JobPlan {
    filter: FilterChain,
    transformer: FilenameTransformer,
    captions: CaptionRenderer,
}

impl JobPlan {
    pub(crate) fn new(rules: &TransformRules) -> Self {
        Self {
            filter: FilterChain::new(&rules.whitelist, &rules.blacklist),
            transformer: FilenameTransformer::from_rules(rules),
            captions: CaptionRenderer::new(rules.caption_template.clone()),
        }
    }

    /// Classify, rewrite and filter one message
    pub(crate) fn prepare(&self, message: &RawMessage) -> Slot {
        let Some(item) = classify(message) else {
            return Slot::Unsupported(message.id);
        };

        let placeholder = format!("{}_{}", item.kind.as_str(), item.id);
        let filename = self.transformer.transform(&item.raw_filename, &placeholder);
        let tags = language::detect(&filename);
        let caption = self.captions.render(&CaptionVars {
            filename: filename.clone(),
            filesize: item.size,
            language: tags.language,
            subtitle: tags.subtitle,
            filecaption: item.original_caption.clone(),
        });

        let verdict = self.filter.check(&item.raw_filename);
        let job = TransferJob::new(item, filename, caption);
        match verdict {
            Ok(()) => Slot::Job(job),
            Err(reason) => {
                tracing::debug!(
                    message_id = job.item.id.0,
                    filename = %job.item.raw_filename,
                    reason = %reason,
                    "Filtered out"
                );
                Slot::Job(job.settle(JobOutcome::Skipped(reason)))
            }
        }
    }

    /// Every id of a batch as a slot, in id order
    pub(crate) fn expand(&self, batch: Batch) -> VecDeque<Slot> {
        match batch {
            Batch::Failed { ids, .. } => ids.into_iter().map(Slot::Unfetched).collect(),
            Batch::Fetched { messages, missing } => {
                let mut slots: Vec<Slot> = messages
                    .iter()
                    .map(|m| self.prepare(m))
                    .chain(missing.into_iter().map(Slot::Missing))
                    .collect();
                slots.sort_by_key(Slot::id);
                slots.into()
            }
        }
    }
}

/// Accounting unit for one message id
#[derive(Debug)]
pub(crate) enum Slot {
    /// No transferable media
    Unsupported(MessageId),
    /// Not returned by the source
    Missing(MessageId),
    /// Its batch could not be fetched
    Unfetched(MessageId),
    /// A job, pending or already skipped by the filter
    Job(TransferJob),
}

impl Slot {
    fn id(&self) -> MessageId {
        match self {
            Slot::Unsupported(id) | Slot::Missing(id) | Slot::Unfetched(id) => *id,
            Slot::Job(job) => job.item.id,
        }
    }

    fn pending(&self) -> Option<&TransferJob> {
        match self {
            Slot::Job(job) if !job.outcome.is_settled() => Some(job),
            _ => None,
        }
    }
}

/// A slot after the download stage of the pipelined loop
enum Prefetched {
    /// Nothing to download
    Slot(Slot),
    /// Staged and waiting for upload
    Staged {
        job: TransferJob,
        staged: StagedMedia,
        token: CancellationToken,
    },
}

/// Everything a run loop needs, fixed at run start
pub(crate) struct RunContext {
    pub(crate) rules: Arc<TransformRules>,
    pub(crate) plan: Arc<JobPlan>,
    pub(crate) token: CancellationToken,
}

fn preview<'a>(upcoming: impl Iterator<Item = &'a Slot>) -> impl Iterator<Item = QueueEntry> {
    upcoming.filter_map(Slot::pending).map(|job| QueueEntry {
        id: job.item.id,
        filename: job.output_filename.clone(),
        size: job.item.size,
    })
}

impl Relay {
    /// Transfer items one at a time
    pub(super) async fn run_sequential(
        &self,
        mut iter: RangeIterator,
        ctx: &RunContext,
        summary: &mut RunSummary,
    ) -> Result<()> {
        while let Some(batch) = iter.next_batch().await? {
            let mut slots = ctx.plan.expand(batch);

            while let Some(slot) = slots.pop_front() {
                if !self.hold(&ctx.token).await {
                    return Ok(());
                }

                let job = match slot {
                    Slot::Job(job) if !job.outcome.is_settled() => job,
                    other => {
                        self.account(other, summary);
                        continue;
                    }
                };

                self.tracker.set_queue_preview(preview(slots.iter()));
                let token = self.tracker.child_token();
                self.tracker
                    .begin_item(job.item.id, &job.output_filename, &token);

                let done = self.engine.transfer(job, &ctx.rules, &token).await?;
                self.account(Slot::Job(done), summary);
            }
        }
        Ok(())
    }

    /// Download up to `depth` items ahead of the sequential upload stage
    pub(super) async fn run_pipelined(
        &self,
        iter: RangeIterator,
        ctx: &RunContext,
        summary: &mut RunSummary,
        depth: usize,
    ) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<Result<Prefetched>>(depth);
        let producer = tokio::spawn(produce(
            iter,
            ctx.plan.clone(),
            ctx.rules.clone(),
            self.engine.clone(),
            self.tracker.clone(),
            depth,
            tx,
        ));

        let mut result = Ok(());
        while let Some(next) = rx.recv().await {
            let prefetched = match next {
                Ok(prefetched) => prefetched,
                Err(e) => {
                    result = Err(e);
                    break;
                }
            };
            if !self.hold(&ctx.token).await {
                break;
            }

            match prefetched {
                Prefetched::Slot(slot) => self.account(slot, summary),
                Prefetched::Staged { job, staged, token } => {
                    self.tracker
                        .begin_item(job.item.id, &job.output_filename, &token);
                    match self.engine.finish(job, staged, &ctx.rules, &token).await {
                        Ok(done) => self.account(Slot::Job(done), summary),
                        Err(e) => {
                            result = Err(e);
                            break;
                        }
                    }
                }
            }
        }

        // Unblocks the producer; staged items still queued are dropped and cleaned up
        drop(rx);
        if result.is_err() {
            ctx.token.cancel();
        }
        match producer.await {
            Ok(()) => result,
            Err(e) => result.and(Err(Error::Other(format!("download stage panicked: {}", e)))),
        }
    }

    /// Wait out a pause; false once the run is cancelled
    async fn hold(&self, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            return false;
        }
        self.tracker.wait_while_paused().await;
        !token.is_cancelled()
    }

    /// Count one settled slot in the summary, the status and the event stream
    fn account(&self, slot: Slot, summary: &mut RunSummary) {
        match slot {
            Slot::Unsupported(id) => {
                tracing::debug!(message_id = id.0, "No transferable media");
                summary.unsupported += 1;
                self.tracker.mark_processed(1);
            }
            Slot::Missing(id) => {
                tracing::debug!(message_id = id.0, "Message missing from source");
                summary.missing += 1;
                self.tracker.mark_processed(1);
            }
            Slot::Unfetched(id) => {
                summary.record_unfetched(1);
                self.tracker.record_unfetched(1);
                self.emit(Event::ItemFinished {
                    id,
                    filename: String::new(),
                    outcome: JobOutcome::Failed(FailReason::Fetch),
                });
            }
            Slot::Job(job) => {
                match &job.outcome {
                    JobOutcome::Succeeded => tracing::info!(
                        message_id = job.item.id.0,
                        filename = %job.output_filename,
                        "Item transferred"
                    ),
                    JobOutcome::Failed(reason) => tracing::warn!(
                        message_id = job.item.id.0,
                        filename = %job.output_filename,
                        reason = %reason,
                        "Item failed"
                    ),
                    outcome => tracing::info!(
                        message_id = job.item.id.0,
                        filename = %job.output_filename,
                        outcome = ?outcome,
                        "Item skipped"
                    ),
                }
                summary.record(&job);
                self.tracker.record_outcome(&job);
                self.emit(Event::ItemFinished {
                    id: job.item.id,
                    filename: job.output_filename,
                    outcome: job.outcome,
                });
            }
        }
    }
}

/// Producer side of the pipelined loop
async fn produce(
    iter: RangeIterator,
    plan: Arc<JobPlan>,
    rules: Arc<TransformRules>,
    engine: TransferEngine,
    tracker: StatusTracker,
    depth: usize,
    tx: mpsc::Sender<Result<Prefetched>>,
) {
    let slots = iter
        .into_stream()
        .map_ok(|batch| {
            let slots = plan.expand(batch);
            tracker.set_queue_preview(preview(slots.iter()));
            stream::iter(slots.into_iter().map(Ok::<_, Error>))
        })
        .try_flatten();

    let prefetched = slots
        .map(|slot| {
            let engine = engine.clone();
            let tracker = tracker.clone();
            let rules = rules.clone();
            async move { prefetch(slot?, &engine, &tracker, &rules).await }
        })
        .buffered(depth);
    let mut prefetched = std::pin::pin!(prefetched);

    while let Some(next) = prefetched.next().await {
        let fatal = next.is_err();
        if tx.send(next).await.is_err() || fatal {
            break;
        }
    }
}

/// Gate and download one slot, if it is a pending job
async fn prefetch(
    slot: Slot,
    engine: &TransferEngine,
    tracker: &StatusTracker,
    rules: &TransformRules,
) -> Result<Prefetched> {
    let job = match slot {
        Slot::Job(job) if !job.outcome.is_settled() => job,
        other => return Ok(Prefetched::Slot(other)),
    };

    if let Some(reason) = engine.gate(&job.item, rules.premium_allowed) {
        return Ok(Prefetched::Slot(Slot::Job(
            job.settle(JobOutcome::Skipped(reason)),
        )));
    }

    let token = tracker.child_token();
    match engine.download(&job.item, &token).await {
        Ok(staged) => Ok(Prefetched::Staged { job, staged, token }),
        Err(e) => settle_download_error(job, e).map(|job| Prefetched::Slot(Slot::Job(job))),
    }
}
