//! Batched, forward-ordered iteration over a message range
//!
//! [`RangeIterator`] walks `[start, end]` in windows of `batch_size` ids. Each window
//! is fetched under the retry policy; a window that still fails afterwards is handed
//! out as [`Batch::Failed`] so its ids can be reported, and iteration carries on with
//! the next window. Only fatal errors stop iteration with an error. The iterator can
//! be restarted from the beginning but not resumed from the middle.

use futures::Stream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::client::{ChatClient, RawMessage};
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{MessageId, MessageRange};

/// One window of the range
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Batch {
    /// The window was fetched
    Fetched {
        /// Messages in the window, ascending by id, without duplicates
        messages: Vec<RawMessage>,
        /// Ids in the window the source did not return (deleted, service messages)
        missing: Vec<MessageId>,
    },
    /// The window could not be fetched, even after retries
    Failed {
        /// Every id in the window
        ids: Vec<MessageId>,
        /// Last error seen
        error: String,
    },
}

impl Batch {
    /// Number of message ids the batch accounts for
    pub fn id_count(&self) -> usize {
        match self {
            Batch::Fetched { messages, missing } => messages.len() + missing.len(),
            Batch::Failed { ids, .. } => ids.len(),
        }
    }
}

/// Lazy iterator over the messages of a [`MessageRange`]
pub struct RangeIterator {
    client: Arc<dyn ChatClient>,
    range: MessageRange,
    batch_size: i64,
    retry: RetryConfig,
    cancel: CancellationToken,
    next_id: Option<i64>,
}

impl RangeIterator {
    /// Create an iterator positioned at the start of `range`
    pub fn new(
        client: Arc<dyn ChatClient>,
        range: MessageRange,
        batch_size: usize,
        retry: RetryConfig,
        cancel: CancellationToken,
    ) -> Self {
        let next_id = Some(range.start.0);
        Self {
            client,
            range,
            batch_size: i64::try_from(batch_size.max(1)).unwrap_or(i64::MAX),
            retry,
            cancel,
            next_id,
        }
    }

    /// The range being iterated
    pub fn range(&self) -> &MessageRange {
        &self.range
    }

    /// Go back to the start of the range
    pub fn restart(&mut self) {
        self.next_id = Some(self.range.start.0);
    }

    /// Fetch the next window
    ///
    /// Returns `Ok(None)` once the range is exhausted or the run is cancelled.
    pub async fn next_batch(&mut self) -> Result<Option<Batch>> {
        let Some(first) = self.next_id else {
            return Ok(None);
        };
        if self.cancel.is_cancelled() {
            self.next_id = None;
            return Ok(None);
        }

        let last = first
            .saturating_add(self.batch_size - 1)
            .min(self.range.end.0);
        self.next_id = (last < self.range.end.0).then_some(last + 1);
        let ids: Vec<MessageId> = (first..=last).map(MessageId).collect();

        tracing::debug!(
            channel = %self.range.channel,
            first = first,
            last = last,
            "Fetching message batch"
        );

        let client = self.client.as_ref();
        let channel = &self.range.channel;
        let window = ids.as_slice();
        let fetched = with_retry(&self.retry, &self.cancel, move || {
            client.fetch_messages(channel, window)
        })
        .await;

        match fetched {
            Ok(raw) => Ok(Some(self.settle_window(ids, raw))),
            Err(Error::Cancelled) => {
                self.next_id = None;
                Ok(None)
            }
            Err(e) if e.is_fatal() => {
                self.next_id = None;
                Err(e)
            }
            Err(e) => {
                tracing::warn!(
                    channel = %self.range.channel,
                    first = first,
                    last = last,
                    error = %e,
                    "Message batch could not be fetched, reporting its ids as failed"
                );
                Ok(Some(Batch::Failed {
                    ids,
                    error: e.to_string(),
                }))
            }
        }
    }

    /// Keep only messages inside the window, ordered and unique, and list the gaps
    fn settle_window(&self, ids: Vec<MessageId>, mut raw: Vec<RawMessage>) -> Batch {
        let (first, last) = match (ids.first(), ids.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Batch::Fetched {
                    messages: Vec::new(),
                    missing: Vec::new(),
                };
            }
        };

        raw.retain(|m| first <= m.id && m.id <= last);
        raw.sort_by_key(|m| m.id);
        raw.dedup_by_key(|m| m.id);

        let missing: Vec<MessageId> = ids
            .into_iter()
            .filter(|id| raw.binary_search_by_key(id, |m| m.id).is_err())
            .collect();

        if !missing.is_empty() {
            tracing::debug!(count = missing.len(), "Message ids missing from source");
        }

        Batch::Fetched {
            messages: raw,
            missing,
        }
    }

    /// Turn the iterator into a stream of batches
    ///
    /// The stream ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Batch>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut iter = state?;
            match iter.next_batch().await {
                Ok(Some(batch)) => Some((Ok(batch), Some(iter))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
