//! Sequential upload of a staged file to every destination

use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::TransferEngine;
use super::staging::StagedMedia;
use crate::client::{SendMedia, UploadedFile};
use crate::config::TransformRules;
use crate::error::{Error, Result};
use crate::retry::{with_retry, with_timeout};
use crate::types::{ChannelRef, Delivery, Direction, FailReason, JobOutcome, TransferJob};

impl TransferEngine {
    /// Upload a staged file to each destination of `rules`, in order
    ///
    /// A destination that fails (after retries) is recorded and the next one is
    /// still attempted; earlier deliveries are never rolled back. Cancellation stops
    /// at the next part boundary and marks the job cancelled.
    pub async fn deliver(
        &self,
        mut job: TransferJob,
        staged: &StagedMedia,
        rules: &TransformRules,
        token: &CancellationToken,
    ) -> Result<TransferJob> {
        let mut cancelled = false;

        for destination in &rules.destinations {
            if token.is_cancelled() {
                cancelled = true;
                break;
            }
            self.tracker
                .set_current(&job.output_filename, Some(destination));

            match self
                .upload_to(&job, staged, destination, rules.thumbnail.as_deref(), token)
                .await
            {
                Ok(()) => {
                    tracing::info!(
                        message_id = job.item.id.0,
                        destination = %destination,
                        filename = %job.output_filename,
                        "Delivered"
                    );
                    job.deliveries.push(Delivery {
                        destination: destination.clone(),
                        error: None,
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(Error::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = job.item.id.0,
                        destination = %destination,
                        error = %e,
                        "Upload to destination failed"
                    );
                    job.deliveries.push(Delivery {
                        destination: destination.clone(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let delivered = job.deliveries.iter().filter(|d| d.is_delivered()).count() as u64;
        job.bytes_uploaded = staged.size() * delivered;

        let failed: Vec<ChannelRef> = job
            .deliveries
            .iter()
            .filter(|d| !d.is_delivered())
            .map(|d| d.destination.clone())
            .collect();

        let outcome = if cancelled {
            JobOutcome::Failed(FailReason::Cancelled)
        } else if failed.is_empty() {
            JobOutcome::Succeeded
        } else {
            JobOutcome::Failed(FailReason::Upload { failed })
        };
        Ok(job.settle(outcome))
    }

    /// Upload all parts under a fresh upload id, then post the file to `destination`
    async fn upload_to(
        &self,
        job: &TransferJob,
        staged: &StagedMedia,
        destination: &ChannelRef,
        thumbnail: Option<&Path>,
        token: &CancellationToken,
    ) -> Result<()> {
        let client = self.client.as_ref();
        let deadline = self.config.chunk_timeout;
        let chunk_size = self.config.chunk_size;
        let size = staged.size();
        let total_parts = u32::try_from(size.div_ceil(chunk_size as u64).max(1))
            .map_err(|_| Error::Other(format!("file of {} bytes needs too many parts", size)))?;
        let upload_id: u64 = rand::random();

        tracing::debug!(
            message_id = job.item.id.0,
            destination = %destination,
            upload_id = upload_id,
            parts = total_parts,
            "Uploading parts"
        );
        self.tracker
            .advance_progress(job.item.id, 0, size, Direction::Upload);

        let mut file = tokio::fs::File::open(staged.path()).await?;
        let mut buf = vec![0u8; chunk_size];
        let mut sent: u64 = 0;

        for part in 0..total_parts {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let len = read_part(&mut file, &mut buf).await?;
            let bytes = &buf[..len];
            with_retry(&self.retry, token, move || {
                with_timeout(
                    deadline,
                    client.upload_part(upload_id, part, total_parts, bytes.to_vec()),
                )
            })
            .await?;

            sent += len as u64;
            self.tracker
                .advance_progress(job.item.id, sent, size, Direction::Upload);
        }

        let uploaded = UploadedFile {
            upload_id,
            parts: total_parts,
            size,
            file_name: job.output_filename.clone(),
        };
        let uploaded = &uploaded;
        let caption = job.caption.as_str();
        let kind = job.item.kind;
        let mime_type = job.item.mime_type.as_deref();

        with_retry(&self.retry, token, move || {
            with_timeout(
                deadline,
                client.send_media(SendMedia {
                    destination,
                    file: uploaded,
                    caption,
                    thumbnail,
                    kind,
                    mime_type,
                }),
            )
        })
        .await
    }
}

/// Fill `buf` from `file`, stopping early only at end of file
async fn read_part(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
