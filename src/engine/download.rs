//! Chunked download from the source into staging

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::TransferEngine;
use super::staging::{self, StagedMedia};
use crate::error::{Error, Result};
use crate::retry::{with_retry, with_timeout};
use crate::types::{Direction, MediaItem};

impl TransferEngine {
    /// Download `item` into a staging file
    ///
    /// Every chunk read runs under the chunk timeout and the retry policy, and
    /// cancellation is checked between chunks. A download that ends short of the
    /// size the source reported is an error.
    pub async fn download(
        &self,
        item: &MediaItem,
        token: &CancellationToken,
    ) -> Result<StagedMedia> {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (file, path) = staging::create(&self.config.staging_dir, item.id).await?;
        let mut file = tokio::io::BufWriter::new(file);

        let client = self.client.as_ref();
        let location = &item.source;
        let limit = self.config.chunk_size;
        let deadline = self.config.chunk_timeout;
        let mut offset: u64 = 0;

        tracing::info!(
            message_id = item.id.0,
            filename = %item.raw_filename,
            size = item.size,
            "Downloading media"
        );
        self.tracker
            .advance_progress(item.id, 0, item.size, Direction::Download);

        loop {
            if token.is_cancelled() {
                tracing::info!(message_id = item.id.0, offset = offset, "Download cancelled");
                return Err(Error::Cancelled);
            }

            let chunk = with_retry(&self.retry, token, move || {
                with_timeout(deadline, client.download_chunk(location, offset, limit))
            })
            .await?;

            let len = chunk.len();
            if len > 0 {
                file.write_all(&chunk).await?;
                offset += len as u64;
            }
            self.tracker.advance_progress(
                item.id,
                offset,
                item.size.max(offset),
                Direction::Download,
            );
            tracing::debug!(message_id = item.id.0, offset = offset, len = len, "Chunk downloaded");

            if len < limit || (item.size > 0 && offset >= item.size) {
                break;
            }
        }

        file.flush().await?;
        file.into_inner().sync_all().await?;

        if offset < item.size {
            return Err(Error::Transfer(format!(
                "incomplete download: got {} of {} bytes",
                offset, item.size
            )));
        }

        tracing::info!(message_id = item.id.0, bytes = offset, "Download complete");
        Ok(StagedMedia::new(path, offset))
    }
}
