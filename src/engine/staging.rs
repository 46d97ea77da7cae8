//! Transient local storage for media between download and upload

use std::path::Path;
use tempfile::TempPath;

use crate::error::Result;
use crate::types::MessageId;

/// A fully downloaded media file waiting for upload
///
/// The staging file is removed when this value is dropped, whichever way the
/// transfer ends.
#[derive(Debug)]
pub struct StagedMedia {
    path: TempPath,
    size: u64,
}

impl StagedMedia {
    pub(super) fn new(path: TempPath, size: u64) -> Self {
        Self { path, size }
    }

    /// Location of the staged bytes
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes staged
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the staging file now, logging instead of failing if that goes wrong
    pub fn release(self) {
        let shown = self.path.display().to_string();
        if let Err(e) = self.path.close() {
            tracing::warn!(path = %shown, error = %e, "Failed to remove staging file");
        }
    }
}

/// Create an empty staging file for message `id` inside `dir`
///
/// The directory is created if needed. The returned guard removes the file on drop.
pub(super) async fn create(dir: &Path, id: MessageId) -> Result<(tokio::fs::File, TempPath)> {
    tokio::fs::create_dir_all(dir).await?;

    let named = tempfile::Builder::new()
        .prefix(&format!("msg-{}-", id))
        .suffix(".part")
        .tempfile_in(dir)?;
    let (file, path) = named.into_parts();

    Ok((tokio::fs::File::from_std(file), path))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn staging_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut file, path) = create(&dir.path().join("nested"), MessageId(7)).await.unwrap();
        file.write_all(b"abc").await.unwrap();
        file.flush().await.unwrap();

        let staged = StagedMedia::new(path, 3);
        let on_disk = staged.path().to_path_buf();
        assert!(on_disk.exists());
        assert!(on_disk.file_name().unwrap().to_string_lossy().starts_with("msg-7-"));

        drop(staged);
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn release_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let (_file, path) = create(dir.path(), MessageId(1)).await.unwrap();
        let staged = StagedMedia::new(path, 0);
        let on_disk = staged.path().to_path_buf();

        staged.release();

        assert!(!on_disk.exists());
    }
}
