//! Controlled download directory for browser-triggered exports.

use crate::error::{BrowserError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Suffixes Chromium uses while a download is still being written
const PARTIAL_SUFFIXES: &[&str] = &[".crdownload", ".tmp", ".part"];

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A file produced by a browser download.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Private directory the browser is told to save downloads into.
///
/// Removed from disk when dropped.
#[derive(Debug)]
pub struct DownloadDir {
    dir: TempDir,
}

impl DownloadDir {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("shortwatch-dl-").tempdir()?;
        tracing::debug!(path = %dir.path().display(), "Created download directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Completed files currently present
    pub async fn snapshot(&self) -> Result<HashSet<PathBuf>> {
        let mut seen = HashSet::new();
        let mut entries = tokio::fs::read_dir(self.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_complete(&path) {
                seen.insert(path);
            }
        }
        Ok(seen)
    }

    /// Wait for a completed file not present in `before`.
    ///
    /// The file is returned once its size is stable across two polls.
    pub async fn wait_for_download(
        &self,
        before: &HashSet<PathBuf>,
        timeout: Duration,
    ) -> Result<DownloadedFile> {
        let deadline = Instant::now() + timeout;
        let mut candidate: Option<(PathBuf, u64)> = None;

        loop {
            let current = self.snapshot().await?;
            let mut fresh: Vec<_> = current.difference(before).cloned().collect();
            fresh.sort();

            if let Some(path) = fresh.into_iter().next() {
                let size = tokio::fs::metadata(&path).await?.len();
                match &candidate {
                    Some((prev, prev_size)) if *prev == path && *prev_size == size && size > 0 => {
                        let bytes = tokio::fs::read(&path).await?;
                        let file_name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        tracing::info!(file = %file_name, size = bytes.len(), "Download complete");
                        return Ok(DownloadedFile {
                            path,
                            file_name,
                            bytes,
                        });
                    }
                    _ => candidate = Some((path, size)),
                }
            }

            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "no download completed within {timeout:?}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn is_complete(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    !name.is_empty() && !PARTIAL_SUFFIXES.iter().any(|s| name.ends_with(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_files_ignored() {
        assert!(is_complete(Path::new("/tmp/export.csv")));
        assert!(!is_complete(Path::new("/tmp/export.csv.crdownload")));
        assert!(!is_complete(Path::new("/tmp/Unconfirmed 1234.TMP")));
    }

    #[tokio::test]
    async fn test_wait_for_download_picks_new_file() {
        let downloads = DownloadDir::new().expect("tempdir");
        tokio::fs::write(downloads.path().join("old.csv"), b"old")
            .await
            .expect("write");
        let before = downloads.snapshot().await.expect("snapshot");

        let dir = downloads.path().to_path_buf();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let partial = dir.join("positions.csv.crdownload");
            tokio::fs::write(&partial, b"a;b").await.expect("write");
            tokio::fs::rename(&partial, dir.join("positions.csv"))
                .await
                .expect("rename");
        });

        let file = downloads
            .wait_for_download(&before, Duration::from_secs(5))
            .await
            .expect("download");
        assert_eq!(file.file_name, "positions.csv");
        assert_eq!(file.bytes, b"a;b");
    }

    #[tokio::test]
    async fn test_wait_for_download_times_out() {
        let downloads = DownloadDir::new().expect("tempdir");
        let before = downloads.snapshot().await.expect("snapshot");
        let result = downloads
            .wait_for_download(&before, Duration::from_millis(300))
            .await;
        assert!(matches!(result, Err(BrowserError::Timeout(_))));
    }
}
