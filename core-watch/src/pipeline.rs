//! What a worker does with one dropped file.

use bridge_traits::time::Clock;
use core_filing::{is_encrypted, FiledLocation, FilingEngine, FilingError};
use core_ingest::janitor::DECRYPT_DIR;
use core_ingest::{claim_dir, Decryptor};
use core_metadata::info_json::thumbnail_for;
use core_metadata::TagEngine;
use core_runtime::config::TidyMode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, WatchError};

/// How long a file's size must stay unchanged before it is picked up.
pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_secs(1);
const MAX_SETTLE_POLLS: usize = 30;

/// Decrypt → tag → file, shared by every worker.
pub struct DropPipeline {
    decryptor: Decryptor,
    tags: TagEngine,
    filing: FilingEngine,
    clock: Arc<dyn Clock>,
    temp_root: PathBuf,
    settle_interval: Duration,
}

impl DropPipeline {
    pub fn new(
        decryptor: Decryptor,
        tags: TagEngine,
        filing: FilingEngine,
        clock: Arc<dyn Clock>,
        temp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            decryptor,
            tags,
            filing,
            clock,
            temp_root: temp_root.into(),
            settle_interval: DEFAULT_SETTLE_INTERVAL,
        }
    }

    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    fn mode(&self) -> TidyMode {
        self.filing.mode()
    }

    /// Handle one file. `Ok(None)` when the file vanished before it could be
    /// processed (already filed by an earlier event).
    #[instrument(skip(self, cancel), fields(path = %path.display()))]
    pub async fn process(
        &self,
        path: &Path,
        cancel: CancellationToken,
    ) -> Result<Option<FiledLocation>> {
        if !self.wait_until_settled(path).await {
            debug!("File gone before processing");
            return Ok(None);
        }

        if !is_encrypted(path) {
            return self.tidy(path, path).await.map(Some);
        }

        let scratch = self.claim_scratch()?;
        let result = self.decrypt_and_tidy(path, &scratch, cancel).await;
        match &result {
            Err(WatchError::Filing(FilingError::WebDav { .. })) => {
                warn!(dir = %scratch.display(), "Keeping decrypted file for retry");
            }
            _ => remove_scratch(&scratch).await,
        }
        result.map(Some)
    }

    async fn decrypt_and_tidy(
        &self,
        source: &Path,
        scratch: &Path,
        cancel: CancellationToken,
    ) -> Result<FiledLocation> {
        let decrypted = self
            .decryptor
            .decrypt(source, scratch, cancel)
            .await
            .map_err(|e| WatchError::Decrypt {
                path: source.to_path_buf(),
                cause: e.to_string(),
            })?;

        if let Err(e) = tokio::fs::remove_file(source).await {
            warn!(error = %e, "Failed to delete encrypted source");
        }
        self.tidy(&decrypted, source).await
    }

    /// Tag, cover and file `path`. `origin` is where the file was dropped; a
    /// sidecar there supplies the cover when `path` has none of its own.
    async fn tidy(&self, path: &Path, origin: &Path) -> Result<FiledLocation> {
        let mut record = self
            .tags
            .prepare(path, self.mode())
            .await
            .map_err(|e| WatchError::Tags {
                path: path.to_path_buf(),
                cause: e.to_string(),
            })?;
        if record.cover_url.is_none() && origin != path {
            record.cover_url = thumbnail_for(origin).await;
        }
        self.tags.embed_cover(&record).await;

        let location = self.filing.file(path).await?;
        info!(title = %record.title, location = %location, "Dropped file filed");
        Ok(location)
    }

    fn claim_scratch(&self) -> Result<PathBuf> {
        Ok(claim_dir(
            &self.temp_root.join(DECRYPT_DIR),
            &self.clock.compact_local_stamp(),
        )?)
    }

    /// Poll the file size until two reads agree. `false` if the file is gone.
    async fn wait_until_settled(&self, path: &Path) -> bool {
        let mut last = None;
        for _ in 0..MAX_SETTLE_POLLS {
            let size = match tokio::fs::metadata(path).await {
                Ok(meta) => meta.len(),
                Err(_) => return false,
            };
            if self.settle_interval.is_zero() || last == Some(size) {
                return true;
            }
            last = Some(size);
            tokio::time::sleep(self.settle_interval).await;
        }
        true
    }
}

async fn remove_scratch(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), error = %e, "Failed to remove decrypt scratch");
        }
    }
}
