//! NetEase Cloud Music and QQ Music.
//!
//! Neither platform is downloaded by URL: their clients leave encrypted
//! containers in a watched drop directory. From chat these processors report
//! the platform as in development; the DRM and tidy hooks serve files that
//! were placed into the session.

use async_trait::async_trait;
use bridge_traits::process::CommandSpec;
use core_link::LinkType;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{find_files, Artifact, Processor, ProcessorContext};
use crate::decrypt::Decryptor;
use crate::error::{IngestError, Result};
use crate::progress::ProgressSink;
use crate::session::Session;

const NETEASE_ENCRYPTED: &[&str] = &["ncm"];
const QQ_ENCRYPTED: &[&str] = &[
    "qmc0", "qmc2", "qmc3", "qmcflac", "qmcogg", "mflac", "mflac0", "mgg", "mgg1", "tkm",
    "bkcmp3", "bkcflac",
];
const DECRYPTED_EXTS: &[&str] = &["flac", "mp3", "ogg", "m4a", "wav"];

pub struct EncryptedDropProcessor {
    platform: LinkType,
    ctx: ProcessorContext,
    session: Session,
    decryptor: Decryptor,
    pending: Vec<PathBuf>,
    artifacts: Vec<Artifact>,
}

impl EncryptedDropProcessor {
    pub fn new(platform: LinkType, ctx: ProcessorContext, session: Session) -> Self {
        let decryptor = Decryptor::new(ctx.runner.clone(), &ctx.tools.decryptor);
        Self {
            platform,
            ctx,
            session,
            decryptor,
            pending: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    async fn prepare(&mut self, path: PathBuf) -> Result<()> {
        let record = self
            .ctx
            .tags
            .prepare(&path, self.ctx.filing_mode)
            .await
            .map_err(|e| IngestError::TagReadFailed(format!("{}: {}", path.display(), e)))?;
        self.artifacts.push(Artifact::Track(record));
        Ok(())
    }
}

#[async_trait]
impl Processor for EncryptedDropProcessor {
    fn name(&self) -> LinkType {
        self.platform
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn build_command(&self, _url: &str) -> Result<CommandSpec> {
        Err(IngestError::PlatformDeveloping(self.platform))
    }

    async fn download(
        &self,
        _url: &str,
        _sink: &dyn ProgressSink,
        _cancel: CancellationToken,
    ) -> Result<()> {
        Err(IngestError::PlatformDeveloping(self.platform))
    }

    /// Tag-ready files become artifacts, encrypted ones wait for
    /// [`Processor::remove_drm`].
    async fn before_tidy(&mut self) -> Result<()> {
        self.pending = find_files(self.session.dir(), self.encrypted_exts());
        for path in find_files(self.session.dir(), DECRYPTED_EXTS) {
            self.prepare(path).await?;
        }
        Ok(())
    }

    fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    fn needs_drm_removal(&self) -> bool {
        !self.pending.is_empty()
    }

    async fn remove_drm(&mut self, cancel: CancellationToken) -> Result<()> {
        let out_dir = self.session.dir().join("decrypted");
        for source in std::mem::take(&mut self.pending) {
            let decrypted = self
                .decryptor
                .decrypt(&source, &out_dir, cancel.clone())
                .await?;
            if let Err(e) = tokio::fs::remove_file(&source).await {
                warn!(path = %source.display(), error = %e, "Failed to remove encrypted source");
            }
            self.prepare(decrypted).await?;
        }
        Ok(())
    }

    fn encrypted_exts(&self) -> &'static [&'static str] {
        match self.platform {
            LinkType::QQMusic => QQ_ENCRYPTED,
            _ => NETEASE_ENCRYPTED,
        }
    }

    fn decrypted_exts(&self) -> &'static [&'static str] {
        DECRYPTED_EXTS
    }
}
