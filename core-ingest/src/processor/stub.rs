//! Platforms without a downloader yet.

use async_trait::async_trait;
use bridge_traits::process::CommandSpec;
use core_link::LinkType;
use tokio_util::sync::CancellationToken;

use super::{Artifact, Processor};
use crate::error::{IngestError, Result};
use crate::progress::ProgressSink;
use crate::session::Session;

/// Answers every download with [`IngestError::PlatformDeveloping`].
pub struct StubProcessor {
    platform: LinkType,
    session: Session,
}

impl StubProcessor {
    pub fn new(platform: LinkType, session: Session) -> Self {
        Self { platform, session }
    }
}

#[async_trait]
impl Processor for StubProcessor {
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

    async fn before_tidy(&mut self) -> Result<()> {
        Ok(())
    }

    fn artifacts(&self) -> &[Artifact] {
        &[]
    }

    fn decrypted_exts(&self) -> &'static [&'static str] {
        &[]
    }
}
