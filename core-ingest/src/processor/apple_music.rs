//! Apple Music via `gamdl`.

use async_trait::async_trait;
use bridge_traits::process::CommandSpec;
use core_link::LinkType;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{find_files, latest_by_mtime, run_tool, Artifact, Processor, ProcessorContext};
use crate::error::{IngestError, Result};
use crate::progress::ProgressSink;
use crate::session::Session;

const DECRYPTED_EXTS: &[&str] = &["m4a", "mp4", "alac", "aac"];

/// Runs gamdl with flat folder templates so every track lands directly in
/// `<session>/AppleMusic/<title>.<ext>`.
pub struct AppleMusicProcessor {
    ctx: ProcessorContext,
    session: Session,
    artifacts: Vec<Artifact>,
}

impl AppleMusicProcessor {
    pub fn new(ctx: ProcessorContext, session: Session) -> Self {
        Self {
            ctx,
            session,
            artifacts: Vec::new(),
        }
    }
}

#[async_trait]
impl Processor for AppleMusicProcessor {
    fn name(&self) -> LinkType {
        LinkType::AppleMusic
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn build_command(&self, url: &str) -> Result<CommandSpec> {
        let cookies = self.ctx.cookie_path.to_string_lossy().into_owned();
        let temp = self.session.dir().to_string_lossy().into_owned();

        Ok(CommandSpec::new(&self.ctx.tools.gamdl).args([
            "--cookies-path",
            cookies.as_str(),
            "--download-mode",
            "nm3u8dlre",
            "--output-path",
            temp.as_str(),
            "--temp-path",
            temp.as_str(),
            "--album-folder-template",
            "AppleMusic",
            "--compilation-folder-template",
            "AppleMusic",
            "--no-album-folder-template",
            "AppleMusic",
            "--single-disc-file-template",
            "{title}",
            "--multi-disc-file-template",
            "{title}",
            "--no-synced-lyrics",
            url,
        ]))
    }

    async fn download(
        &self,
        url: &str,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<()> {
        let spec = self.build_command(url)?.timeout(self.ctx.download_timeout);
        run_tool(self.ctx.runner.as_ref(), spec, sink, cancel).await
    }

    /// Only the newest file counts; anything older is a leftover.
    async fn before_tidy(&mut self) -> Result<()> {
        let files = find_files(self.session.dir(), DECRYPTED_EXTS);
        if files.len() > 1 {
            warn!(count = files.len(), "Several tracks in session, keeping the newest");
        }
        let Some(latest) = latest_by_mtime(&files) else {
            debug!(dir = %self.session.dir().display(), "No tracks found");
            return Ok(());
        };

        let record = self
            .ctx
            .tags
            .prepare(&latest, self.ctx.filing_mode)
            .await
            .map_err(|e| IngestError::TagReadFailed(format!("{}: {}", latest.display(), e)))?;
        self.artifacts = vec![Artifact::Track(record)];
        Ok(())
    }

    fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    fn decrypted_exts(&self) -> &'static [&'static str] {
        DECRYPTED_EXTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::tests::{context, silent_wav, MockRunner};
    use core_metadata::DEFAULT_YEAR;
    use std::time::{Duration, SystemTime};

    fn processor(temp: &std::path::Path) -> AppleMusicProcessor {
        let ctx = context(MockRunner::new(), temp);
        let session = Session::create(temp, LinkType::AppleMusic, ctx.clock.as_ref()).unwrap();
        AppleMusicProcessor::new(ctx, session)
    }

    #[test]
    fn test_build_command_argv() {
        let temp = tempfile::tempdir().unwrap();
        let processor = processor(temp.path());
        let dir = processor.session().dir().to_string_lossy().into_owned();
        let url = "https://music.apple.com/us/song/example-track/123456789";

        let argv = processor.build_command(url).unwrap().argv();
        let expected: Vec<String> = [
            "gamdl",
            "--cookies-path",
            "data/cookies/cookies.txt",
            "--download-mode",
            "nm3u8dlre",
            "--output-path",
            dir.as_str(),
            "--temp-path",
            dir.as_str(),
            "--album-folder-template",
            "AppleMusic",
            "--compilation-folder-template",
            "AppleMusic",
            "--no-album-folder-template",
            "AppleMusic",
            "--single-disc-file-template",
            "{title}",
            "--multi-disc-file-template",
            "{title}",
            "--no-synced-lyrics",
            url,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(argv, expected);
    }

    #[tokio::test]
    async fn test_before_tidy_keeps_latest_track() {
        let temp = tempfile::tempdir().unwrap();
        let mut processor = processor(temp.path());
        let out = processor.session().dir().join("AppleMusic");
        std::fs::create_dir_all(&out).unwrap();

        let stale = out.join("leftover.m4a");
        let fresh = out.join("example_track.m4a");
        std::fs::write(&stale, silent_wav()).unwrap();
        std::fs::write(&fresh, silent_wav()).unwrap();
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(600))
            .unwrap();

        processor.before_tidy().await.unwrap();
        let artifacts = processor.artifacts();
        assert_eq!(artifacts.len(), 1);
        match &artifacts[0] {
            Artifact::Track(track) => {
                assert_eq!(track.path, fresh);
                assert_eq!(track.title, "example_track");
                assert_eq!(track.year, Some(DEFAULT_YEAR));
            }
            other => panic!("unexpected artifact {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_before_tidy_empty_session() {
        let temp = tempfile::tempdir().unwrap();
        let mut processor = processor(temp.path());
        processor.before_tidy().await.unwrap();
        assert!(processor.artifacts().is_empty());
        assert!(!processor.needs_drm_removal());
    }

    #[tokio::test]
    async fn test_before_tidy_unreadable_track() {
        let temp = tempfile::tempdir().unwrap();
        let mut processor = processor(temp.path());
        std::fs::write(processor.session().dir().join("broken.m4a"), b"not audio").unwrap();

        let err = processor.before_tidy().await.unwrap_err();
        assert!(matches!(err, IngestError::TagReadFailed(_)));
    }
}
