//! # Pipeline Orchestrator
//!
//! Drives one ingest from free-form text to filed artifacts.
//!
//! ## State machine
//!
//! ```text
//! CLASSIFY     → Unknown                  → UnsupportedLink
//! DISPATCH     → stub processor            → PlatformDeveloping
//! DOWNLOAD     → non-zero exit / timeout   → DownloadFailed / DownloadTimeout
//! BEFORE_TIDY  → unreadable tags           → TagReadFailed
//! DRM_REMOVE   → decryptor failure         → DrmRemovalFailed
//! TIDY         → filing failure            → FilingFailedLocal / FilingFailedWebDav
//! REPORT
//! ```
//!
//! The progress sink receives a short message at every transition and the
//! throttled tool output during `DOWNLOAD`. Every terminal state removes the
//! session directory, except a WebDAV filing failure which leaves the
//! artifact in place for a retry.

use bridge_traits::time::Clock;
use core_filing::FilingEngine;
use core_link::{classify, ClassifiedLink};
use core_metadata::TagEngine;
use core_runtime::events::{CoreEvent, EventBus, IngestEvent};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IngestError, Result};
use crate::processor::{Artifact, FiledArtifact, Processor, ProcessorFactory};
use crate::progress::{stage, ProgressSink};
use crate::session::Session;

/// Outcome of a successful ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub link: ClassifiedLink,
    pub files: Vec<FiledArtifact>,
}

pub struct Orchestrator {
    factory: Arc<dyn ProcessorFactory>,
    filing: FilingEngine,
    tags: TagEngine,
    clock: Arc<dyn Clock>,
    temp_root: PathBuf,
    events: Option<EventBus>,
}

impl Orchestrator {
    pub fn new(
        factory: Arc<dyn ProcessorFactory>,
        filing: FilingEngine,
        tags: TagEngine,
        clock: Arc<dyn Clock>,
        temp_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            factory,
            filing,
            tags,
            clock,
            temp_root: temp_root.into(),
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn filing(&self) -> &FilingEngine {
        &self.filing
    }

    /// Run the full pipeline for the first link found in `text`.
    #[instrument(skip(self, sink, cancel))]
    pub async fn ingest(
        &self,
        text: &str,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        sink.send(stage::CLASSIFY.to_string()).await;
        let link = classify(text);
        if link.is_unknown() {
            info!("No supported link in message");
            self.emit(IngestEvent::Failed {
                url: String::new(),
                reason: IngestError::UnsupportedLink.kind().to_string(),
            });
            return Err(IngestError::UnsupportedLink);
        }

        let platform = link.link_type;
        let session = Session::create(&self.temp_root, platform, self.clock.as_ref())
            .map_err(|e| IngestError::download(format!("cannot create session directory: {}", e)))?;
        info!(url = %link.url, platform = %platform, dir = %session.dir().display(), "Ingest started");
        self.emit(IngestEvent::Started {
            url: link.url.clone(),
            platform: platform.to_string(),
        });

        let result = match self.factory.create(platform, session.clone()) {
            Ok(mut processor) => {
                self.drive(processor.as_mut(), &link.url, sink, cancel)
                    .await
            }
            Err(e) => Err(e),
        };

        match &result {
            Err(e) if e.keeps_session() => {
                warn!(dir = %session.dir().display(), error = %e, "Keeping session for retry");
            }
            _ => session.cleanup().await,
        }

        match result {
            Ok(files) => {
                info!(url = %link.url, files = files.len(), "Ingest completed");
                self.emit(IngestEvent::Completed {
                    url: link.url.clone(),
                    files: files.len(),
                });
                Ok(IngestReport { link, files })
            }
            Err(e) => {
                match &e {
                    IngestError::PlatformDeveloping(_) | IngestError::Cancelled => {
                        info!(url = %link.url, error = %e, "Ingest stopped")
                    }
                    _ => error!(url = %link.url, kind = e.kind(), error = %e, "Ingest failed"),
                }
                self.emit(IngestEvent::Failed {
                    url: link.url.clone(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        processor: &mut dyn Processor,
        url: &str,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<Vec<FiledArtifact>> {
        self.transition(url, stage::DOWNLOAD, sink, &cancel).await?;
        debug!(command = %processor.build_command(url)?, "Processor command");
        processor.download(url, sink, cancel.clone()).await?;

        self.transition(url, stage::DOWNLOADED, sink, &cancel).await?;
        processor.before_tidy().await?;

        if processor.needs_drm_removal() {
            self.transition(url, stage::DECRYPT, sink, &cancel).await?;
            processor.remove_drm(cancel.clone()).await?;
        }

        if processor.artifacts().is_empty() {
            return Err(IngestError::download(format!(
                "{} produced no files",
                processor.name()
            )));
        }

        self.transition(url, stage::FILE, sink, &cancel).await?;
        for artifact in processor.artifacts() {
            if let Artifact::Track(track) = artifact {
                self.tags.embed_cover(track).await;
            }
        }
        processor.tidy(&self.filing).await
    }

    async fn transition(
        &self,
        url: &str,
        stage: &str,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        debug!(url = %url, stage = %stage, "Stage");
        self.emit(IngestEvent::Stage {
            url: url.to_string(),
            stage: stage.to_string(),
        });
        sink.send(stage.to_string()).await;
        Ok(())
    }

    fn emit(&self, event: IngestEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Ingest(event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::tests::{context, exit, silent_wav, MockRunner};
    use crate::processor::DefaultProcessorFactory;
    use crate::progress::ChannelSink;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use core_link::LinkType;
    use core_metadata::artwork::CoverFetcher;
    use lofty::file::TaggedFileExt;
    use lofty::picture::PictureType;
    use lofty::probe::Probe;
    use mockall::mock;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    fn orchestrator(runner: MockRunner, temp_root: &std::path::Path, dist: &std::path::Path) -> Orchestrator {
        let ctx = context(runner, temp_root);
        let clock = Arc::clone(&ctx.clock);
        Orchestrator::new(
            Arc::new(DefaultProcessorFactory::new(ctx)),
            FilingEngine::local(dist),
            TagEngine::new(),
            clock,
            temp_root,
        )
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(line) = rx.try_recv() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_apple_music_local_happy_path() {
        let temp = tempfile::tempdir().unwrap();
        let dist = temp.path().join("library");
        let temp_root = temp.path().join("temp");

        let mut runner = MockRunner::new();
        runner.expect_run().times(1).returning(|spec, lines, _| {
            let output = spec
                .args
                .iter()
                .position(|a| a == "--output-path")
                .map(|i| PathBuf::from(&spec.args[i + 1]))
                .unwrap();
            std::fs::write(output.join("example_track.m4a"), silent_wav()).unwrap();
            if let Some(lines) = lines {
                let _ = lines.send("[download] 100%".to_string());
            }
            Ok(exit(true, ""))
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let orchestrator = orchestrator(runner, &temp_root, &dist).with_event_bus(bus);

        let report = orchestrator
            .ingest(
                "推荐 https://music.apple.com/us/song/example-track/123456789 试试",
                &sink,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.link.link_type, LinkType::AppleMusic);
        assert_eq!(report.files.len(), 1);
        assert!(dist.join("example_track.m4a").exists());

        let platform_root = temp_root.join("music").join("AppleMusic");
        assert_eq!(std::fs::read_dir(&platform_root).unwrap().count(), 0);

        let messages = drain(rx);
        assert_eq!(messages.first().map(String::as_str), Some(stage::CLASSIFY));
        assert!(messages.iter().any(|m| m == "[download] 100%"));
        assert_eq!(messages.last().map(String::as_str), Some(stage::FILE));

        let first = events.recv().await.unwrap();
        assert!(matches!(first, CoreEvent::Ingest(IngestEvent::Started { .. })));
    }

    #[tokio::test]
    async fn test_unsupported_link_creates_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let temp_root = temp.path().join("temp");
        let orchestrator = orchestrator(MockRunner::new(), &temp_root, temp.path());

        let err = orchestrator
            .ingest("https://example.com/foo", &crate::progress::NoopSink, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedLink));
        assert!(!temp_root.exists());
    }

    #[tokio::test]
    async fn test_stub_platform_is_developing() {
        let temp = tempfile::tempdir().unwrap();
        let temp_root = temp.path().join("temp");
        let orchestrator = orchestrator(MockRunner::new(), &temp_root, temp.path());

        let err = orchestrator
            .ingest(
                "https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC",
                &crate::progress::NoopSink,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::PlatformDeveloping(LinkType::Spotify)));

        let root = temp_root.join("music").join("Spotify");
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_zero_files_is_download_failure() {
        let temp = tempfile::tempdir().unwrap();
        let temp_root = temp.path().join("temp");
        let mut runner = MockRunner::new();
        runner.expect_run().returning(|_, _, _| Ok(exit(true, "")));
        let orchestrator = orchestrator(runner, &temp_root, temp.path());

        let err = orchestrator
            .ingest(
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                &crate::progress::NoopSink,
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::DownloadFailed { .. }));

        let root = temp_root.join("video").join("YouTube");
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_download() {
        let temp = tempfile::tempdir().unwrap();
        let temp_root = temp.path().join("temp");
        let orchestrator = orchestrator(MockRunner::new(), &temp_root, temp.path());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = orchestrator
            .ingest(
                "https://www.bilibili.com/video/BV1xx411c7mD",
                &crate::progress::NoopSink,
                cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Cancelled));
        let root = temp_root.join("video").join("Bilibili");
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    mock! {
        pub Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn upload_file(&self, request: HttpRequest, path: &std::path::Path) -> BridgeResult<HttpResponse>;
            async fn download_stream(&self, request: HttpRequest) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
        }
    }

    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52,
    ];

    #[tokio::test]
    async fn test_audio_download_is_filed_with_sidecar_cover() {
        let temp = tempfile::tempdir().unwrap();
        let dist = temp.path().join("library");
        let temp_root = temp.path().join("temp");

        let mut runner = MockRunner::new();
        runner.expect_run().times(1).returning(|spec, _, _| {
            let out = spec
                .args
                .iter()
                .position(|a| a == "--paths")
                .map(|i| PathBuf::from(&spec.args[i + 1]))
                .unwrap();
            std::fs::write(out.join("Night Drive.wav"), silent_wav()).unwrap();
            std::fs::write(
                out.join("Night Drive.info.json"),
                r#"{"title":"Night Drive","thumbnail":"https://i.ytimg.com/vi/abc/hq.png"}"#,
            )
            .unwrap();
            Ok(exit(true, ""))
        });

        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| req.url == "https://i.ytimg.com/vi/abc/hq.png")
            .times(1)
            .returning(|_| {
                Ok(HttpResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body: PNG.to_vec().into(),
                })
            });

        let ctx = context(runner, &temp_root);
        let clock = Arc::clone(&ctx.clock);
        let orchestrator = Orchestrator::new(
            Arc::new(DefaultProcessorFactory::new(ctx)),
            FilingEngine::local(&dist),
            TagEngine::new().with_cover_fetcher(CoverFetcher::new(Arc::new(http))),
            clock,
            &temp_root,
        );

        let report = orchestrator
            .ingest(
                "https://youtu.be/abc123",
                &crate::progress::NoopSink,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.files.len(), 1);
        let Artifact::Track(track) = &report.files[0].artifact else {
            panic!("expected a track");
        };
        assert_eq!(track.cover_url.as_deref(), Some("https://i.ytimg.com/vi/abc/hq.png"));

        let filed = dist.join("Night Drive.wav");
        let tagged = Probe::open(&filed).unwrap().guess_file_type().unwrap().read().unwrap();
        let tag = tagged.primary_tag().unwrap();
        assert_eq!(tag.pictures().len(), 1);
        assert_eq!(tag.pictures()[0].pic_type(), PictureType::CoverFront);
        assert_eq!(tag.pictures()[0].data(), PNG);
    }
}
