//! # Platform Processors
//!
//! A [`Processor`] owns one [`Session`] and knows how to fill it for a given
//! platform: which tool to run, which files in the session are results, and
//! whether they need DRM removal before filing.
//!
//! ## Lifecycle
//!
//! ```text
//! build_command → download → before_tidy → [remove_drm] → tidy
//! ```
//!
//! The orchestrator drives these calls in order and owns cleanup of the
//! session directory.

mod apple_music;
mod encrypted;
mod stub;
mod video;

pub use apple_music::AppleMusicProcessor;
pub use encrypted::EncryptedDropProcessor;
pub use stub::StubProcessor;
pub use video::VideoProcessor;

use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::process::{CommandRunner, CommandSpec};
use bridge_traits::time::Clock;
use core_filing::{FiledLocation, FilingEngine};
use core_link::LinkType;
use core_metadata::{TagEngine, TrackRecord, VideoRecord};
use core_runtime::config::{AppConfig, TidyMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{IngestError, Result};
use crate::progress::{tidy_tool_line, LineThrottle, ProgressSink};
use crate::session::Session;

/// A finished file waiting in the session directory.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Track(TrackRecord),
    Video(VideoRecord),
}

impl Artifact {
    pub fn path(&self) -> &Path {
        match self {
            Artifact::Track(track) => &track.path,
            Artifact::Video(video) => &video.path,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Artifact::Track(track) => &track.title,
            Artifact::Video(video) => &video.title,
        }
    }
}

/// An artifact together with where it was filed.
#[derive(Debug, Clone, PartialEq)]
pub struct FiledArtifact {
    pub artifact: Artifact,
    pub location: FiledLocation,
}

/// External tool executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub gamdl: String,
    pub ytdlp: String,
    pub decryptor: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            gamdl: "gamdl".to_string(),
            ytdlp: "yt-dlp".to_string(),
            decryptor: "um".to_string(),
        }
    }
}

/// Dependencies shared by every processor.
#[derive(Clone)]
pub struct ProcessorContext {
    pub runner: Arc<dyn CommandRunner>,
    pub tags: TagEngine,
    pub clock: Arc<dyn Clock>,
    pub tools: ToolPaths,
    pub cookie_path: PathBuf,
    pub proxy: Option<String>,
    pub temp_root: PathBuf,
    pub download_timeout: Duration,
    pub filing_mode: TidyMode,
}

impl ProcessorContext {
    pub fn from_config(
        config: &AppConfig,
        runner: Arc<dyn CommandRunner>,
        tags: TagEngine,
        clock: Arc<dyn Clock>,
    ) -> core_runtime::Result<Self> {
        let extra = &config.additional_config;
        Ok(Self {
            runner,
            tags,
            clock,
            tools: ToolPaths {
                gamdl: extra.gamdl.clone(),
                ytdlp: extra.ytdlp.clone(),
                decryptor: extra.decryptor.clone(),
            },
            cookie_path: config.cookie_path(),
            proxy: config.proxy_url(),
            temp_root: config.temp_root(),
            download_timeout: config.download_timeout(),
            filing_mode: config.tidy_mode()?,
        })
    }
}

/// Platform strategy for one ingest.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> LinkType;

    fn session(&self) -> &Session;

    /// Argv the processor runs for `url`. Pure.
    fn build_command(&self, url: &str) -> Result<CommandSpec>;

    /// Run the platform tool, streaming its output through `sink`.
    async fn download(
        &self,
        url: &str,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<()>;

    /// Collect the results of the download into records.
    async fn before_tidy(&mut self) -> Result<()>;

    /// Records collected by [`Processor::before_tidy`].
    fn artifacts(&self) -> &[Artifact];

    fn needs_drm_removal(&self) -> bool {
        false
    }

    async fn remove_drm(&mut self, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }

    /// Hand every artifact to the filing engine.
    async fn tidy(&mut self, filing: &FilingEngine) -> Result<Vec<FiledArtifact>> {
        let mut filed = Vec::with_capacity(self.artifacts().len());
        for artifact in self.artifacts() {
            let location = filing.file(artifact.path()).await?;
            filed.push(FiledArtifact {
                artifact: artifact.clone(),
                location,
            });
        }
        Ok(filed)
    }

    fn encrypted_exts(&self) -> &'static [&'static str] {
        &[]
    }

    fn decrypted_exts(&self) -> &'static [&'static str];
}

/// Builds the processor for a classified link.
pub trait ProcessorFactory: Send + Sync {
    fn create(&self, platform: LinkType, session: Session) -> Result<Box<dyn Processor>>;
}

/// Factory for the real platform processors.
#[derive(Clone)]
pub struct DefaultProcessorFactory {
    ctx: ProcessorContext,
}

impl DefaultProcessorFactory {
    pub fn new(ctx: ProcessorContext) -> Self {
        Self { ctx }
    }
}

impl ProcessorFactory for DefaultProcessorFactory {
    fn create(&self, platform: LinkType, session: Session) -> Result<Box<dyn Processor>> {
        let ctx = self.ctx.clone();
        match platform {
            LinkType::AppleMusic => Ok(Box::new(AppleMusicProcessor::new(ctx, session))),
            LinkType::NetEase | LinkType::QQMusic => {
                Ok(Box::new(EncryptedDropProcessor::new(platform, ctx, session)))
            }
            LinkType::Spotify | LinkType::SoundCloud | LinkType::YouTubeMusic => {
                Ok(Box::new(StubProcessor::new(platform, session)))
            }
            LinkType::Bilibili | LinkType::Douyin | LinkType::Xiaohongshu | LinkType::YouTube => {
                Ok(Box::new(VideoProcessor::new(platform, ctx, session)))
            }
            LinkType::Unknown => Err(IngestError::UnsupportedLink),
        }
    }
}

/// Run `spec`, forwarding at most one tool line per second to `sink`.
///
/// A non-zero exit becomes [`IngestError::DownloadFailed`] carrying the
/// output tail.
pub async fn run_tool(
    runner: &dyn CommandRunner,
    spec: CommandSpec,
    sink: &dyn ProgressSink,
    cancel: CancellationToken,
) -> Result<()> {
    let program = spec.program.clone();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    info!(command = %spec, "Running tool");
    let run = runner.run(spec, Some(tx), cancel);
    let forward = async {
        let mut throttle = LineThrottle::default();
        while let Some(line) = rx.recv().await {
            debug!(tool = %program, line = %line, "tool output");
            if let Some(line) = tidy_tool_line(&line) {
                if throttle.admit(Instant::now()) {
                    sink.send(line).await;
                }
            }
        }
    };

    let (result, ()) = tokio::join!(run, forward);
    let output = result.map_err(|e| match e {
        BridgeError::Cancelled => IngestError::Cancelled,
        BridgeError::TimedOut(secs) => IngestError::DownloadTimeout(secs),
        other => IngestError::download(format!("{}: {}", program, other)),
    })?;

    if output.success {
        Ok(())
    } else {
        let code = output
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        Err(IngestError::DownloadFailed {
            reason: format!("{} exited with {}", program, code),
            tail: output.tail,
        })
    }
}

pub(crate) fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|ext| exts.iter().any(|x| *x == ext))
}

/// Files under `dir` (recursively) whose extension is in `exts`, sorted by
/// path.
pub fn find_files(dir: &Path, exts: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_extension(path, exts))
        .collect();
    files.sort();
    files
}

/// Most recently modified file in `files`.
pub fn latest_by_mtime(files: &[PathBuf]) -> Option<PathBuf> {
    files
        .iter()
        .map(|path| {
            let modified = std::fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, path)| path.clone())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::process::CommandOutput;
    use bridge_traits::time::FixedClock;
    use chrono::{TimeZone, Utc};
    use mockall::mock;
    use tokio::sync::mpsc::UnboundedSender;

    mock! {
        pub Runner {}

        #[async_trait]
        impl CommandRunner for Runner {
            async fn run(
                &self,
                spec: CommandSpec,
                lines: Option<UnboundedSender<String>>,
                cancel: CancellationToken,
            ) -> BridgeResult<CommandOutput>;
        }
    }

    pub(crate) fn context(runner: MockRunner, temp_root: &Path) -> ProcessorContext {
        ProcessorContext {
            runner: Arc::new(runner),
            tags: TagEngine::new(),
            clock: Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap())),
            tools: ToolPaths::default(),
            cookie_path: PathBuf::from("data/cookies/cookies.txt"),
            proxy: None,
            temp_root: temp_root.to_path_buf(),
            download_timeout: Duration::from_secs(300),
            filing_mode: TidyMode::Local,
        }
    }

    pub(crate) fn exit(success: bool, tail: &str) -> CommandOutput {
        CommandOutput {
            exit_code: Some(if success { 0 } else { 1 }),
            success,
            tail: tail.to_string(),
        }
    }

    /// Silent 8 kHz mono 16-bit WAV, one second long.
    pub(crate) fn silent_wav() -> Vec<u8> {
        let samples = 8000u32;
        let data_len = samples * 2;
        let mut wav = Vec::with_capacity(44 + data_len as usize);
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&8000u32.to_le_bytes());
        wav.extend_from_slice(&16000u32.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.resize(44 + data_len as usize, 0);
        wav
    }

    #[tokio::test]
    async fn test_run_tool_throttles_lines() {
        let mut runner = MockRunner::new();
        runner.expect_run().returning(|_, lines, _| {
            let lines = lines.unwrap();
            for i in 0..50 {
                let _ = lines.send(format!("[download] {}%", i * 2));
            }
            Ok(exit(true, ""))
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = crate::progress::ChannelSink::new(tx);
        run_tool(&runner, CommandSpec::new("yt-dlp"), &sink, CancellationToken::new())
            .await
            .unwrap();
        drop(sink);

        let mut forwarded = Vec::new();
        while let Some(line) = rx.recv().await {
            forwarded.push(line);
        }
        assert_eq!(forwarded, vec!["[download] 0%".to_string()]);
    }

    #[tokio::test]
    async fn test_run_tool_maps_failures() {
        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .returning(|_, _, _| Ok(exit(false, "ERROR: Unsupported URL")));
        let err = run_tool(
            &runner,
            CommandSpec::new("yt-dlp"),
            &crate::progress::NoopSink,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        match err {
            IngestError::DownloadFailed { reason, tail } => {
                assert_eq!(reason, "yt-dlp exited with 1");
                assert_eq!(tail, "ERROR: Unsupported URL");
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .returning(|_, _, _| Err(BridgeError::TimedOut(300)));
        let err = run_tool(
            &runner,
            CommandSpec::new("gamdl"),
            &crate::progress::NoopSink,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::DownloadTimeout(300)));

        let mut runner = MockRunner::new();
        runner
            .expect_run()
            .returning(|_, _, _| Err(BridgeError::Cancelled));
        let err = run_tool(
            &runner,
            CommandSpec::new("gamdl"),
            &crate::progress::NoopSink,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, IngestError::Cancelled));
    }

    #[test]
    fn test_find_files_and_latest() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("AppleMusic")).unwrap();
        let old = temp.path().join("AppleMusic").join("old.m4a");
        let new = temp.path().join("AppleMusic").join("new.M4A");
        std::fs::write(&old, b"a").unwrap();
        std::fs::write(temp.path().join("cover.jpg"), b"c").unwrap();
        std::fs::write(&new, b"b").unwrap();

        let past = SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(&old)
            .unwrap()
            .set_modified(past)
            .unwrap();

        let files = find_files(temp.path(), &["m4a"]);
        assert_eq!(files.len(), 2);
        assert_eq!(latest_by_mtime(&files), Some(new));
        assert_eq!(latest_by_mtime(&[]), None);
    }
}
