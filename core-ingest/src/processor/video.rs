//! Video platforms via `yt-dlp`.

use async_trait::async_trait;
use bridge_traits::process::CommandSpec;
use core_link::LinkType;
use core_metadata::info_json::{read_video_record, sidecar_for};
use core_metadata::VideoRecord;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{find_files, has_extension, run_tool, Artifact, Processor, ProcessorContext};
use crate::error::{IngestError, Result};
use crate::progress::ProgressSink;
use crate::session::Session;

/// Audio-only outputs, treated as tracks.
const AUDIO_EXTS: &[&str] = &["m4a", "mp3", "opus", "flac", "ogg", "wav"];

const MEDIA_EXTS: &[&str] = &[
    "mp4", "webm", "mkv", "mov", "flv", "m4a", "mp3", "opus", "flac", "ogg", "wav",
];

/// YouTube, Bilibili, Douyin and Xiaohongshu. Video metadata comes from the
/// `.info.json` sidecar. Audio-only results go through the tag engine, which
/// takes the sidecar thumbnail as the cover.
pub struct VideoProcessor {
    platform: LinkType,
    ctx: ProcessorContext,
    session: Session,
    artifacts: Vec<Artifact>,
}

impl VideoProcessor {
    pub fn new(platform: LinkType, ctx: ProcessorContext, session: Session) -> Self {
        Self {
            platform,
            ctx,
            session,
            artifacts: Vec::new(),
        }
    }

    async fn record_for(&self, video: &Path) -> Result<VideoRecord> {
        let sidecar = sidecar_for(video);
        match read_video_record(video, &sidecar, self.ctx.filing_mode).await {
            Ok(record) => Ok(record),
            Err(e) => {
                warn!(video = %video.display(), error = %e, "No usable info.json, using file name");
                let size = tokio::fs::metadata(video).await.map(|m| m.len()).unwrap_or(0);
                Ok(VideoRecord {
                    title: video
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    author: String::new(),
                    resolution: String::new(),
                    duration: 0,
                    cover_url: None,
                    size,
                    path: video.to_path_buf(),
                    filing_mode: self.ctx.filing_mode,
                })
            }
        }
    }
}

#[async_trait]
impl Processor for VideoProcessor {
    fn name(&self) -> LinkType {
        self.platform
    }

    fn session(&self) -> &Session {
        &self.session
    }

    fn build_command(&self, url: &str) -> Result<CommandSpec> {
        let mut spec = CommandSpec::new(&self.ctx.tools.ytdlp)
            .arg("--cookies")
            .arg(self.ctx.cookie_path.to_string_lossy())
            .args(["--no-playlist", "--write-info-json", "--paths"])
            .arg(self.session.dir().to_string_lossy())
            .args(["-o", "%(title)s.%(ext)s"]);
        if let Some(proxy) = &self.ctx.proxy {
            spec = spec.arg("--proxy").arg(proxy);
        }
        Ok(spec.arg(url))
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

    async fn before_tidy(&mut self) -> Result<()> {
        let mut artifacts = Vec::new();
        for media in find_files(self.session.dir(), MEDIA_EXTS) {
            if has_extension(&media, AUDIO_EXTS) {
                let track = self
                    .ctx
                    .tags
                    .prepare(&media, self.ctx.filing_mode)
                    .await
                    .map_err(|e| IngestError::TagReadFailed(format!("{}: {}", media.display(), e)))?;
                artifacts.push(Artifact::Track(track));
            } else {
                artifacts.push(Artifact::Video(self.record_for(&media).await?));
            }
        }
        self.artifacts = artifacts;
        Ok(())
    }

    fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    fn decrypted_exts(&self) -> &'static [&'static str] {
        MEDIA_EXTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::tests::{context, silent_wav, MockRunner};

    fn processor(temp: &Path, proxy: Option<&str>) -> VideoProcessor {
        let mut ctx = context(MockRunner::new(), temp);
        ctx.proxy = proxy.map(str::to_string);
        let session = Session::create(temp, LinkType::YouTube, ctx.clock.as_ref()).unwrap();
        VideoProcessor::new(LinkType::YouTube, ctx, session)
    }

    #[test]
    fn test_build_command() {
        let temp = tempfile::tempdir().unwrap();
        let processor = processor(temp.path(), None);
        let dir = processor.session().dir().to_string_lossy().into_owned();

        let argv = processor.build_command("https://youtu.be/abc").unwrap().argv();
        assert_eq!(
            argv,
            vec![
                "yt-dlp",
                "--cookies",
                "data/cookies/cookies.txt",
                "--no-playlist",
                "--write-info-json",
                "--paths",
                dir.as_str(),
                "-o",
                "%(title)s.%(ext)s",
                "https://youtu.be/abc",
            ]
        );
    }

    #[test]
    fn test_build_command_with_proxy() {
        let temp = tempfile::tempdir().unwrap();
        let processor = processor(temp.path(), Some("socks5://127.0.0.1:1080"));
        let argv = processor.build_command("https://youtu.be/abc").unwrap().argv();

        let n = argv.len();
        assert_eq!(argv[n - 3], "--proxy");
        assert_eq!(argv[n - 2], "socks5://127.0.0.1:1080");
        assert_eq!(argv[n - 1], "https://youtu.be/abc");
    }

    #[tokio::test]
    async fn test_before_tidy_reads_sidecars() {
        let temp = tempfile::tempdir().unwrap();
        let mut processor = processor(temp.path(), None);
        let dir = processor.session().dir().to_path_buf();

        std::fs::write(dir.join("Talk.mp4"), vec![0u8; 2048]).unwrap();
        std::fs::write(
            dir.join("Talk.info.json"),
            r#"{"title":"Talk","uploader":"Chan","width":1920,"height":1080,"duration":61.6}"#,
        )
        .unwrap();
        std::fs::write(dir.join("Bare.webm"), vec![0u8; 10]).unwrap();

        processor.before_tidy().await.unwrap();
        let artifacts = processor.artifacts();
        assert_eq!(artifacts.len(), 2);

        let Artifact::Video(bare) = &artifacts[0] else {
            panic!("expected video");
        };
        assert_eq!(bare.title, "Bare");
        assert_eq!(bare.size, 10);

        let Artifact::Video(talk) = &artifacts[1] else {
            panic!("expected video");
        };
        assert_eq!(talk.author, "Chan");
        assert_eq!(talk.resolution, "1920x1080");
        assert_eq!(talk.duration, 62);
        assert_eq!(talk.size, 2048);
    }

    #[tokio::test]
    async fn test_before_tidy_audio_becomes_track() {
        let temp = tempfile::tempdir().unwrap();
        let mut processor = processor(temp.path(), None);
        let dir = processor.session().dir().to_path_buf();

        std::fs::write(dir.join("Night Drive.wav"), silent_wav()).unwrap();
        std::fs::write(
            dir.join("Night Drive.info.json"),
            r#"{"title":"Night Drive","thumbnail":"https://i.ytimg.com/vi/abc/hq.jpg"}"#,
        )
        .unwrap();

        processor.before_tidy().await.unwrap();
        let [Artifact::Track(track)] = processor.artifacts() else {
            panic!("expected one track, got {:?}", processor.artifacts());
        };
        assert_eq!(track.title, "Night Drive");
        assert_eq!(
            track.cover_url.as_deref(),
            Some("https://i.ytimg.com/vi/abc/hq.jpg")
        );
    }
}
