//! Watch-path processing with a scripted decryptor.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::process::{CommandOutput, CommandRunner, CommandSpec};
use bridge_traits::time::FixedClock;
use chrono::{TimeZone, Utc};
use core_filing::{FiledLocation, FilingEngine};
use core_ingest::Decryptor;
use core_metadata::artwork::CoverFetcher;
use core_metadata::TagEngine;
use core_runtime::events::{CoreEvent, EventBus, WatchEvent};
use core_watch::queue::QUEUE_CAPACITY;
use core_watch::{DropPipeline, WatchError, WatchManager};
use mockall::mock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

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

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn upload_file(&self, request: HttpRequest, path: &Path) -> BridgeResult<HttpResponse>;
        async fn download_stream(&self, request: HttpRequest) -> BridgeResult<Box<dyn tokio::io::AsyncRead + Send + Unpin>>;
    }
}

fn silent_wav() -> Vec<u8> {
    let data_len = 16000u32;
    let mut wav = Vec::new();
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

fn output(success: bool) -> CommandOutput {
    CommandOutput {
        exit_code: Some(if success { 0 } else { 1 }),
        success,
        tail: if success { String::new() } else { "unsupported file".to_string() },
    }
}

/// A decryptor that writes `<stem>.wav` into its `-o` directory.
fn decrypting_runner() -> MockRunner {
    let mut runner = MockRunner::new();
    runner.expect_run().returning(|spec, _, _| {
        assert_eq!(spec.program, "um");
        let input = PathBuf::from(&spec.args[1]);
        let out_dir = PathBuf::from(&spec.args[3]);
        assert_eq!(spec.args[4], "--overwrite");
        let stem = input.file_stem().unwrap().to_string_lossy().into_owned();
        std::fs::write(out_dir.join(format!("{}.wav", stem)), silent_wav()).unwrap();
        Ok(output(true))
    });
    runner
}

fn pipeline(runner: MockRunner, temp_root: &Path, dist: &Path) -> DropPipeline {
    let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()));
    DropPipeline::new(
        Decryptor::new(Arc::new(runner), "um"),
        TagEngine::new(),
        FilingEngine::local(dist),
        clock,
        temp_root,
    )
    .with_settle_interval(Duration::ZERO)
}

#[tokio::test]
async fn test_encrypted_drop_is_decrypted_and_filed() {
    let temp = tempfile::tempdir().unwrap();
    let watched = temp.path().join("watched");
    let dist = temp.path().join("dist");
    let temp_root = temp.path().join("temp");
    std::fs::create_dir_all(&watched).unwrap();
    let source = watched.join("foo.ncm");
    std::fs::write(&source, b"encrypted").unwrap();

    let pipeline = pipeline(decrypting_runner(), &temp_root, &dist);
    let location = pipeline
        .process(&source, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(location, Some(FiledLocation::Local(dist.join("foo.wav"))));
    assert!(!source.exists());
    assert!(dist.join("foo.wav").exists());
    assert_eq!(std::fs::read_dir(temp_root.join("um")).unwrap().count(), 0);
}

#[tokio::test]
async fn test_encrypted_drop_takes_cover_from_source_sidecar() {
    let temp = tempfile::tempdir().unwrap();
    let watched = temp.path().join("watched");
    let dist = temp.path().join("dist");
    std::fs::create_dir_all(&watched).unwrap();
    let source = watched.join("foo.ncm");
    std::fs::write(&source, b"encrypted").unwrap();
    std::fs::write(
        watched.join("foo.info.json"),
        r#"{"thumbnail": "https://p1.music.126.net/foo.jpg"}"#,
    )
    .unwrap();

    let mut http = MockHttp::new();
    http.expect_execute()
        .withf(|req| req.url == "https://p1.music.126.net/foo.jpg")
        .times(1)
        .returning(|_| {
            let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
            jpeg.resize(64, 0);
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: jpeg.into(),
            })
        });

    let clock = Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()));
    let pipeline = DropPipeline::new(
        Decryptor::new(Arc::new(decrypting_runner()), "um"),
        TagEngine::new().with_cover_fetcher(CoverFetcher::new(Arc::new(http))),
        FilingEngine::local(&dist),
        clock,
        temp.path().join("temp"),
    )
    .with_settle_interval(Duration::ZERO);

    let location = pipeline
        .process(&source, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(location, Some(FiledLocation::Local(dist.join("foo.wav"))));
}

#[tokio::test]
async fn test_decryptor_failure_keeps_source() {
    let temp = tempfile::tempdir().unwrap();
    let source = temp.path().join("bar.qmcflac");
    std::fs::write(&source, b"encrypted").unwrap();

    let mut runner = MockRunner::new();
    runner.expect_run().returning(|_, _, _| Ok(output(false)));
    let pipeline = pipeline(runner, &temp.path().join("temp"), &temp.path().join("dist"));

    let err = pipeline
        .process(&source, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WatchError::Decrypt { .. }));
    assert!(source.exists());
}

#[tokio::test]
async fn test_plain_drop_is_filed_in_place() {
    let temp = tempfile::tempdir().unwrap();
    let source = temp.path().join("plain.wav");
    std::fs::write(&source, silent_wav()).unwrap();
    let dist = temp.path().join("dist");

    // The decryptor must not run for unencrypted files.
    let pipeline = pipeline(MockRunner::new(), &temp.path().join("temp"), &dist);
    pipeline
        .process(&source, CancellationToken::new())
        .await
        .unwrap();
    assert!(dist.join("plain.wav").exists());
    assert!(!temp.path().join("temp").exists());
}

#[tokio::test]
async fn test_vanished_file_is_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let pipeline = pipeline(MockRunner::new(), temp.path(), temp.path());
    let result = pipeline
        .process(&temp.path().join("gone.ncm"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn test_manager_workers_file_queued_paths() {
    let temp = tempfile::tempdir().unwrap();
    let watched = temp.path().join("watched");
    let dist = temp.path().join("dist");
    std::fs::create_dir_all(&watched).unwrap();
    let source = watched.join("song.ncm");
    std::fs::write(&source, b"encrypted").unwrap();

    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let manager = WatchManager::start(
        Arc::new(pipeline(decrypting_runner(), &temp.path().join("temp"), &dist)),
        2,
        Some(bus),
        CancellationToken::new(),
    );

    assert!(manager.register(&watched).unwrap());
    assert!(!manager.register(&watched).unwrap());
    assert_eq!(manager.registered(), vec![watched.clone()]);

    manager.enqueue(source.clone());
    let filed = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let CoreEvent::Watch(WatchEvent::Filed { path }) = events.recv().await.unwrap() {
                return path;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(filed, source.display().to_string());
    assert!(dist.join("song.wav").exists());

    manager.shutdown().await;
    assert!(manager.registered().is_empty());
    assert!(matches!(manager.register(&watched), Err(WatchError::ShutDown)));
}

#[tokio::test]
async fn test_manager_queue_uses_shared_capacity() {
    let temp = tempfile::tempdir().unwrap();
    let manager = WatchManager::start(
        Arc::new(pipeline(MockRunner::new(), temp.path(), temp.path())),
        1,
        None,
        CancellationToken::new(),
    );
    assert_eq!(manager.capacity(), QUEUE_CAPACITY);

    manager.shutdown().await;
    assert_eq!(manager.capacity(), 0);
}
