//! Child Process Runner using Tokio
//!
//! Spawns each tool in its own process group so cancellation reaches
//! everything the tool forks (ffmpeg, N_m3u8DL-RE, aria2c, ...).

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    process::{CommandOutput, CommandRunner, CommandSpec, OutputTail},
};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::time::{sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest line forwarded before it is split.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// How long to wait for pipes to close after the leader exits.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

enum Outcome {
    Exited(ExitStatus),
    Cancelled,
    TimedOut(Duration),
}

/// Tokio-based [`CommandRunner`].
///
/// Cancellation and timeouts send SIGTERM to the process group, then SIGKILL
/// once the grace period expires.
#[derive(Debug, Clone)]
pub struct TokioCommandRunner {
    kill_grace: Duration,
}

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self {
            kill_grace: Duration::from_secs(3),
        }
    }

    /// Override the SIGTERM → SIGKILL grace period.
    pub fn with_kill_grace(kill_grace: Duration) -> Self {
        Self { kill_grace }
    }

    #[cfg(unix)]
    async fn terminate(&self, child: &mut Child) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pid) = child.id() else {
            return;
        };
        let group = Pid::from_raw(pid as i32);

        if let Err(e) = killpg(group, Signal::SIGTERM) {
            debug!(pid, error = %e, "SIGTERM to process group failed");
        }

        if timeout(self.kill_grace, child.wait()).await.is_err() {
            warn!(pid, "Process group ignored SIGTERM, sending SIGKILL");
            if let Err(e) = killpg(group, Signal::SIGKILL) {
                debug!(pid, error = %e, "SIGKILL to process group failed");
            }
            let _ = child.wait().await;
        }
    }

    #[cfg(not(unix))]
    async fn terminate(&self, child: &mut Child) {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read `reader` to EOF, sending each `\n`/`\r` delimited line.
///
/// Lines longer than [`MAX_LINE_BYTES`] are split so memory stays bounded.
async fn pump<R>(reader: R, tx: UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::with_capacity(8 * 1024, reader);
    let mut pending: Vec<u8> = Vec::new();

    let flush = |pending: &mut Vec<u8>, tx: &UnboundedSender<String>| {
        if !pending.is_empty() {
            let line = String::from_utf8_lossy(pending).trim_end().to_string();
            if !line.is_empty() {
                let _ = tx.send(line);
            }
            pending.clear();
        }
    };

    loop {
        let chunk = match reader.fill_buf().await {
            Ok([]) => break,
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "Output pipe read failed");
                break;
            }
        };

        let consumed = chunk.len();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                flush(&mut pending, &tx);
            } else {
                pending.push(byte);
                if pending.len() >= MAX_LINE_BYTES {
                    flush(&mut pending, &tx);
                }
            }
        }
        reader.consume(consumed);
    }

    flush(&mut pending, &tx);
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        spec: CommandSpec,
        lines: Option<UnboundedSender<String>>,
        cancel: CancellationToken,
    ) -> Result<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }

        #[cfg(unix)]
        cmd.process_group(0);

        debug!(command = %spec, "Spawning external tool");

        let mut child = cmd.spawn().map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to start {}: {}", spec.program, e))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::OperationFailed("No stdout pipe".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::OperationFailed("No stderr pipe".to_string()))?;

        let (merged_tx, mut merged_rx) = mpsc::unbounded_channel();
        let out_task = tokio::spawn(pump(stdout, merged_tx.clone()));
        let err_task = tokio::spawn(pump(stderr, merged_tx));

        let mut tail = OutputTail::new();
        let record = |line: String, tail: &mut OutputTail| {
            tail.push_line(&line);
            if let Some(tx) = &lines {
                let _ = tx.send(line);
            }
        };

        let deadline = spec.timeout.map(|t| Instant::now() + t);
        let expiry = async {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        let outcome = loop {
            tokio::select! {
                Some(line) = merged_rx.recv() => record(line, &mut tail),
                status = child.wait() => break Outcome::Exited(status?),
                _ = cancel.cancelled() => break Outcome::Cancelled,
                _ = &mut expiry => break Outcome::TimedOut(spec.timeout.unwrap_or_default()),
            }
        };

        match outcome {
            Outcome::Exited(status) => {
                let drain = async {
                    while let Some(line) = merged_rx.recv().await {
                        record(line, &mut tail);
                    }
                };
                if timeout(DRAIN_GRACE, drain).await.is_err() {
                    debug!(program = %spec.program, "Output pipes still open after exit");
                    out_task.abort();
                    err_task.abort();
                }

                info!(
                    program = %spec.program,
                    exit_code = ?status.code(),
                    "External tool finished"
                );

                Ok(CommandOutput {
                    exit_code: status.code(),
                    success: status.success(),
                    tail: tail.into_string(),
                })
            }
            Outcome::Cancelled => {
                info!(program = %spec.program, "Cancelling external tool");
                self.terminate(&mut child).await;
                out_task.abort();
                err_task.abort();
                Err(BridgeError::Cancelled)
            }
            Outcome::TimedOut(limit) => {
                warn!(
                    program = %spec.program,
                    timeout_secs = limit.as_secs(),
                    "External tool timed out"
                );
                self.terminate(&mut child).await;
                out_task.abort();
                err_task.abort();
                Err(BridgeError::TimedOut(limit.as_secs()))
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").args(["-c", script])
    }

    #[tokio::test]
    async fn test_merges_stdout_and_stderr() {
        let runner = TokioCommandRunner::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let output = runner
            .run(
                sh("echo out; echo err 1>&2"),
                Some(tx),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.exit_code, Some(0));

        let mut seen = Vec::new();
        while let Ok(line) = rx.try_recv() {
            seen.push(line);
        }
        seen.sort();
        assert_eq!(seen, vec!["err".to_string(), "out".to_string()]);
        assert!(output.tail.contains("out"));
        assert!(output.tail.contains("err"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_not_an_error() {
        let runner = TokioCommandRunner::new();
        let output = runner
            .run(sh("echo boom 1>&2; exit 3"), None, CancellationToken::new())
            .await
            .unwrap();

        assert!(!output.success);
        assert_eq!(output.exit_code, Some(3));
        assert_eq!(output.tail, "boom");
    }

    #[tokio::test]
    async fn test_cancellation_kills_group() {
        let runner = TokioCommandRunner::with_kill_grace(Duration::from_millis(200));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = runner.run(sh("sleep 30"), None, cancel).await;

        assert!(matches!(result, Err(BridgeError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = TokioCommandRunner::with_kill_grace(Duration::from_millis(200));
        let spec = sh("sleep 30").timeout(Duration::from_millis(100));

        let result = runner.run(spec, None, CancellationToken::new()).await;
        assert!(matches!(result, Err(BridgeError::TimedOut(_))));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = TokioCommandRunner::new();
        let result = runner
            .run(
                CommandSpec::new("definitely-not-a-real-tool-xyz"),
                None,
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }
}
