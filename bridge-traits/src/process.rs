//! External Process Abstraction
//!
//! Every platform downloader and the decryptor run as child processes. The
//! [`CommandRunner`] trait hides how they are spawned so the pipeline can be
//! tested without the tools installed.
//!
//! ## Contract
//!
//! - stdout and stderr are merged and delivered line by line to the optional
//!   line channel
//! - the last [`TAIL_LIMIT`] characters of merged output are returned in
//!   [`CommandOutput::tail`]
//! - a non-zero exit is **not** an error; callers decide what it means
//! - cancellation and timeout terminate the whole process group and surface as
//!   [`BridgeError::Cancelled`](crate::error::BridgeError::Cancelled) and
//!   [`BridgeError::TimedOut`](crate::error::BridgeError::TimedOut)

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Maximum number of characters of tool output kept for error reporting.
pub const TAIL_LIMIT: usize = 400;

/// Description of a child process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full argv, program first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a child process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    /// Trailing output, at most [`TAIL_LIMIT`] characters
    pub tail: String,
}

/// Rolling buffer holding the last [`TAIL_LIMIT`] characters of output.
#[derive(Debug, Default, Clone)]
pub struct OutputTail {
    buf: String,
}

impl OutputTail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        if !self.buf.is_empty() {
            self.buf.push('\n');
        }
        self.buf.push_str(line);

        let len = self.buf.chars().count();
        if len > TAIL_LIMIT {
            let skip = len - TAIL_LIMIT;
            let cut = self
                .buf
                .char_indices()
                .nth(skip)
                .map(|(idx, _)| idx)
                .unwrap_or(0);
            self.buf.drain(..cut);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

/// Spawns external tools.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `spec` to completion.
    ///
    /// Each merged output line is sent to `lines` when provided. Dropped
    /// receivers are ignored.
    async fn run(
        &self,
        spec: CommandSpec,
        lines: Option<UnboundedSender<String>>,
        cancel: CancellationToken,
    ) -> Result<CommandOutput>;
}
