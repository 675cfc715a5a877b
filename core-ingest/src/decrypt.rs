//! External decryptor (`um`) for platform DRM containers.

use bridge_traits::error::BridgeError;
use bridge_traits::process::{CommandRunner, CommandSpec};
use core_filing::is_media;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{IngestError, Result};

/// Default bound for a single decryption.
pub const DECRYPT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct Decryptor {
    runner: Arc<dyn CommandRunner>,
    program: String,
    timeout: Duration,
}

impl Decryptor {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout: DECRYPT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `um -i <file> -o <dir> --overwrite`
    pub fn build_command(&self, input: &Path, out_dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .arg("-i")
            .arg(input.to_string_lossy())
            .arg("-o")
            .arg(out_dir.to_string_lossy())
            .arg("--overwrite")
    }

    /// Decrypt `input` into `out_dir` and return the produced file.
    ///
    /// The encrypted source is left in place; deleting it is up to the caller.
    pub async fn decrypt(
        &self,
        input: &Path,
        out_dir: &Path,
        cancel: CancellationToken,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(out_dir)
            .await
            .map_err(|e| IngestError::DrmRemovalFailed(format!("{}: {}", out_dir.display(), e)))?;

        let spec = self.build_command(input, out_dir).timeout(self.timeout);
        debug!(command = %spec, "Running decryptor");

        let output = self
            .runner
            .run(spec, None, cancel)
            .await
            .map_err(|e| match e {
                BridgeError::Cancelled => IngestError::Cancelled,
                other => IngestError::DrmRemovalFailed(format!("{}: {}", self.program, other)),
            })?;

        if !output.success {
            return Err(IngestError::DrmRemovalFailed(format!(
                "{} failed on {}: {}",
                self.program,
                input.display(),
                output.tail
            )));
        }

        let decrypted = locate_output(out_dir, input)?;
        info!(input = %input.display(), output = %decrypted.display(), "Decrypted");
        Ok(decrypted)
    }
}

/// The playable file the decryptor wrote for `input`.
///
/// With several candidates, the one sharing `input`'s stem wins.
pub fn locate_output(out_dir: &Path, input: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(out_dir)
        .map_err(|e| IngestError::DrmRemovalFailed(format!("{}: {}", out_dir.display(), e)))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_media(path))
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Err(IngestError::DrmRemovalFailed(format!(
            "no decrypted file for {} in {}",
            input.display(),
            out_dir.display()
        ))),
        1 => Ok(candidates.remove(0)),
        _ => {
            let stem = input.file_stem();
            candidates
                .iter()
                .find(|path| path.file_stem() == stem)
                .cloned()
                .ok_or_else(|| {
                    IngestError::DrmRemovalFailed(format!(
                        "{} candidates in {} and none matches {}",
                        candidates.len(),
                        out_dir.display(),
                        input.display()
                    ))
                })
        }
    }
}
