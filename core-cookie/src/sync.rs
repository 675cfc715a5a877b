//! Cookie sync: fetch → decrypt race → convert → atomic write.

use bridge_traits::http::HttpClient;
use core_runtime::config::AppConfig;
use core_runtime::events::{CookieSyncEvent, CoreEvent, EventBus};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::client::CookieCloudClient;
use crate::crypto::{decrypt, derive_password};
use crate::error::{CookieError, Result, SyncStage};
use crate::netscape::{self, CloudPayload};

/// How one candidate key fared in the race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// First to decrypt.
    Won,
    /// Decrypted after the race was already won.
    Lost,
    Failed,
    /// Stopped by the winner's cancellation.
    Cancelled,
}

/// Result of [`decrypt_race`].
#[derive(Debug)]
pub struct RaceResult {
    pub plaintext: Vec<u8>,
    /// Index of the winning key in the candidate list
    pub winner: usize,
    pub outcomes: Vec<AttemptOutcome>,
}

/// Outcome of a successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub path: PathBuf,
    pub cookies: usize,
    pub winning_key: usize,
}

fn try_key(encrypted: &str, password: &str) -> Result<Vec<u8>> {
    let plaintext = decrypt(encrypted, password)?;
    // Valid padding under a wrong key is possible; valid JSON is not.
    match serde_json::from_slice::<serde_json::Value>(&plaintext) {
        Ok(serde_json::Value::Object(_)) => Ok(plaintext),
        _ => Err(CookieError::Decrypt("plaintext is not a JSON object".to_string())),
    }
}

/// Try every candidate key concurrently; the first success wins and cancels
/// the remaining attempts.
pub async fn decrypt_race(uuid: &str, keys: &[String], encrypted: &str) -> Result<RaceResult> {
    if keys.is_empty() {
        return Err(CookieError::sync(SyncStage::Decrypt, "no candidate keys"));
    }

    let passwords: Vec<String> = keys.iter().map(|key| derive_password(uuid, key)).collect();
    let encrypted = encrypted.to_string();
    race(keys.len(), move |index| try_key(&encrypted, &passwords[index])).await
}

/// Run `attempt(0..count)` on the blocking pool. The first `Ok` is the winner;
/// attempts still running at that point observe the cancellation and stop
/// waiting on their work.
async fn race<F>(count: usize, attempt: F) -> Result<RaceResult>
where
    F: Fn(usize) -> Result<Vec<u8>> + Send + Sync + 'static,
{
    let cancel = CancellationToken::new();
    let (tx, rx) = oneshot::channel::<(usize, Vec<u8>)>();
    let winner_slot = Arc::new(Mutex::new(Some(tx)));
    let attempt = Arc::new(attempt);

    let mut attempts = JoinSet::new();
    for index in 0..count {
        let cancel = cancel.clone();
        let slot = Arc::clone(&winner_slot);
        let attempt = Arc::clone(&attempt);

        attempts.spawn(async move {
            if cancel.is_cancelled() {
                return (index, AttemptOutcome::Cancelled);
            }

            let work = tokio::task::spawn_blocking(move || attempt(index));
            let joined = tokio::select! {
                _ = cancel.cancelled() => return (index, AttemptOutcome::Cancelled),
                joined = work => joined,
            };

            match joined {
                Ok(Ok(plaintext)) => {
                    let sender = slot.lock().ok().and_then(|mut s| s.take());
                    match sender {
                        Some(tx) => {
                            let _ = tx.send((index, plaintext));
                            cancel.cancel();
                            (index, AttemptOutcome::Won)
                        }
                        None => (index, AttemptOutcome::Lost),
                    }
                }
                Ok(Err(e)) => {
                    debug!(key_index = index, error = %e, "Candidate key rejected");
                    (index, AttemptOutcome::Failed)
                }
                Err(e) => {
                    warn!(key_index = index, error = %e, "Decrypt task panicked");
                    (index, AttemptOutcome::Failed)
                }
            }
        });
    }

    // Only the attempts hold the sender now; when all of them finish without
    // a winner the receiver resolves to an error.
    drop(winner_slot);
    let won = rx.await;
    cancel.cancel();

    let mut outcomes = vec![AttemptOutcome::Cancelled; count];
    while let Some(joined) = attempts.join_next().await {
        if let Ok((index, outcome)) = joined {
            outcomes[index] = outcome;
        }
    }

    match won {
        Ok((winner, plaintext)) => Ok(RaceResult {
            plaintext,
            winner,
            outcomes,
        }),
        Err(_) => Err(CookieError::sync(
            SyncStage::Decrypt,
            format!("none of {} candidate keys decrypted the bundle", count),
        )),
    }
}

/// Replace `path` with `contents` without ever exposing a partial file.
///
/// The data goes to a temp file in the same directory, is fsynced with mode
/// 0600 and then renamed over the target.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> std::io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}

/// Pulls the CookieCloud bundle and refreshes the cookie file.
pub struct CookieSync {
    client: CookieCloudClient,
    keys: Vec<String>,
    output: PathBuf,
    events: Option<EventBus>,
}

impl CookieSync {
    pub fn new(client: CookieCloudClient, keys: Vec<String>, output: PathBuf) -> Self {
        Self {
            client,
            keys,
            output,
            events: None,
        }
    }

    pub fn from_config(config: &AppConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let cloud = &config.cookie_cloud;
        let client =
            CookieCloudClient::new(http_client, &cloud.cookiecloud_url, &cloud.cookiecloud_uuid);
        Self::new(client, cloud.cookiecloud_key.clone(), config.cookie_path())
    }

    /// Publish a [`CookieSyncEvent`] after every run.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Run one sync. On any error the existing cookie file is left as is.
    #[instrument(skip(self), fields(path = %self.output.display()))]
    pub async fn sync_once(&self) -> Result<SyncReport> {
        let result = self.run().await;

        match &result {
            Ok(report) => {
                info!(
                    cookies = report.cookies,
                    key_index = report.winning_key,
                    "Cookie file refreshed"
                );
                self.emit(CookieSyncEvent::Synced {
                    path: report.path.display().to_string(),
                    cookies: report.cookies,
                });
            }
            Err(e) => {
                if e.stage() == SyncStage::Fetch {
                    warn!(error = %e, "Cookie bundle unavailable, keeping previous file");
                } else {
                    error!(stage = %e.stage(), error = %e, "Cookie sync failed, keeping previous file");
                }
                self.emit(CookieSyncEvent::Failed {
                    stage: e.stage().to_string(),
                    reason: e.to_string(),
                });
            }
        }

        result
    }

    async fn run(&self) -> Result<SyncReport> {
        let encrypted = self.client.fetch_encrypted().await?;
        let race = decrypt_race(self.client.uuid(), &self.keys, &encrypted).await?;

        let payload: CloudPayload = serde_json::from_slice(&race.plaintext)
            .map_err(|e| CookieError::sync(SyncStage::Convert, e))?;
        let cookies = netscape::from_payload(&payload);
        if cookies.is_empty() {
            return Err(CookieError::sync(
                SyncStage::Convert,
                "bundle holds no usable cookies",
            ));
        }

        let text = netscape::render(&cookies);
        write_atomic(&self.output, text.into_bytes())
            .await
            .map_err(|e| CookieError::sync(SyncStage::Write, e))?;

        Ok(SyncReport {
            path: self.output.clone(),
            cookies: cookies.len(),
            winning_key: race.winner,
        })
    }

    fn emit(&self, event: CookieSyncEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::CookieSync(event));
        }
    }
}
