//! # Watch Manager
//!
//! Owns one OS watcher per registered directory, the shared bounded queue
//! and the worker pool draining it.
//!
//! ```text
//! notify thread ──try_send──▶ queue (1024) ──▶ worker 1..N ──▶ DropPipeline
//! ```
//!
//! Shutdown closes every watcher, closes the queue, lets in-flight workers
//! finish and clears the registration map.

use core_runtime::events::{CoreEvent, EventBus, WatchEvent};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, WatchError};
use crate::pipeline::DropPipeline;
use crate::queue::{self, QueueWriter, QUEUE_CAPACITY};

/// Worker count matching the number of CPU cores.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Paths currently being processed, so a burst of events for one file
/// yields a single run.
#[derive(Default)]
struct InFlight(Mutex<HashSet<PathBuf>>);

impl InFlight {
    fn claim(self: &Arc<Self>, path: &Path) -> Option<InFlightGuard> {
        let mut set = self.0.lock().ok()?;
        if !set.insert(path.to_path_buf()) {
            return None;
        }
        Some(InFlightGuard {
            owner: Arc::clone(self),
            path: path.to_path_buf(),
        })
    }
}

struct InFlightGuard {
    owner: Arc<InFlight>,
    path: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.owner.0.lock() {
            set.remove(&self.path);
        }
    }
}

pub struct WatchManager {
    watchers: Mutex<HashMap<PathBuf, RecommendedWatcher>>,
    writer: Mutex<Option<QueueWriter>>,
    workers: Mutex<JoinSet<()>>,
    stop: CancellationToken,
    events: Option<EventBus>,
}

impl WatchManager {
    /// Start `workers` workers draining a queue of [`QUEUE_CAPACITY`].
    ///
    /// `cancel` is handed to the pipeline and stops running decryptions.
    pub fn start(
        pipeline: Arc<DropPipeline>,
        workers: usize,
        events: Option<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_capacity(pipeline, workers, QUEUE_CAPACITY, events, cancel)
    }

    pub fn with_capacity(
        pipeline: Arc<DropPipeline>,
        workers: usize,
        capacity: usize,
        events: Option<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        let (writer, rx) = queue::channel(capacity, events.clone());
        let rx = Arc::new(AsyncMutex::new(rx));
        let in_flight = Arc::new(InFlight::default());
        let stop = CancellationToken::new();

        let mut set = JoinSet::new();
        for id in 0..workers.max(1) {
            set.spawn(worker_loop(
                id,
                Arc::clone(&rx),
                Arc::clone(&pipeline),
                Arc::clone(&in_flight),
                events.clone(),
                stop.clone(),
                cancel.clone(),
            ));
        }
        info!(workers = workers.max(1), capacity, "Watch workers started");

        Self {
            watchers: Mutex::new(HashMap::new()),
            writer: Mutex::new(Some(writer)),
            workers: Mutex::new(set),
            stop,
            events,
        }
    }

    /// Watch `dir`. Returns `false` when it was already registered.
    pub fn register(&self, dir: impl AsRef<Path>) -> Result<bool> {
        let dir = dir.as_ref().to_path_buf();
        let writer = self
            .writer
            .lock()
            .map_err(|e| WatchError::watcher(&dir, e))?
            .clone()
            .ok_or(WatchError::ShutDown)?;

        let mut watchers = self
            .watchers
            .lock()
            .map_err(|e| WatchError::watcher(&dir, e))?;
        if watchers.contains_key(&dir) {
            debug!(dir = %dir.display(), "Directory already watched");
            return Ok(false);
        }

        let callback_dir = dir.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => writer.offer_event(&event),
                Err(e) => warn!(dir = %callback_dir.display(), error = %e, "Watcher error"),
            }
        })
        .map_err(|e| WatchError::watcher(&dir, e))?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::watcher(&dir, e))?;

        watchers.insert(dir.clone(), watcher);
        info!(dir = %dir.display(), "Directory registered");
        self.emit(WatchEvent::Registered {
            dir: dir.display().to_string(),
        });
        Ok(true)
    }

    pub fn registered(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self
            .watchers
            .lock()
            .map(|w| w.keys().cloned().collect())
            .unwrap_or_default();
        dirs.sort();
        dirs
    }

    /// Queue `path` as if a watcher had reported it.
    pub fn enqueue(&self, path: impl Into<PathBuf>) -> queue::Offer {
        match self.writer.lock().ok().and_then(|w| w.clone()) {
            Some(writer) => writer.offer(path.into()),
            None => queue::Offer::Closed,
        }
    }

    /// Depth of the queue, or 0 once shut down.
    pub fn capacity(&self) -> usize {
        self.writer
            .lock()
            .ok()
            .and_then(|w| w.as_ref().map(QueueWriter::capacity))
            .unwrap_or(0)
    }

    pub async fn shutdown(&self) {
        let watchers: Vec<RecommendedWatcher> = self
            .watchers
            .lock()
            .map(|mut w| w.drain().map(|(_, watcher)| watcher).collect())
            .unwrap_or_default();
        drop(watchers);

        if let Ok(mut writer) = self.writer.lock() {
            writer.take();
        }
        self.stop.cancel();

        let mut workers = match self.workers.lock() {
            Ok(mut set) => std::mem::take(&mut *set),
            Err(_) => return,
        };
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Watch worker panicked");
            }
        }
        info!("Watch manager stopped");
    }

    fn emit(&self, event: WatchEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Watch(event));
        }
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<AsyncMutex<mpsc::Receiver<PathBuf>>>,
    pipeline: Arc<DropPipeline>,
    in_flight: Arc<InFlight>,
    events: Option<EventBus>,
    stop: CancellationToken,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = stop.cancelled() => None,
            path = async { rx.lock().await.recv().await } => path,
        };
        let Some(path) = next else { break };

        let Some(_guard) = in_flight.claim(&path) else {
            debug!(worker = id, path = %path.display(), "Already in flight");
            continue;
        };

        let event = match pipeline.process(&path, cancel.clone()).await {
            Ok(Some(_)) => Some(WatchEvent::Filed {
                path: path.display().to_string(),
            }),
            Ok(None) => None,
            Err(e) => {
                error!(worker = id, path = %path.display(), error = %e, "Dropped file failed");
                Some(WatchEvent::Failed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        if let (Some(bus), Some(event)) = (&events, event) {
            let _ = bus.emit(CoreEvent::Watch(event));
        }
    }
    debug!(worker = id, "Watch worker exiting");
}
