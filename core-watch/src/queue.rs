//! Bounded hand-off between the OS watchers and the worker pool.
//!
//! Producers never block: when the queue is full the event is dropped. The
//! file shows up again on its next filesystem event.

use core_filing::{is_encrypted, is_media};
use core_runtime::events::{CoreEvent, EventBus, WatchEvent};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Depth of the shared queue across all registrations.
pub const QUEUE_CAPACITY: usize = 1024;

/// Result of offering a path to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    Dropped,
    Closed,
}

/// Producer half, cloned into every watcher callback.
#[derive(Clone)]
pub struct QueueWriter {
    tx: mpsc::Sender<PathBuf>,
    events: Option<EventBus>,
}

impl QueueWriter {
    pub fn offer(&self, path: PathBuf) -> Offer {
        match self.tx.try_send(path) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(path)) => {
                warn!(path = %path.display(), "Watch queue full, dropping event");
                if let Some(bus) = &self.events {
                    let _ = bus.emit(CoreEvent::Watch(WatchEvent::Dropped {
                        path: path.display().to_string(),
                    }));
                }
                Offer::Dropped
            }
            Err(TrySendError::Closed(path)) => {
                debug!(path = %path.display(), "Watch queue closed");
                Offer::Closed
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Queue every relevant path of a notify event.
    pub fn offer_event(&self, event: &Event) {
        for path in relevant_paths(event) {
            self.offer(path);
        }
    }
}

pub fn channel(
    capacity: usize,
    events: Option<EventBus>,
) -> (QueueWriter, mpsc::Receiver<PathBuf>) {
    let (tx, rx) = mpsc::channel(capacity);
    (QueueWriter { tx, events }, rx)
}

/// Whether a file is something the pipeline can handle.
pub fn is_candidate(path: &Path) -> bool {
    is_encrypted(path) || is_media(path)
}

/// Paths from CREATE, WRITE and RENAME events that point at candidate
/// files. For a two-sided rename only the new name counts.
pub fn relevant_paths(event: &Event) -> Vec<PathBuf> {
    let paths: &[PathBuf] = match event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => &event.paths,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => &event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => &event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.get(1).map(std::slice::from_ref).unwrap_or(&[])
        }
        _ => &[],
    };
    paths.iter().filter(|p| is_candidate(p)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_relevant_paths() {
        let created = event(EventKind::Create(CreateKind::File), &["/w/a.ncm"]);
        assert_eq!(relevant_paths(&created), vec![PathBuf::from("/w/a.ncm")]);

        let written = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/w/b.flac"],
        );
        assert_eq!(relevant_paths(&written).len(), 1);

        let renamed = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/w/c.part", "/w/c.mflac"],
        );
        assert_eq!(relevant_paths(&renamed), vec![PathBuf::from("/w/c.mflac")]);

        let removed = event(EventKind::Remove(RemoveKind::File), &["/w/d.ncm"]);
        assert!(relevant_paths(&removed).is_empty());

        let partial = event(EventKind::Create(CreateKind::File), &["/w/e.ncm.part"]);
        assert!(relevant_paths(&partial).is_empty());
    }

    #[test]
    fn test_shared_queue_holds_1024_then_drops() {
        assert_eq!(QUEUE_CAPACITY, 1024);
        let (writer, mut rx) = channel(QUEUE_CAPACITY, None);

        for i in 0..QUEUE_CAPACITY {
            assert_eq!(writer.offer(format!("/w/{}.ncm", i).into()), Offer::Queued);
        }
        assert_eq!(writer.offer("/w/overflow.ncm".into()), Offer::Dropped);

        let mut drained = 0;
        while let Ok(path) = rx.try_recv() {
            assert_ne!(path, PathBuf::from("/w/overflow.ncm"));
            drained += 1;
        }
        assert_eq!(drained, QUEUE_CAPACITY);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let (writer, mut rx) = channel(2, Some(bus));

        assert_eq!(writer.offer("/w/1.ncm".into()), Offer::Queued);
        assert_eq!(writer.offer("/w/2.ncm".into()), Offer::Queued);
        assert_eq!(writer.offer("/w/3.ncm".into()), Offer::Dropped);

        assert_eq!(rx.try_recv().unwrap(), PathBuf::from("/w/1.ncm"));
        assert_eq!(writer.offer("/w/4.ncm".into()), Offer::Queued);

        match events.try_recv().unwrap() {
            CoreEvent::Watch(WatchEvent::Dropped { path }) => assert_eq!(path, "/w/3.ncm"),
            other => panic!("unexpected {:?}", other),
        }

        drop(rx);
        assert_eq!(writer.offer("/w/5.ncm".into()), Offer::Closed);
    }
}
