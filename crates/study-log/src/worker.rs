use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{info, warn};
use study_core::Event;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::store::EventLogger;

/// Totals reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub written: u64,
    pub failed: u64,
}

/// Consumes events from the [`EventBus`](crate::EventBus) and appends them to
/// the participant logs.
///
/// Write failures are logged and counted, never propagated back to the
/// emitter.
pub struct LogWorker {
    logger: Arc<EventLogger>,
    failed: Arc<AtomicU64>,
}

impl LogWorker {
    pub fn new(logger: Arc<EventLogger>) -> Self {
        Self {
            logger,
            failed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counter of failed writes, for health reporting while the worker runs.
    pub fn failure_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.failed)
    }

    /// Spawn the worker task. It runs until every bus handle is dropped and
    /// the queue is drained.
    pub fn spawn(self, mut receiver: mpsc::Receiver<Event>) -> JoinHandle<WorkerStats> {
        tokio::spawn(async move {
            info!("LogWorker started");
            let mut stats = WorkerStats::default();

            while let Some(event) = receiver.recv().await {
                match self.logger.append(&event).await {
                    Ok(()) => stats.written += 1,
                    Err(e) => {
                        stats.failed += 1;
                        self.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            "[{}] Failed to log {} event: {}",
                            event.participant_id,
                            event.kind.as_str(),
                            e
                        );
                    }
                }
            }

            info!(
                "LogWorker stopped ({} written, {} failed)",
                stats.written, stats.failed
            );
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use serde_json::Map;
    use study_core::{EventKind, LogStream};

    #[tokio::test]
    async fn drains_bus_into_logs() {
        let dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(EventLogger::new(dir.path().join("v"), dir.path().join("c")));
        logger.init().await.unwrap();

        let (bus, rx) = EventBus::new(16);
        let handle = LogWorker::new(Arc::clone(&logger)).spawn(rx);

        bus.emit(Event::now("P1", EventKind::SessionStart, Map::new()));
        bus.emit(Event::now("P1", EventKind::ChatUser, Map::new()));
        drop(bus);

        let stats = handle.await.unwrap();
        assert_eq!(stats, WorkerStats { written: 2, failed: 0 });

        let content =
            std::fs::read_to_string(logger.log_path(LogStream::Conversation, "P1")).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn write_failures_are_counted_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // init() is never called, so the directories do not exist
        let logger = Arc::new(EventLogger::new(dir.path().join("v"), dir.path().join("c")));

        let (bus, rx) = EventBus::new(16);
        let worker = LogWorker::new(logger);
        let failures = worker.failure_counter();
        let handle = worker.spawn(rx);

        bus.emit(Event::now("P1", EventKind::ChatUser, Map::new()));
        bus.emit(Event::url_visit("P1", "t", "http://x", "Q1", "ext"));
        drop(bus);

        let stats = handle.await.unwrap();
        assert_eq!(stats, WorkerStats { written: 0, failed: 2 });
        assert_eq!(failures.load(Ordering::Relaxed), 2);
    }
}
