use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use study_core::Event;
use tokio::sync::mpsc;

/// A bounded channel carrying participant events to the log worker.
///
/// Uses `try_send` so emitters never wait on disk. If the channel is full or
/// the worker is gone, the event is dropped and counted.
pub struct EventBus {
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Returns the bus (for emitting events) and the receiver (for the worker)
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Non-blocking emit.
    pub fn emit(&self, event: Event) {
        if let Err(err) = self.tx.try_send(event) {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            let event = match &err {
                mpsc::error::TrySendError::Full(event) | mpsc::error::TrySendError::Closed(event) => event,
            };
            log::warn!(
                "[{}] Event bus rejected {} event ({} dropped so far)",
                event.participant_id,
                event.kind.as_str(),
                total
            );
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use study_core::EventKind;
    use tokio::time::{timeout, Duration};

    fn event(pid: &str) -> Event {
        Event::now(pid, EventKind::SessionStart, Map::new())
    }

    #[tokio::test]
    async fn emitted_event_reaches_receiver() {
        let (bus, mut rx) = EventBus::new(10);

        bus.emit(event("P1"));

        let received = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Should receive event")
            .expect("Event should exist");
        assert_eq!(received.participant_id, "P1");
    }

    #[test]
    fn full_bus_drops_and_counts() {
        let (bus, _rx) = EventBus::new(1);

        bus.emit(event("1"));
        bus.emit(event("2"));

        assert_eq!(bus.dropped_count(), 1);
    }

    #[test]
    fn closed_bus_drops_without_panicking() {
        let (bus, rx) = EventBus::new(4);
        drop(rx);

        bus.emit(event("P1"));

        assert!(bus.is_closed());
        assert_eq!(bus.dropped_count(), 1);
    }

    #[test]
    fn clones_share_dropped_counter() {
        let (bus1, _rx) = EventBus::new(1);
        let bus2 = bus1.clone();

        bus1.emit(event("1"));
        bus2.emit(event("2"));

        assert_eq!(bus1.dropped_count(), 1);
    }
}
