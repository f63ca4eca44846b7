use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Type of mutation in the watch stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    Put,
    Delete,
}

/// A single watch event describing one store mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    pub seq: u64,
    pub event_type: EventType,
    pub key: String,
    /// Object bytes: the new value for puts, the last stored value for
    /// deletes, so subscribers can still resolve ownership of vanished
    /// objects.
    #[serde(default)]
    pub value: Option<Vec<u8>>,
}

/// Fan-out of store mutations to watch subscribers, with monotonic
/// sequence numbers. Slow subscribers lag and fall back to resync.
#[derive(Clone)]
pub struct EventLog {
    seq: Arc<AtomicU64>,
    sender: broadcast::Sender<WatchEvent>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            seq: Arc::new(AtomicU64::new(0)),
            sender,
        }
    }

    /// Record a new event. Called by the store on every mutation.
    pub fn emit(&self, event_type: EventType, key: String, value: Option<Vec<u8>>) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        // Ignore errors when no receivers are subscribed
        let _ = self.sender.send(WatchEvent {
            seq,
            event_type,
            key,
            value,
        });
    }

    /// Subscribe to receive new events as they are emitted.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }
}
