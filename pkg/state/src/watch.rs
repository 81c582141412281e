use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::broadcast;

/// Type of event in the watch stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Put,
    Delete,
}

/// A single state change, as seen by watchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    pub seq: u64,
    pub event_type: EventType,
    pub key: String,
    #[serde(default)]
    pub value: Option<Vec<u8>>,
}

/// Fan-out of store mutations with monotonic sequence numbers.
///
/// Subscribers that fall more than `capacity` events behind observe
/// `RecvError::Lagged` and must relist to recover.
#[derive(Clone)]
pub struct EventLog {
    seq: Arc<Mutex<u64>>,
    sender: broadcast::Sender<WatchEvent>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            seq: Arc::new(Mutex::new(0)),
            sender,
        }
    }

    /// Record a new event and fan it out to live subscribers.
    pub async fn emit(&self, event_type: EventType, key: String, value: Option<Vec<u8>>) {
        // Held across the send so subscribers see events in sequence order.
        let mut seq = self.seq.lock().await;
        *seq += 1;
        let event = WatchEvent {
            seq: *seq,
            event_type,
            key,
            value,
        };
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }
}
