//! Broadcast hub carrying room-targeted events to connection tasks.
//!
//! Uses a single `tokio::sync::broadcast` channel. Each connection task
//! subscribes once and filters events locally by its own room membership.
//! Per-room FIFO ordering falls out of the channel's per-receiver ordering.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel. Slow receivers that fall behind will
/// skip messages (RecvError::Lagged).
const BUS_CAPACITY: usize = 4096;

/// An event targeted at a single room.
#[derive(Debug, Clone)]
pub struct RoomEvent {
    /// The room this event is addressed to (e.g. `post:42`, `user:u1`).
    pub room: String,
    /// The wire event name (e.g. `post:like:update`).
    pub event_name: String,
    /// Event payload, forwarded to members as-is.
    pub data: Value,
    /// Unix milliseconds at dispatch time.
    pub ts: i64,
}

/// The process-wide event bus. Cloneable — store in AppState.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<RoomEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the bus. Each connection task should call this once.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<RoomEvent>> {
        self.sender.subscribe()
    }

    /// Publish an event. Fire-and-forget: send() returns Err when there are
    /// no receivers, which just means nobody is connected.
    pub fn publish(&self, event: RoomEvent) {
        let _ = self.sender.send(Arc::new(event));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
