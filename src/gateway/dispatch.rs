//! Event dispatcher: the emit surface used by the HTTP ingress.
//!
//! Delivery is fire-and-forget. Members who are not connected when an event
//! is emitted simply never receive it; emitting to a room with no members is
//! a silent no-op, not an error.

use serde_json::Value;

use super::fanout::{EventBus, RoomEvent};
use super::registry::room;

/// Publishes room-targeted events onto the bus.
#[derive(Clone)]
pub struct Dispatcher {
    bus: EventBus,
}

impl Dispatcher {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Deliver `data` to every current member of `room_name`.
    pub fn emit(&self, room_name: &str, event_name: &str, data: Value) {
        tracing::debug!(room = %room_name, event = %event_name, "emit");
        self.bus.publish(RoomEvent {
            room: room_name.to_string(),
            event_name: event_name.to_string(),
            data,
            ts: chrono::Utc::now().timestamp_millis(),
        });
    }

    /// Deliver `data` to the user-scoped room for `uid`.
    pub fn emit_to_user(&self, uid: &str, event_name: &str, data: Value) {
        self.emit(&room::user(uid), event_name, data);
    }
}
