//! In-memory room membership registry.
//!
//! Rooms exist implicitly: created on first join, garbage-collected when the
//! last member leaves. Nothing here is persisted; registry lifetime is the
//! process lifetime.

use std::collections::HashSet;

use dashmap::DashMap;

/// Room-name helpers. Room names are the only room representation.
pub mod room {
    /// The user-scoped room for direct, targeted notifications.
    pub fn user(uid: &str) -> String {
        format!("user:{uid}")
    }

    /// The topic-scoped room for everyone viewing a post.
    pub fn post(post_id: &str) -> String {
        format!("post:{post_id}")
    }

    pub fn is_user_room(name: &str) -> bool {
        name.starts_with("user:")
    }
}

/// Per-connection registry entry.
struct ConnEntry {
    /// Rooms this connection is currently a member of.
    rooms: HashSet<String>,
    /// User id once the connection is bound, `None` while unbound.
    user_id: Option<String>,
}

/// Shared registry of connections and their room memberships.
///
/// Uses `DashMap` for shard-level concurrency; all operations are synchronous
/// and safe under concurrent connection open/close.
pub struct RoomRegistry {
    rooms: DashMap<String, HashSet<String>>,
    connections: DashMap<String, ConnEntry>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            connections: DashMap::new(),
        }
    }

    /// Register a freshly opened connection in the unbound state.
    pub fn register(&self, conn_id: &str) {
        self.connections.insert(
            conn_id.to_string(),
            ConnEntry {
                rooms: HashSet::new(),
                user_id: None,
            },
        );
    }

    /// Add a connection to a room. Idempotent; unknown connections are ignored
    /// (the connection may have closed concurrently).
    pub fn join(&self, conn_id: &str, room: &str) {
        let Some(mut entry) = self.connections.get_mut(conn_id) else {
            return;
        };
        if entry.rooms.insert(room.to_string()) {
            self.rooms
                .entry(room.to_string())
                .or_default()
                .insert(conn_id.to_string());
        }
    }

    /// Remove a connection from a room. No-op if not a member.
    pub fn leave(&self, conn_id: &str, room: &str) {
        let Some(mut entry) = self.connections.get_mut(conn_id) else {
            return;
        };
        if entry.rooms.remove(room) {
            self.remove_member(room, conn_id);
        }
    }

    /// Bind a connection to a user identity, joining `user:<uid>`.
    ///
    /// A connection is a member of at most one user room: any previous user
    /// room is left first. Re-binding always replaces.
    pub fn bind_user(&self, conn_id: &str, uid: &str) {
        let Some(mut entry) = self.connections.get_mut(conn_id) else {
            return;
        };

        let new_room = room::user(uid);
        let old_rooms: Vec<String> = entry
            .rooms
            .iter()
            .filter(|r| room::is_user_room(r) && **r != new_room)
            .cloned()
            .collect();
        for old in old_rooms {
            entry.rooms.remove(&old);
            self.remove_member(&old, conn_id);
        }

        entry.user_id = Some(uid.to_string());
        if entry.rooms.insert(new_room.clone()) {
            self.rooms
                .entry(new_room)
                .or_default()
                .insert(conn_id.to_string());
        }
    }

    /// Remove a connection from every room and discard its identity binding.
    /// Idempotent: removing an unknown connection is a no-op.
    pub fn remove(&self, conn_id: &str) {
        let Some((_, entry)) = self.connections.remove(conn_id) else {
            return;
        };
        for room in &entry.rooms {
            self.remove_member(room, conn_id);
        }
    }

    /// Current members of a room; empty if the room doesn't exist.
    pub fn members_of(&self, room: &str) -> HashSet<String> {
        self.rooms
            .get(room)
            .map(|m| m.value().clone())
            .unwrap_or_default()
    }

    /// Rooms a connection currently belongs to; empty after disconnect.
    pub fn rooms_of(&self, conn_id: &str) -> HashSet<String> {
        self.connections
            .get(conn_id)
            .map(|e| e.rooms.clone())
            .unwrap_or_default()
    }

    /// Fast membership check used on the fan-out path.
    pub fn is_member(&self, conn_id: &str, room: &str) -> bool {
        self.connections
            .get(conn_id)
            .map(|e| e.rooms.contains(room))
            .unwrap_or(false)
    }

    /// The user id a connection is bound to, if any.
    pub fn user_of(&self, conn_id: &str) -> Option<String> {
        self.connections.get(conn_id).and_then(|e| e.user_id.clone())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Drop a member from a room's set, removing the room entry when empty.
    fn remove_member(&self, room: &str, conn_id: &str) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(conn_id);
            if members.is_empty() {
                drop(members);
                self.rooms.remove_if(room, |_, m| m.is_empty());
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
