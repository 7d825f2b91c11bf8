//! Wire-format frames and event-name constants.
//!
//! Frames are JSON text messages keyed by event name; the event names are
//! the wire contract with the browser client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Client → Server frame
// ---------------------------------------------------------------------------

/// A frame received from the client over WebSocket.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

// ---------------------------------------------------------------------------
// Server → Client frame
// ---------------------------------------------------------------------------

/// A frame sent from the server to the client over WebSocket.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    pub event: String,
    pub data: Value,
    /// Unix milliseconds at dispatch time.
    pub ts: i64,
}

// ---------------------------------------------------------------------------
// auth_user payload
// ---------------------------------------------------------------------------

/// The `auth_user` payload: either a bare user-id string or `{uid, jwt}`.
///
/// The token is carried but not verified at this layer; see DESIGN.md.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AuthUserPayload {
    Bare(String),
    WithToken {
        uid: String,
        #[serde(default)]
        jwt: Option<String>,
    },
}

impl AuthUserPayload {
    pub fn uid(&self) -> &str {
        match self {
            AuthUserPayload::Bare(uid) => uid,
            AuthUserPayload::WithToken { uid, .. } => uid,
        }
    }
}

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

/// Event names carried on the wire.
pub struct EventName;

impl EventName {
    // Client → server.
    pub const AUTH_USER: &'static str = "auth_user";
    pub const JOIN_POST: &'static str = "join:post";
    pub const LEAVE_POST: &'static str = "leave:post";

    // Server → client.
    pub const POST_LIKE_UPDATE: &'static str = "post:like:update";
    pub const LIKE_UPDATE: &'static str = "like_update";
    pub const FOLLOW_UPDATE: &'static str = "follow_update";
    pub const DM_NEW: &'static str = "dm_new";
    pub const COMMENT_NEW: &'static str = "comment_new";
}
