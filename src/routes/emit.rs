//! HTTP emission ingress.
//!
//! The CRUD backend calls `POST /emit/{kind}` after a committed database
//! write to push the resulting event into the fan-out layer. The shared
//! secret is a coarse single-tenant trust mechanism: the payloads forwarded
//! here describe writes that already happened, they are not privileged
//! actions in themselves.

use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::gateway::events::EventName;
use crate::gateway::registry::room;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/emit/{kind}", post(emit_event))
}

/// Shared-secret guard for the ingress. Runs before the body is read, so a
/// bad secret is rejected with 401 before anything else happens.
pub struct IngressAuth;

impl FromRequestParts<AppState> for IngressAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get("x-socket-secret")
            .and_then(|v| v.to_str().ok());

        if provided == Some(state.config.socket_secret.as_str()) {
            Ok(IngressAuth)
        } else {
            tracing::warn!("ingress request rejected: bad or missing secret");
            Err(ApiError::unauthorized("Unauthorized"))
        }
    }
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LikePayload {
    post_id: String,
    like_count: i64,
    user_id: String,
    /// Post owner, when the like should also notify them directly.
    #[serde(default)]
    to_user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowPayload {
    to_user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DmPayload {
    to_user_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentPayload {
    post_id: String,
    #[serde(default)]
    to_user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /emit/{kind}
// ---------------------------------------------------------------------------

async fn emit_event(
    IngressAuth: IngressAuth,
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    match kind.as_str() {
        "like" => {
            let like: LikePayload = parse(&kind, &body)?;
            state.dispatcher.emit(
                &room::post(&like.post_id),
                EventName::POST_LIKE_UPDATE,
                serde_json::json!({
                    "postId": like.post_id,
                    "likeCount": like.like_count,
                    "userId": like.user_id,
                    "ts": chrono::Utc::now().timestamp_millis(),
                }),
            );
            if let Some(to) = &like.to_user_id {
                state
                    .dispatcher
                    .emit_to_user(to, EventName::LIKE_UPDATE, body);
            }
        }
        "follow" => {
            let follow: FollowPayload = parse(&kind, &body)?;
            state
                .dispatcher
                .emit_to_user(&follow.to_user_id, EventName::FOLLOW_UPDATE, body);
        }
        "dm" => {
            let dm: DmPayload = parse(&kind, &body)?;
            state
                .dispatcher
                .emit_to_user(&dm.to_user_id, EventName::DM_NEW, body);
        }
        "comment" => {
            let comment: CommentPayload = parse(&kind, &body)?;
            state.dispatcher.emit(
                &room::post(&comment.post_id),
                EventName::COMMENT_NEW,
                body.clone(),
            );
            if let Some(to) = &comment.to_user_id {
                state
                    .dispatcher
                    .emit_to_user(to, EventName::COMMENT_NEW, body);
            }
        }
        other => {
            return Err(ApiError::not_found(format!("Unknown event kind: {other}")));
        }
    }

    Ok((StatusCode::OK, Json(serde_json::json!({ "ok": true }))))
}

/// Validate the body against the kind's required shape, keeping the raw body
/// for verbatim forwarding.
fn parse<T: serde::de::DeserializeOwned>(kind: &str, body: &Value) -> Result<T, ApiError> {
    serde_json::from_value(body.clone())
        .map_err(|e| ApiError::bad_request(format!("Invalid {kind} payload: {e}")))
}
