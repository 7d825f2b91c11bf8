mod common;

use common::{connect, expect_silence, recv_frame, send_frame, start_server, wait_until};
use traderoom_gateway::gateway::registry::room;

// ---------------------------------------------------------------------------
// Identity binding (server side)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn auth_user_with_bare_string_binds_user_room() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    send_frame(&mut ws, "auth_user", serde_json::json!("u1")).await;

    let registry = state.registry.clone();
    wait_until("connection bound to user:u1", || {
        registry.members_of(&room::user("u1")).len() == 1
    })
    .await;
}

#[tokio::test]
async fn auth_user_with_uid_and_jwt_binds_user_room() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    send_frame(
        &mut ws,
        "auth_user",
        serde_json::json!({"uid": "u2", "jwt": "some.jwt.token"}),
    )
    .await;

    let registry = state.registry.clone();
    wait_until("connection bound to user:u2", || {
        registry.members_of(&room::user("u2")).len() == 1
    })
    .await;
}

#[tokio::test]
async fn rebind_replaces_user_room_membership() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    send_frame(&mut ws, "auth_user", serde_json::json!("u1")).await;
    let registry = state.registry.clone();
    wait_until("bound to u1", || {
        registry.members_of(&room::user("u1")).len() == 1
    })
    .await;

    send_frame(&mut ws, "auth_user", serde_json::json!("u2")).await;
    let registry = state.registry.clone();
    wait_until("rebound to u2", || {
        registry.members_of(&room::user("u2")).len() == 1
    })
    .await;

    assert!(state.registry.members_of(&room::user("u1")).is_empty());
}

#[tokio::test]
async fn malformed_frames_are_not_fatal() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    // Invalid JSON, then a structurally wrong auth payload: the connection
    // must survive both.
    use futures_util::SinkExt;
    ws.send(tokio_tungstenite::tungstenite::Message::Text(
        "not json at all".into(),
    ))
    .await
    .unwrap();
    send_frame(&mut ws, "auth_user", serde_json::json!(12345)).await;
    send_frame(&mut ws, "definitely_unknown", serde_json::json!({})).await;

    // Still works: join a post room and receive an event on it.
    send_frame(&mut ws, "join:post", serde_json::json!("42")).await;
    let registry = state.registry.clone();
    wait_until("joined post:42", || {
        registry.members_of(&room::post("42")).len() == 1
    })
    .await;

    state
        .dispatcher
        .emit(&room::post("42"), "comment_new", serde_json::json!({"c": 1}));

    let frame = recv_frame(&mut ws).await;
    assert_eq!(frame["event"], "comment_new");
    assert_eq!(frame["data"]["c"], 1);
}

// ---------------------------------------------------------------------------
// Room join/leave and fan-out
// ---------------------------------------------------------------------------

#[tokio::test]
async fn post_room_members_all_receive_the_same_event() {
    let (addr, state) = start_server().await;
    let mut ws_a = connect(addr).await;
    let mut ws_b = connect(addr).await;
    let mut ws_other = connect(addr).await;

    send_frame(&mut ws_a, "join:post", serde_json::json!("42")).await;
    send_frame(&mut ws_b, "join:post", serde_json::json!("42")).await;
    send_frame(&mut ws_other, "join:post", serde_json::json!("7")).await;

    let registry = state.registry.clone();
    wait_until("both members in post:42", || {
        registry.members_of(&room::post("42")).len() == 2
    })
    .await;
    let registry = state.registry.clone();
    wait_until("other member in post:7", || {
        registry.members_of(&room::post("7")).len() == 1
    })
    .await;

    state.dispatcher.emit(
        &room::post("42"),
        "post:like:update",
        serde_json::json!({"postId": "42", "likeCount": 3, "userId": "u9"}),
    );

    let frame_a = recv_frame(&mut ws_a).await;
    let frame_b = recv_frame(&mut ws_b).await;
    assert_eq!(frame_a, frame_b);
    assert_eq!(frame_a["event"], "post:like:update");
    assert_eq!(frame_a["data"]["likeCount"], 3);

    // The connection in a different room gets nothing.
    expect_silence(&mut ws_other).await;
}

#[tokio::test]
async fn leave_post_stops_delivery() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    send_frame(&mut ws, "join:post", serde_json::json!("42")).await;
    let registry = state.registry.clone();
    wait_until("joined post:42", || {
        registry.members_of(&room::post("42")).len() == 1
    })
    .await;

    send_frame(&mut ws, "leave:post", serde_json::json!("42")).await;
    let registry = state.registry.clone();
    wait_until("left post:42", || {
        registry.members_of(&room::post("42")).is_empty()
    })
    .await;

    state
        .dispatcher
        .emit(&room::post("42"), "comment_new", serde_json::json!({"c": 1}));
    expect_silence(&mut ws).await;
}

#[tokio::test]
async fn unbound_connection_still_receives_topic_events() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    // No auth_user at all — broadcast-only mode.
    send_frame(&mut ws, "join:post", serde_json::json!("42")).await;
    let registry = state.registry.clone();
    wait_until("joined post:42", || {
        registry.members_of(&room::post("42")).len() == 1
    })
    .await;

    state
        .dispatcher
        .emit(&room::post("42"), "comment_new", serde_json::json!({"c": 2}));

    let frame = recv_frame(&mut ws).await;
    assert_eq!(frame["event"], "comment_new");
}

#[tokio::test]
async fn user_scoped_event_reaches_only_the_bound_connection() {
    let (addr, state) = start_server().await;
    let mut ws_target = connect(addr).await;
    let mut ws_other = connect(addr).await;

    send_frame(&mut ws_target, "auth_user", serde_json::json!("u5")).await;
    send_frame(&mut ws_other, "auth_user", serde_json::json!("u6")).await;

    let registry = state.registry.clone();
    wait_until("both bound", || {
        registry.members_of(&room::user("u5")).len() == 1
            && registry.members_of(&room::user("u6")).len() == 1
    })
    .await;

    state
        .dispatcher
        .emit_to_user("u5", "dm_new", serde_json::json!({"body": "hello"}));

    let frame = recv_frame(&mut ws_target).await;
    assert_eq!(frame["event"], "dm_new");
    assert_eq!(frame["data"]["body"], "hello");
    assert!(frame["ts"].as_i64().is_some());

    expect_silence(&mut ws_other).await;
}

// ---------------------------------------------------------------------------
// Disconnect cleanup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disconnect_clears_every_room_membership() {
    let (addr, state) = start_server().await;
    let mut ws = connect(addr).await;

    send_frame(&mut ws, "join:post", serde_json::json!("1")).await;
    send_frame(&mut ws, "join:post", serde_json::json!("2")).await;
    send_frame(&mut ws, "auth_user", serde_json::json!("u1")).await;

    let registry = state.registry.clone();
    wait_until("all three rooms joined", || {
        registry.members_of(&room::post("1")).len() == 1
            && registry.members_of(&room::post("2")).len() == 1
            && registry.members_of(&room::user("u1")).len() == 1
    })
    .await;

    drop(ws);

    let registry = state.registry.clone();
    wait_until("connection removed", || registry.connection_count() == 0).await;
    assert!(state.registry.members_of(&room::post("1")).is_empty());
    assert!(state.registry.members_of(&room::post("2")).is_empty());
    assert!(state.registry.members_of(&room::user("u1")).is_empty());
    assert_eq!(state.registry.room_count(), 0);
}

#[tokio::test]
async fn emit_to_empty_room_is_a_noop_and_later_delivery_still_works() {
    let (addr, state) = start_server().await;

    // Nobody is watching: must not error or wedge the bus.
    state
        .dispatcher
        .emit(&room::post("99"), "comment_new", serde_json::json!({"c": 0}));

    let mut ws = connect(addr).await;
    send_frame(&mut ws, "join:post", serde_json::json!("99")).await;
    let registry = state.registry.clone();
    wait_until("joined post:99", || {
        registry.members_of(&room::post("99")).len() == 1
    })
    .await;

    state
        .dispatcher
        .emit(&room::post("99"), "comment_new", serde_json::json!({"c": 1}));

    let frame = recv_frame(&mut ws).await;
    assert_eq!(frame["data"]["c"], 1);
}
