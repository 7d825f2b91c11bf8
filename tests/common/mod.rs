use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use traderoom_gateway::config::Config;
use traderoom_gateway::AppState;

pub const TEST_SECRET: &str = "test-socket-secret";

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Start the gateway on an ephemeral port. Returns the bound address and the
/// shared state so tests can assert against the live registry.
#[allow(dead_code)]
pub async fn start_server() -> (SocketAddr, AppState) {
    let config = Config {
        socket_secret: TEST_SECRET.to_string(),
        allowed_origin: None,
        port: 0,
    };
    let state = AppState::new(config);
    let app = traderoom_gateway::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Connect a WebSocket client to the gateway.
#[allow(dead_code)]
pub async fn connect(addr: SocketAddr) -> WsClient {
    let url = format!("ws://{addr}/socket");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

/// Send a client frame (`{"event": ..., "data": ...}`).
#[allow(dead_code)]
pub async fn send_frame(ws: &mut WsClient, event: &str, data: serde_json::Value) {
    let frame = serde_json::json!({ "event": event, "data": data });
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// Read the next text frame, skipping transport-level ping/pong.
#[allow(dead_code)]
pub async fn recv_frame(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("parse frame");
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Assert that no text frame arrives within a short window.
#[allow(dead_code)]
pub async fn expect_silence(ws: &mut WsClient) {
    let result = time::timeout(Duration::from_millis(300), ws.next()).await;
    match result {
        Err(_) => {}
        Ok(Some(Ok(tungstenite::Message::Ping(_))))
        | Ok(Some(Ok(tungstenite::Message::Pong(_)))) => {}
        Ok(other) => panic!("expected silence, got: {other:?}"),
    }
}

/// Poll until `predicate` holds, or panic after ~2 seconds. Used to wait for
/// the server to process frames that have no acknowledgement.
#[allow(dead_code)]
pub async fn wait_until(description: &str, mut predicate: impl FnMut() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {description}");
}
