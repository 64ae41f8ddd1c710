#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use rpgsession::{app, db, session::protocol::ServerMessage, store::participants::Participant, AppState, Config};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream};

pub type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub async fn spawn_server() -> SocketAddr {
    let config = Config::ephemeral();
    let db_pool = db::connect(&config.database_url).await.unwrap();
    let listener = TcpListener::bind(config.bind_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app(AppState::new(db_pool, config))).await.unwrap();
    });
    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().unwrap()
}

pub async fn login(client: &reqwest::Client, addr: SocketAddr, body: Value) -> Participant {
    let response = client
        .post(format!("http://{addr}/api/login"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success(), "login failed: {}", response.status());
    let body: Value = response.json().await.unwrap();
    serde_json::from_value(body["user"].clone()).unwrap()
}

pub async fn login_master(addr: SocketAddr) -> Participant {
    login(&client(), addr, json!({"nickname": "GM", "masterCode": "master123"})).await
}

pub async fn login_player(addr: SocketAddr, nickname: &str, code: &str) -> Participant {
    login(&client(), addr, json!({"nickname": nickname, "characterId": code})).await
}

pub async fn ws_connect(addr: SocketAddr, participant_id: &str) -> Ws {
    let (ws, _response) = connect_async(format!("ws://{addr}/ws/{participant_id}")).await.unwrap();
    ws
}

pub async fn ws_send(ws: &mut Ws, frame: Value) {
    ws.send(WsMessage::Text(frame.to_string())).await.unwrap();
}

/// Next raw frame, or panic after [`TIMEOUT`].
pub async fn ws_next(ws: &mut Ws) -> WsMessage {
    tokio::time::timeout(TIMEOUT, ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("socket ended")
        .expect("socket error")
}

pub async fn ws_recv(ws: &mut Ws) -> ServerMessage {
    loop {
        match ws_next(ws).await {
            WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
            WsMessage::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// Skips frames until one matches.
pub async fn ws_expect<F>(ws: &mut Ws, mut predicate: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    loop {
        let frame = ws_recv(ws).await;
        if predicate(&frame) {
            return frame;
        }
    }
}

/// Reads until the server's close frame and returns its code.
pub async fn ws_expect_close(ws: &mut Ws) -> u16 {
    loop {
        if let WsMessage::Close(frame) = ws_next(ws).await {
            return frame.map(|frame| u16::from(frame.code)).unwrap_or(1005);
        }
    }
}

/// Drains the opening snapshots so later assertions see only new pushes.
pub async fn ws_drain_snapshots(ws: &mut Ws, is_master: bool) {
    let count = if is_master { 6 } else { 5 };
    for _ in 0..count {
        ws_recv(ws).await;
    }
}
