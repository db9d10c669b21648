//! End-to-end relay tests over real WebSocket connections

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use console_relay::api::{AppState, RelayServer};
use console_relay::assets::DiskAssets;
use console_relay::config::ServerConfig;
use console_relay::template::HostTemplate;
use console_relay::RelayChannel;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestRelay {
    addr: SocketAddr,
    relay: Arc<RelayChannel>,
    _assets: TempDir,
    _shutdown: watch::Sender<bool>,
}

impl TestRelay {
    async fn start() -> Self {
        let assets = tempfile::tempdir().unwrap();
        let relay = Arc::new(RelayChannel::new(64));
        let state = AppState::new(
            Arc::clone(&relay),
            HostTemplate::new("ws://loggerhost/ws/viewer", "loggerhost"),
            Arc::new(DiskAssets::new(assets.path())),
            "127.0.0.1",
        );

        let server = RelayServer::new(
            ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec![],
            },
            state,
        );
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(server.serve(listener, shutdown_rx));

        Self {
            addr,
            relay,
            _assets: assets,
            _shutdown: shutdown,
        }
    }

    async fn connect(&self, path: &str) -> Socket {
        let (socket, _) = connect_async(format!("ws://{}{}", self.addr, path))
            .await
            .unwrap();
        socket
    }

    async fn viewer(&self) -> Socket {
        let before = self.relay.stats().viewers;
        let socket = self.connect("/ws/viewer").await;
        wait_until(|| self.relay.stats().viewers == before + 1).await;
        socket
    }

    async fn producer(&self, name: &str) -> Socket {
        let before = self.relay.stats().producers;
        let socket = self.connect(&format!("/ws/producer?name={}", name)).await;
        wait_until(|| self.relay.stats().producers == before + 1).await;
        socket
    }

    async fn send_and_wait(&self, producer: &mut Socket, frame: Value) {
        let before = self.relay.stats().last_sequence.unwrap_or(0);
        producer.send(Message::text(frame.to_string())).await.unwrap();
        wait_until(|| self.relay.stats().last_sequence.unwrap_or(0) > before).await;
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("no frame in time")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(_) = msg {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

/// Next frame is a close frame or the stream ends
async fn expect_closed(socket: &mut Socket) {
    let next = tokio::time::timeout(Duration::from_secs(2), socket.next())
        .await
        .expect("socket was not closed");
    match next {
        None | Some(Ok(Message::Close(_))) | Some(Err(_)) => {}
        Some(Ok(other)) => panic!("expected close, got {:?}", other),
    }
}

#[tokio::test]
async fn test_events_flow_from_producer_to_viewer() {
    let relay = TestRelay::start().await;
    let mut viewer = relay.viewer().await;
    let mut producer = relay.producer("checkout").await;

    producer
        .send(Message::text(
            json!({"level": "warn", "timestamp": 1_700_000_000_000_i64, "payload": ["low stock", {"sku": 7}]})
                .to_string(),
        ))
        .await
        .unwrap();
    producer
        .send(Message::text(
            json!([{"level": "info", "args": ["batched"]}, {"level": "error", "args": ["second"]}])
                .to_string(),
        ))
        .await
        .unwrap();
    producer
        .send(Message::text("not json at all"))
        .await
        .unwrap();

    let first = next_event(&mut viewer).await;
    assert_eq!(first["sequence"], 1);
    assert_eq!(first["level"], "warn");
    assert_eq!(first["sourceLabel"], "checkout");
    assert_eq!(first["payload"], json!(["low stock", {"sku": 7}]));
    assert_eq!(first["timestamp"], "2023-11-14T22:13:20Z");

    let second = next_event(&mut viewer).await;
    let third = next_event(&mut viewer).await;
    assert_eq!((second["sequence"].clone(), second["level"].clone()), (json!(2), json!("info")));
    assert_eq!((third["sequence"].clone(), third["level"].clone()), (json!(3), json!("error")));
    assert_eq!(second["sourceId"], first["sourceId"]);

    let fourth = next_event(&mut viewer).await;
    assert_eq!(fourth["sequence"], 4);
    assert_eq!(fourth["level"], "log");
    assert_eq!(fourth["payload"], json!(["not json at all"]));
}

#[tokio::test]
async fn test_two_producers_interleave_in_arrival_order() {
    let relay = TestRelay::start().await;
    let mut viewer_one = relay.viewer().await;
    let mut viewer_two = relay.viewer().await;
    let mut a = relay.producer("a").await;
    let mut b = relay.producer("b").await;

    relay.send_and_wait(&mut a, json!({"payload": ["A1"]})).await;
    relay.send_and_wait(&mut b, json!({"payload": ["B1"]})).await;
    relay.send_and_wait(&mut a, json!({"payload": ["A2"]})).await;
    relay.send_and_wait(&mut b, json!({"payload": ["B2"]})).await;

    for viewer in [&mut viewer_one, &mut viewer_two] {
        let mut seen = Vec::new();
        for expected_sequence in 1..=4 {
            let event = next_event(viewer).await;
            assert_eq!(event["sequence"], expected_sequence);
            seen.push(event["payload"][0].as_str().unwrap().to_string());
        }
        assert_eq!(seen, vec!["A1", "B1", "A2", "B2"]);
    }
}

#[tokio::test]
async fn test_viewer_disconnect_does_not_affect_others() {
    let relay = TestRelay::start().await;
    let mut stays = relay.viewer().await;
    let mut leaves = relay.viewer().await;
    let mut producer = relay.producer("p").await;

    leaves.close(None).await.unwrap();
    wait_until(|| relay.relay.stats().viewers == 1).await;

    relay.send_and_wait(&mut producer, json!({"payload": ["still here"]})).await;
    let event = next_event(&mut stays).await;
    assert_eq!(event["payload"], json!(["still here"]));
}

#[tokio::test]
async fn test_producer_disconnect_keeps_relay_running() {
    let relay = TestRelay::start().await;
    let mut viewer = relay.viewer().await;
    let mut gone = relay.producer("gone").await;
    let mut stays = relay.producer("stays").await;

    relay.send_and_wait(&mut gone, json!({"payload": ["bye"]})).await;
    drop(gone);
    wait_until(|| relay.relay.stats().producers == 1).await;

    relay.send_and_wait(&mut stays, json!({"payload": ["hi"]})).await;
    assert_eq!(next_event(&mut viewer).await["payload"], json!(["bye"]));
    assert_eq!(next_event(&mut viewer).await["payload"], json!(["hi"]));
}

#[tokio::test]
async fn test_close_ends_every_session_and_refuses_new_ones() {
    let relay = TestRelay::start().await;
    let mut viewer = relay.viewer().await;
    let mut producer = relay.producer("p").await;

    relay.relay.close();

    expect_closed(&mut viewer).await;
    expect_closed(&mut producer).await;
    tokio::time::timeout(Duration::from_secs(2), relay.relay.wait_idle())
        .await
        .expect("links still registered");

    match connect_async(format!("ws://{}/ws/viewer", relay.addr)).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 503),
        other => panic!("expected 503, got {:?}", other.map(|_| ())),
    }
}
