//! End-to-end broker tests over a real socket

use futures_util::{SinkExt, StreamExt};
use scenelink_broker::{BrokerConfig, CollectOutcome, Relay, Server};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_broker(collect_timeout_ms: u64) -> (SocketAddr, Arc<Relay>) {
    let mut config = BrokerConfig::default();
    config.relay.collect_timeout_ms = collect_timeout_ms;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(config);
    let relay = server.relay();
    tokio::spawn(server.serve(listener, std::future::pending()));
    (addr, relay)
}

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        match socket.next().await.expect("socket closed").unwrap() {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            _ => continue,
        }
    }
}

/// Connect a viewer and return its socket and assigned id
async fn connect_viewer(addr: SocketAddr) -> (Socket, String) {
    let (mut socket, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let welcome = next_json(&mut socket).await;
    assert_eq!(welcome["type"], "welcome");
    let id = welcome["clientId"].as_str().unwrap().to_string();
    (socket, id)
}

/// Answer every request with an echo, or stay silent
fn answer(mut socket: Socket, reply: bool) {
    tokio::spawn(async move {
        loop {
            let frame = next_json(&mut socket).await;
            if !reply || frame["type"] != "request" {
                continue;
            }
            let reply = json!({
                "type": "reply",
                "requestId": frame["requestId"],
                "output": {"echo": frame["payload"]},
            });
            socket.send(Message::Text(reply.to_string())).await.unwrap();
        }
    });
}

async fn wait_for_channels(relay: &Relay, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while relay.channel_count().await != count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("channels did not settle");
}

async fn run(addr: SocketAddr, payload: Value) -> CollectOutcome {
    reqwest::Client::new()
        .post(format!("http://{addr}/run"))
        .json(&payload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

#[tokio::test]
async fn three_viewers_reply_to_a_collect() {
    let (addr, relay) = spawn_broker(5000).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (socket, id) = connect_viewer(addr).await;
        answer(socket, true);
        ids.push(id);
    }
    wait_for_channels(&relay, 3).await;

    let outcome = run(addr, json!({"op": "ping"})).await;

    assert!(outcome.success, "{outcome:?}");
    assert_eq!(outcome.failed_clients, 0);
    assert_eq!(outcome.responses.len(), 3);
    for response in &outcome.responses {
        assert!(ids.contains(&response.client_id.to_string()));
        assert_eq!(response.output, json!({"echo": {"op": "ping"}}));
    }
}

#[tokio::test]
async fn silent_viewer_is_reported_after_the_deadline() {
    let (addr, relay) = spawn_broker(300).await;

    for _ in 0..2 {
        let (socket, _) = connect_viewer(addr).await;
        answer(socket, true);
    }
    let (socket, silent) = connect_viewer(addr).await;
    answer(socket, false);
    wait_for_channels(&relay, 3).await;

    let outcome = run(addr, json!({"op": "ping"})).await;

    assert!(!outcome.success);
    assert_eq!(outcome.responses.len(), 2);
    assert_eq!(outcome.failed_clients, 1);
    assert_eq!(outcome.missing_clients[0].to_string(), silent);
}

#[tokio::test]
async fn action_is_streamed_to_subscribers() {
    let (addr, _relay) = spawn_broker(5000).await;
    let client = reqwest::Client::new();

    let events = client
        .get(format!("http://{addr}/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        events.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let payload = json!({"name": "ResetView", "data": {"className": "ResetView"}});
    let ack: Value = client
        .post(format!("http://{addr}/action"))
        .json(&payload)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ack["success"], true);
    assert_eq!(ack["subscribers"], 1);

    let mut stream = events.bytes_stream();
    let mut text = String::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !text.contains("\n\n") {
            let chunk = stream.next().await.unwrap().unwrap();
            text.push_str(std::str::from_utf8(&chunk).unwrap());
        }
    })
    .await
    .expect("no event received");

    assert!(text.contains("event: action"), "{text}");
    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    assert_eq!(serde_json::from_str::<Value>(data).unwrap(), payload);
}

#[tokio::test]
async fn closing_a_socket_prunes_its_channel() {
    let (addr, relay) = spawn_broker(5000).await;

    let (mut socket, _) = connect_viewer(addr).await;
    wait_for_channels(&relay, 1).await;

    socket.close(None).await.unwrap();
    wait_for_channels(&relay, 0).await;

    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["channels"], 0);
}
