//! Response channels over WebSocket

use crate::api::rest::state::AppState;
use crate::relay::{ClientId, Downstream, Relay, Upstream};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

/// Upgrade to a response channel
pub async fn response_channel(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let relay = Arc::clone(&state.relay);
    ws.max_message_size(state.server.max_body_size)
        .max_frame_size(state.server.max_body_size)
        .on_upgrade(move |socket| serve_channel(socket, relay))
}

async fn serve_channel(socket: WebSocket, relay: Arc<Relay>) {
    let (client, mut outbound) = relay.connect().await;
    let (mut sink, mut inbound) = socket.split();

    let welcome = Downstream::Welcome {
        client_id: client.clone(),
    };
    if let Err(e) = send_frame(&mut sink, &welcome).await {
        tracing::warn!(client = %client, "Failed to greet response channel: {}", e);
        relay.close(&client).await;
        return;
    }
    relay.open(&client).await;

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = send_frame(&mut sink, &frame).await {
                    tracing::debug!(client = %client, "Response channel send failed: {}", e);
                    break;
                }
            }
            message = inbound.next() => match message {
                Some(Ok(Message::Text(text))) => receive(&relay, &client, &text).await,
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => receive(&relay, &client, text).await,
                    Err(_) => tracing::warn!(client = %client, "Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(client = %client, "Response channel read failed: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    relay.close(&client).await;
}

async fn receive(relay: &Relay, client: &ClientId, text: &str) {
    match serde_json::from_str::<Upstream>(text) {
        Ok(Upstream::Reply { request_id, output }) => {
            relay.deliver(client, &request_id, output).await;
        }
        Err(e) => tracing::warn!(client = %client, "Ignoring malformed frame: {}", e),
    }
}

async fn send_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: &Downstream,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).map_err(axum::Error::new)?;
    sink.send(Message::Text(text)).await
}
