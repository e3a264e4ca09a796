//! Binding a viewer session to a broker
//!
//! The link owns the [`ViewerSession`] and is the only thing that touches it,
//! so requests from the response channel and the publish leg run one at a
//! time, in the order they are read.

use crate::control::ControlClient;
use crate::error::{ClientError, ClientResult};
use crate::events::{EventStream, SseEvent};
use futures_util::{SinkExt, StreamExt};
use scenelink_protocol::{dispatch_text, dispatch_value, ViewerFacade, ViewerSession};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Downstream {
    Welcome {
        #[serde(rename = "clientId")]
        client_id: String,
    },
    Request {
        #[serde(rename = "requestId")]
        request_id: String,
        payload: Value,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Upstream {
    Reply {
        #[serde(rename = "requestId")]
        request_id: String,
        output: Value,
    },
}

/// A viewer session attached to a broker's response channel
pub struct ViewerLink<V> {
    session: ViewerSession<V>,
    control: ControlClient,
    follow_events: bool,
}

impl<V: ViewerFacade> ViewerLink<V> {
    pub fn new(broker: &str, session: ViewerSession<V>) -> ClientResult<Self> {
        Ok(Self {
            session,
            control: ControlClient::new(broker)?,
            follow_events: false,
        })
    }

    /// Also execute fire-and-forget `action` payloads from the publish leg
    pub fn follow_events(mut self, follow: bool) -> Self {
        self.follow_events = follow;
        self
    }

    pub fn session(&self) -> &ViewerSession<V> {
        &self.session
    }

    /// WebSocket URL of the response channel
    pub fn channel_url(&self) -> ClientResult<Url> {
        let mut url = self.control.base_url().join("ws")?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ClientError::Handshake(format!("cannot use {} as a socket url", url)))?;
        Ok(url)
    }

    /// Serve until the broker closes the channel
    pub async fn run(self) -> ClientResult<ViewerSession<V>> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until the broker closes the channel or `shutdown` resolves.
    /// Hands the session back either way.
    pub async fn run_until<F>(mut self, shutdown: F) -> ClientResult<ViewerSession<V>>
    where
        F: Future<Output = ()>,
    {
        let url = self.channel_url()?;
        let (mut socket, _) = connect_async(url.as_str()).await?;

        let client_id = match next_frame(&mut socket).await? {
            Some(Downstream::Welcome { client_id }) => client_id,
            Some(Downstream::Request { .. }) => {
                return Err(ClientError::Handshake("request before welcome".to_string()))
            }
            None => return Err(ClientError::Handshake("channel closed".to_string())),
        };
        tracing::info!(client = %client_id, broker = %url, "Viewer linked");
        self.session.set_connection_id(Some(client_id));

        let mut events = if self.follow_events {
            Some(self.control.events().await?)
        } else {
            None
        };

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    let _ = socket.close(None).await;
                    break;
                }
                frame = next_frame(&mut socket) => match frame? {
                    Some(Downstream::Request { request_id, payload }) => {
                        self.answer(&mut socket, request_id, payload).await?;
                    }
                    Some(Downstream::Welcome { .. }) => {}
                    None => break,
                },
                event = next_event(&mut events) => match event {
                    Some(Ok(event)) => self.on_event(event).await,
                    Some(Err(e)) => {
                        tracing::warn!("Publish leg failed: {}", e);
                        events = None;
                    }
                    None => {
                        tracing::info!("Publish leg ended");
                        events = None;
                    }
                },
            }
        }

        tracing::info!("Viewer unlinked");
        Ok(self.session)
    }

    async fn answer(&mut self, socket: &mut Socket, request_id: String, payload: Value) -> ClientResult<()> {
        let output = dispatch_value(payload, &mut self.session).await;
        let reply = Upstream::Reply { request_id, output };
        socket.send(WsMessage::Text(serde_json::to_string(&reply)?)).await?;
        Ok(())
    }

    async fn on_event(&mut self, event: SseEvent) {
        // `run` payloads also arrive on the response channel.
        if event.name != "action" {
            return;
        }
        let reply = dispatch_text(&event.data, &mut self.session).await;
        tracing::debug!(%reply, "Executed broadcast action");
    }
}

/// Next decodable frame; `None` once the socket closes
async fn next_frame(socket: &mut Socket) -> ClientResult<Option<Downstream>> {
    while let Some(message) = socket.next().await {
        let text = match message? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => return Ok(None),
            _ => continue,
        };
        match serde_json::from_str(&text) {
            Ok(frame) => return Ok(Some(frame)),
            Err(e) => tracing::warn!("Ignoring malformed frame: {}", e),
        }
    }
    Ok(None)
}

async fn next_event(events: &mut Option<EventStream>) -> Option<ClientResult<SseEvent>> {
    match events {
        Some(events) => events.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenelink_protocol::InMemoryViewer;

    fn link(broker: &str) -> ViewerLink<InMemoryViewer> {
        ViewerLink::new(broker, ViewerSession::new(InMemoryViewer::new())).unwrap()
    }

    #[test]
    fn channel_url_switches_scheme() {
        assert_eq!(
            link("http://127.0.0.1:3000").channel_url().unwrap().as_str(),
            "ws://127.0.0.1:3000/ws"
        );
        assert_eq!(
            link("https://relay.example.org/scenelink").channel_url().unwrap().as_str(),
            "wss://relay.example.org/scenelink/ws"
        );
    }

    #[test]
    fn frames_match_broker_shape() {
        let frame: Downstream = serde_json::from_str(
            r#"{"type":"request","requestId":"r-1","payload":{"name":"ResetView"}}"#,
        )
        .unwrap();
        assert!(matches!(frame, Downstream::Request { ref request_id, .. } if request_id == "r-1"));

        let reply = Upstream::Reply {
            request_id: "r-1".to_string(),
            output: serde_json::json!({"error": "x"}),
        };
        assert_eq!(
            serde_json::to_value(reply).unwrap(),
            serde_json::json!({"type": "reply", "requestId": "r-1", "output": {"error": "x"}})
        );
    }
}
