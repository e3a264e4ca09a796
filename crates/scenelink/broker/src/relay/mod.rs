//! Relay hub
//!
//! Holds the publish leg (an SSE fan-out backed by a broadcast channel) and the
//! keyed response channels. Connection tasks attach and detach independently;
//! broadcasts work on a snapshot of the channel map so a connect or disconnect
//! during iteration never blocks or skews a call.

mod collect;
mod frames;

pub use collect::{ClientResponse, CollectOutcome};
pub use frames::{ClientId, Downstream, PublishKind, Published, RequestId, Upstream};

use crate::config::RelayConfig;
use collect::{Arrival, PendingCollect};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};

/// Lifecycle of a response channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Registered, welcome frame not yet delivered
    Connecting,
    /// Receives collect requests
    Open,
    /// Socket gone; pruned on the close notification
    Closed,
}

struct ResponseChannel {
    state: ChannelState,
    outbound: mpsc::UnboundedSender<Downstream>,
}

impl ResponseChannel {
    fn state(&self) -> ChannelState {
        if self.outbound.is_closed() {
            ChannelState::Closed
        } else {
            self.state
        }
    }
}

/// Broker hub shared by every connection handler
pub struct Relay {
    config: RelayConfig,
    publish_tx: broadcast::Sender<Published>,
    channels: RwLock<HashMap<ClientId, ResponseChannel>>,
    pending: Mutex<HashMap<RequestId, PendingCollect>>,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        let (publish_tx, _) = broadcast::channel(config.publish_buffer.max(1));
        Self {
            config,
            publish_tx,
            channels: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Publish leg
    // -----------------------------------------------------------------------

    /// Open a publish subscription; dropping it detaches the subscriber
    pub fn subscribe(&self) -> Subscription {
        let subscription = Subscription {
            id: ClientId::generate(),
            rx: self.publish_tx.subscribe(),
        };
        tracing::info!(
            subscriber = %subscription.id,
            total = self.subscriber_count(),
            "Publish subscriber connected"
        );
        subscription
    }

    /// Write a payload to every publish subscriber; returns how many there were
    pub fn publish(&self, kind: PublishKind, payload: &Value) -> usize {
        let published = Published {
            kind,
            data: payload.to_string().into(),
        };
        let delivered = self.publish_tx.send(published).unwrap_or(0);
        tracing::debug!(event = kind.name(), subscribers = delivered, "Published payload");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.publish_tx.receiver_count()
    }

    // -----------------------------------------------------------------------
    // Response channels
    // -----------------------------------------------------------------------

    /// Register a new response channel in the `Connecting` state
    pub async fn connect(&self) -> (ClientId, mpsc::UnboundedReceiver<Downstream>) {
        let id = ClientId::generate();
        let (outbound, rx) = mpsc::unbounded_channel();
        self.channels.write().await.insert(
            id.clone(),
            ResponseChannel {
                state: ChannelState::Connecting,
                outbound,
            },
        );
        (id, rx)
    }

    /// Mark a channel `Open`; returns false if it is unknown
    pub async fn open(&self, id: &ClientId) -> bool {
        let mut channels = self.channels.write().await;
        let Some(channel) = channels.get_mut(id) else {
            return false;
        };
        channel.state = ChannelState::Open;
        let open = channels
            .values()
            .filter(|c| c.state() == ChannelState::Open)
            .count();
        tracing::info!(client = %id, open, "Response channel opened");
        true
    }

    /// Prune a channel and fail it out of every collect still waiting on it
    pub async fn close(&self, id: &ClientId) {
        let mut pending = self.pending.lock().await;
        let removed = self.channels.write().await.remove(id).is_some();
        if !removed {
            return;
        }

        for collect in pending.values_mut() {
            if collect.awaiting.remove(id) {
                let _ = collect.arrivals.send(Arrival::Gone(id.clone()));
            }
        }
        drop(pending);

        let open = self.channel_count().await;
        tracing::info!(client = %id, open = open, "Response channel closed");
    }

    pub async fn channel_state(&self, id: &ClientId) -> Option<ChannelState> {
        self.channels.read().await.get(id).map(ResponseChannel::state)
    }

    /// Number of `Open` response channels
    pub async fn channel_count(&self) -> usize {
        self.channels
            .read()
            .await
            .values()
            .filter(|c| c.state() == ChannelState::Open)
            .count()
    }

    /// Route a viewer's reply to the collect it belongs to.
    ///
    /// Returns false for orphans: unknown or finished requests and repeat
    /// replies from a client that already answered. Orphans are dropped.
    pub async fn deliver(&self, client: &ClientId, request: &RequestId, output: Value) -> bool {
        let mut pending = self.pending.lock().await;
        if let Some(collect) = pending.get_mut(request) {
            if collect.awaiting.remove(client) {
                return collect
                    .arrivals
                    .send(Arrival::Reply(ClientResponse {
                        client_id: client.clone(),
                        output,
                    }))
                    .is_ok();
            }
        }
        tracing::debug!(client = %client, request = %request, "Dropping orphaned reply");
        false
    }

    /// Snapshot of every registered channel
    fn snapshot(
        channels: &HashMap<ClientId, ResponseChannel>,
    ) -> Vec<(ClientId, ChannelState, mpsc::UnboundedSender<Downstream>)> {
        let mut snapshot: Vec<_> = channels
            .iter()
            .map(|(id, c)| (id.clone(), c.state(), c.outbound.clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }
}

/// A live publish subscription
pub struct Subscription {
    id: ClientId,
    rx: broadcast::Receiver<Published>,
}

impl Subscription {
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub async fn recv(&mut self) -> Result<Published, broadcast::error::RecvError> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        tracing::info!(subscriber = %self.id, "Publish subscriber disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn relay() -> Relay {
        Relay::new(RelayConfig::default())
    }

    #[tokio::test]
    async fn test_channel_lifecycle() {
        let relay = relay();
        let (id, rx) = relay.connect().await;
        assert_eq!(relay.channel_state(&id).await, Some(ChannelState::Connecting));
        assert_eq!(relay.channel_count().await, 0);

        assert!(relay.open(&id).await);
        assert_eq!(relay.channel_state(&id).await, Some(ChannelState::Open));
        assert_eq!(relay.channel_count().await, 1);

        drop(rx);
        assert_eq!(relay.channel_state(&id).await, Some(ChannelState::Closed));
        assert_eq!(relay.channel_count().await, 0);

        relay.close(&id).await;
        assert_eq!(relay.channel_state(&id).await, None);
        assert!(!relay.open(&id).await);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let relay = relay();
        assert_eq!(relay.publish(PublishKind::Action, &json!({"op": "noop"})), 0);

        let mut first = relay.subscribe();
        let mut second = relay.subscribe();
        assert_eq!(relay.subscriber_count(), 2);

        let payload = json!({"name": "ResetView", "data": {"className": "ResetView"}});
        assert_eq!(relay.publish(PublishKind::Action, &payload), 2);

        for sub in [&mut first, &mut second] {
            let published = sub.recv().await.unwrap();
            assert_eq!(published.kind, PublishKind::Action);
            let decoded: Value = serde_json::from_str(&published.data).unwrap();
            assert_eq!(decoded, payload);
        }

        drop(second);
        assert_eq!(relay.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_reply_without_collect_is_orphaned() {
        let relay = relay();
        let (id, _rx) = relay.connect().await;
        relay.open(&id).await;
        assert!(!relay.deliver(&id, &RequestId::new("nothing"), json!(1)).await);
    }
}
