//! Broadcast-and-collect

use super::{ChannelState, ClientId, Downstream, PublishKind, Relay, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

/// One viewer's reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub client_id: ClientId,
    pub output: Value,
}

/// Result of a broadcast-and-collect call. Partial failure is data, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectOutcome {
    pub success: bool,
    pub message: String,
    /// Replies in arrival order
    pub responses: Vec<ClientResponse>,
    pub failed_clients: usize,
    pub missing_clients: Vec<ClientId>,
}

pub(super) enum Arrival {
    Reply(ClientResponse),
    /// The channel closed before replying
    Gone(ClientId),
}

pub(super) struct PendingCollect {
    pub(super) awaiting: HashSet<ClientId>,
    pub(super) arrivals: mpsc::UnboundedSender<Arrival>,
}

impl Relay {
    /// Publish `payload`, send it on every open response channel and wait,
    /// until the collect deadline at most, for one reply per channel.
    pub async fn collect(&self, payload: Value) -> CollectOutcome {
        let request_id = RequestId::generate();
        let deadline = Instant::now() + self.config.collect_timeout();

        self.publish(PublishKind::Run, &payload);

        let (arrivals, mut arrival_rx) = mpsc::unbounded_channel();
        let mut missing = Vec::new();
        let mut sent = Vec::new();
        {
            // Registered before the first send so a fast reply finds its collect.
            // Lock order is `pending` then `channels`, the same as `close`, so a
            // channel is either absent from the snapshot or awaited by a close.
            let mut pending = self.pending.lock().await;
            let targets = {
                let channels = self.channels.read().await;
                Relay::snapshot(&channels)
            };
            let collect = pending.entry(request_id.clone()).or_insert(PendingCollect {
                awaiting: HashSet::new(),
                arrivals,
            });

            for (client, state, outbound) in targets {
                match state {
                    ChannelState::Connecting => continue,
                    ChannelState::Closed => {
                        missing.push(client);
                        continue;
                    }
                    ChannelState::Open => {}
                }

                collect.awaiting.insert(client.clone());
                let frame = Downstream::Request {
                    request_id: request_id.clone(),
                    payload: payload.clone(),
                };
                if outbound.send(frame).is_err() {
                    collect.awaiting.remove(&client);
                    missing.push(client);
                } else {
                    sent.push(client);
                }
            }
        }

        tracing::debug!(
            request = %request_id,
            clients = sent.len(),
            closed = missing.len(),
            "Collect started"
        );

        let mut responses = Vec::with_capacity(sent.len());
        let mut gone = HashSet::new();
        let mut timed_out = false;
        while responses.len() + gone.len() < sent.len() {
            match timeout_at(deadline, arrival_rx.recv()).await {
                Ok(Some(Arrival::Reply(response))) => responses.push(response),
                Ok(Some(Arrival::Gone(client))) => {
                    gone.insert(client);
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }

        self.pending.lock().await.remove(&request_id);
        drop(arrival_rx);

        let answered: HashSet<&ClientId> = responses.iter().map(|r| &r.client_id).collect();
        missing.extend(sent.iter().filter(|c| !answered.contains(c)).cloned());

        if timed_out {
            tracing::warn!(
                request = %request_id,
                received = responses.len(),
                missing = missing.len(),
                "Collect deadline expired"
            );
        }

        let message = if timed_out {
            "Timeout waiting for clients to respond"
        } else if !missing.is_empty() {
            "Some clients closed before responding"
        } else if sent.is_empty() {
            "No clients connected"
        } else {
            "Request forwarded to all clients and responses received"
        };

        CollectOutcome {
            success: missing.is_empty(),
            message: message.to_string(),
            responses,
            failed_clients: missing.len(),
            missing_clients: missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    /// Attach an open channel whose viewer answers after `delay`, or never
    async fn attach(relay: &Arc<Relay>, delay: Option<Duration>) -> ClientId {
        let (id, mut rx) = relay.connect().await;
        relay.open(&id).await;

        let relay = Arc::clone(relay);
        let client = id.clone();
        tokio::spawn(async move {
            while let Some(Downstream::Request {
                request_id,
                payload,
            }) = rx.recv().await
            {
                if let Some(delay) = delay {
                    sleep(delay).await;
                    let output = json!({"from": client.as_str(), "echo": payload});
                    relay.deliver(&client, &request_id, output).await;
                }
            }
        });
        id
    }

    fn relay() -> Arc<Relay> {
        Arc::new(Relay::new(RelayConfig::default()))
    }

    fn ids(outcome: &CollectOutcome) -> Vec<ClientId> {
        outcome.responses.iter().map(|r| r.client_id.clone()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_clients_reply_in_arrival_order() {
        let relay = relay();
        let slow = attach(&relay, Some(Duration::from_millis(30))).await;
        let fast = attach(&relay, Some(Duration::from_millis(10))).await;
        let middle = attach(&relay, Some(Duration::from_millis(20))).await;

        let started = Instant::now();
        let outcome = relay.collect(json!({"op": "ping"})).await;

        assert!(outcome.success);
        assert_eq!(outcome.failed_clients, 0);
        assert_eq!(ids(&outcome), vec![fast, middle, slow]);
        assert_eq!(outcome.responses[0].output["echo"], json!({"op": "ping"}));
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_client_times_out_at_deadline() {
        let relay = relay();
        let first = attach(&relay, Some(Duration::from_millis(5))).await;
        let second = attach(&relay, Some(Duration::from_millis(15))).await;
        let silent = attach(&relay, None).await;

        let started = Instant::now();
        let outcome = relay.collect(json!({"op": "ping"})).await;
        let elapsed = started.elapsed();

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Timeout waiting for clients to respond");
        assert_eq!(ids(&outcome), vec![first, second]);
        assert_eq!(outcome.failed_clients, 1);
        assert_eq!(outcome.missing_clients, vec![silent]);
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(5100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_fails_without_waiting() {
        let relay = relay();
        let live = attach(&relay, Some(Duration::from_millis(1))).await;
        let (dead, rx) = relay.connect().await;
        relay.open(&dead).await;
        drop(rx);

        let started = Instant::now();
        let outcome = relay.collect(json!({"op": "ping"})).await;

        assert!(!outcome.success);
        assert_eq!(ids(&outcome), vec![live]);
        assert_eq!(outcome.missing_clients, vec![dead]);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_collect_stops_the_wait() {
        let relay = relay();
        let (id, mut rx) = relay.connect().await;
        relay.open(&id).await;

        let closer = Arc::clone(&relay);
        let client = id.clone();
        tokio::spawn(async move {
            let _ = rx.recv().await;
            sleep(Duration::from_millis(50)).await;
            closer.close(&client).await;
        });

        let started = Instant::now();
        let outcome = relay.collect(json!({"op": "ping"})).await;

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Some clients closed before responding");
        assert_eq!(outcome.missing_clients, vec![id]);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_waits_for_registering_collect() {
        let relay = relay();
        let (id, _rx) = relay.connect().await;
        relay.open(&id).await;

        // Park a collect on the pending table, then queue a close behind it.
        let guard = relay.pending.lock().await;
        let collecting = Arc::clone(&relay);
        let collect = tokio::spawn(async move { collecting.collect(json!({"op": "ping"})).await });
        tokio::task::yield_now().await;
        let closing = Arc::clone(&relay);
        let client = id.clone();
        let close = tokio::spawn(async move { closing.close(&client).await });
        tokio::task::yield_now().await;

        assert_eq!(relay.channel_state(&id).await, Some(ChannelState::Open));
        drop(guard);

        let started = Instant::now();
        let outcome = collect.await.unwrap();
        close.await.unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Some clients closed before responding");
        assert_eq!(outcome.missing_clients, vec![id]);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_before_snapshot_leaves_nothing_to_wait_for() {
        let relay = relay();
        let (id, _rx) = relay.connect().await;
        relay.open(&id).await;

        let guard = relay.pending.lock().await;
        let closing = Arc::clone(&relay);
        let client = id.clone();
        let close = tokio::spawn(async move { closing.close(&client).await });
        tokio::task::yield_now().await;
        let collecting = Arc::clone(&relay);
        let collect = tokio::spawn(async move { collecting.collect(json!({"op": "ping"})).await });
        tokio::task::yield_now().await;
        drop(guard);

        let started = Instant::now();
        close.await.unwrap();
        let outcome = collect.await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, "No clients connected");
        assert_eq!(relay.channel_state(&id).await, None);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_is_dropped() {
        let relay = relay();
        let late = attach(&relay, Some(Duration::from_millis(6000))).await;

        let outcome = relay.collect(json!({"op": "ping"})).await;
        assert_eq!(outcome.missing_clients, vec![late.clone()]);

        // A later collect only counts replies to its own request.
        sleep(Duration::from_millis(1500)).await;
        let outcome = relay.collect(json!({"op": "again"})).await;
        assert!(!outcome.success);
        assert!(outcome.responses.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connecting_channels_are_skipped() {
        let relay = relay();
        let (_pending, _rx) = relay.connect().await;

        let outcome = relay.collect(json!({"op": "ping"})).await;
        assert!(outcome.success);
        assert_eq!(outcome.message, "No clients connected");
        assert!(outcome.responses.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_is_mirrored_on_publish_leg() {
        let relay = relay();
        let mut subscription = relay.subscribe();
        relay.collect(json!({"op": "ping"})).await;

        let published = subscription.recv().await.unwrap();
        assert_eq!(published.kind, PublishKind::Run);
        assert_eq!(&*published.data, r#"{"op":"ping"}"#);
    }

    #[test]
    fn test_outcome_wire_shape() {
        let outcome = CollectOutcome {
            success: false,
            message: "Timeout waiting for clients to respond".to_string(),
            responses: vec![],
            failed_clients: 1,
            missing_clients: vec![],
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["failedClients"], json!(1));
        assert_eq!(value["missingClients"], json!([]));
        assert_eq!(value["success"], json!(false));
    }
}
