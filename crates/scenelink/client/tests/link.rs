//! Control client and viewer link against a live broker

use scenelink_broker::{BrokerConfig, Relay, Server};
use scenelink_client::{ClientError, ClientResult, ControlClient, ViewerLink};
use scenelink_protocol::{
    GetState, InMemoryViewer, LoadStructure, Message, Operation, PollSelection, ResetView,
    ViewerSession,
};
use scenelink_registry::ExternalKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const CRAMBIN: &str = "\
ATOM      1  N   THR A   1      17.047  14.099   3.625  1.00 13.79           N
ATOM      2  CA  THR A   1      16.967  12.784   4.338  1.00 10.80           C
HETATM    3  C1  LIG A 101      11.000  11.000  11.000  1.00 20.00           C
END
";

type Viewer = JoinHandle<ClientResult<ViewerSession<InMemoryViewer>>>;

async fn spawn_broker() -> (String, Arc<Relay>) {
    let mut config = BrokerConfig::default();
    config.relay.collect_timeout_ms = 2000;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(config);
    let relay = server.relay();
    tokio::spawn(server.serve(listener, std::future::pending()));
    (format!("http://{addr}"), relay)
}

fn spawn_viewer(broker: &str, follow_events: bool) -> (Viewer, oneshot::Sender<()>) {
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let link = ViewerLink::new(broker, ViewerSession::new(InMemoryViewer::new()))
        .unwrap()
        .follow_events(follow_events);
    let handle = tokio::spawn(link.run_until(async {
        let _ = stop_rx.await;
    }));
    (handle, stop_tx)
}

async fn settle<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never held");
}

async fn wait_for_channels(relay: &Relay, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while relay.channel_count().await != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("channels did not settle");
}

#[tokio::test]
async fn operations_round_trip_through_a_linked_viewer() {
    let (broker, relay) = spawn_broker().await;
    let (_viewer, _stop) = spawn_viewer(&broker, false);
    wait_for_channels(&relay, 1).await;

    let control = ControlClient::new(&broker).unwrap();
    assert_eq!(control.health().await.unwrap().channels, 1);

    let loaded = control
        .execute_one(LoadStructure::new("crambin", CRAMBIN))
        .await
        .unwrap();
    let Operation::LoadStructure(load) = loaded else {
        panic!("unexpected reply {loaded:?}");
    };
    assert_eq!(load.report.map(|r| r.references), Some(1));

    let state = control.execute_one(GetState::new("control")).await.unwrap();
    let Operation::GetState(state) = state else {
        panic!("unexpected reply {state:?}");
    };
    assert!(state.synced);
    assert_eq!(state.connection_id.as_deref(), Some("control"));
    assert_eq!(state.references[0].external_key, ExternalKey::new("crambin"));

    let error = control.execute_one(PollSelection::default()).await.unwrap_err();
    assert!(
        matches!(&error, ClientError::Remote(message) if message == "Nothing is selected"),
        "{error}"
    );
}

#[tokio::test]
async fn every_linked_viewer_answers() {
    let (broker, relay) = spawn_broker().await;
    let (_first, _stop_first) = spawn_viewer(&broker, false);
    let (_second, _stop_second) = spawn_viewer(&broker, false);
    wait_for_channels(&relay, 2).await;

    let control = ControlClient::new(&broker).unwrap();
    let execution = control.execute(ResetView::default()).await.unwrap();

    assert!(execution.success);
    assert_eq!(execution.replies.len(), 2);
    assert_ne!(execution.replies[0].client_id, execution.replies[1].client_id);
    for reply in &execution.replies {
        assert_eq!(reply.result, Ok(Operation::from(ResetView::default())));
    }
}

#[tokio::test]
async fn followed_actions_are_executed() {
    let (broker, relay) = spawn_broker().await;
    let (_viewer, _stop) = spawn_viewer(&broker, true);
    wait_for_channels(&relay, 1).await;
    let subscribers = Arc::clone(&relay);
    settle(move || subscribers.subscriber_count() == 1).await;

    let control = ControlClient::new(&broker).unwrap();
    let ack = control
        .action(&Message::new(LoadStructure::new("broadcast", CRAMBIN)))
        .await
        .unwrap();
    assert!(ack.success);
    assert_eq!(ack.subscribers, 1);

    // The action runs asynchronously; poll the state until it shows up.
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let reply = control.execute_one(GetState::default()).await.unwrap();
            if let Operation::GetState(state) = reply {
                if state.references.len() == 1 {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("action never executed");
}

#[tokio::test]
async fn stopping_a_link_returns_its_session() {
    let (broker, relay) = spawn_broker().await;
    let (viewer, stop) = spawn_viewer(&broker, false);
    wait_for_channels(&relay, 1).await;

    let control = ControlClient::new(&broker).unwrap();
    control
        .execute_one(LoadStructure::new("kept", CRAMBIN))
        .await
        .unwrap();

    stop.send(()).unwrap();
    let session = viewer.await.unwrap().unwrap();
    assert_eq!(session.registry().references(), [ExternalKey::new("kept")]);
    assert!(session.connection_id().is_some());

    wait_for_channels(&relay, 0).await;
    let empty = control.execute(ResetView::default()).await.unwrap();
    assert!(empty.replies.is_empty());
}
