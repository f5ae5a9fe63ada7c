// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for live message synchronization.
//!
//! Wires a `ConnectionManager` over the loopback transport into a
//! `MessageStore` and drives it from the broker side:
//! - control frames never touch the store
//! - malformed frames are skipped and later frames still land
//! - live arrivals before history are replayed after it
//! - concurrent arrivals are all kept, without duplicates
//!
//! Verification command: `cargo test --test message_sync`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use roomchat::chat::store::{AppendOutcome, MessageStore, StoreChange};
use roomchat::connection::{ConnectionManager, ConnectionStatus};
use roomchat::transport::loopback::{BrokerEnd, LoopbackConnector};
use roomchat_proto::model::{Message, MessageId, Participant, ParticipantId, RoomId};

const ROOM: RoomId = RoomId::new(1);
const ENDPOINT: &str = "loopback://cable";

// =============================================================================
// Test helpers
// =============================================================================

fn message(id: i64) -> Message {
    Message {
        id: MessageId::new(id),
        body: format!("message {id}"),
        created_at: chrono::Utc::now(),
        user: Participant::new(ParticipantId::new(2), "bob"),
    }
}

fn data_frame(id: i64) -> String {
    serde_json::json!({
        "identifier": "{\"channel\":\"MessagesChannel\"}",
        "message": message(id),
    })
    .to_string()
}

fn ids(store: &MessageStore) -> Vec<i64> {
    store.snapshot().iter().map(|m| m.id.get()).collect()
}

/// A connected manager feeding a store, plus the broker end of the socket.
struct Harness {
    manager: ConnectionManager<LoopbackConnector>,
    store: Arc<MessageStore>,
    broker: BrokerEnd,
    changes: mpsc::UnboundedReceiver<StoreChange>,
    appender: tokio::task::JoinHandle<()>,
}

impl Harness {
    async fn start() -> Self {
        let (connector, mut accepted) = LoopbackConnector::new(64);
        let (mut manager, mut inbound) = ConnectionManager::new(connector, 64);
        manager.open(ENDPOINT).await.unwrap();

        let mut broker = accepted.recv().await.unwrap();
        let identify = broker.recv().await.unwrap();
        assert!(identify.contains("\"subscribe\""));

        let store = Arc::new(MessageStore::new(ROOM));
        let changes = store.subscribe();
        let sink = Arc::clone(&store);
        let appender = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                sink.append(message);
            }
        });

        Self {
            manager,
            store,
            broker,
            changes,
            appender,
        }
    }

    /// Wait until the store holds `len` messages or buffers them.
    async fn wait_for(&self, len: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.store.len() + self.store.buffered_len() < len {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("store did not reach expected length");
    }

    fn drain_changes(&mut self) -> Vec<StoreChange> {
        let mut out = Vec::new();
        while let Ok(change) = self.changes.try_recv() {
            out.push(change);
        }
        out
    }

    async fn shutdown(mut self) {
        self.manager.close().await;
        self.appender.abort();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn ping_frames_cause_no_store_mutation() {
    let mut h = Harness::start().await;
    h.store.load_history(ROOM, vec![message(1)]).unwrap();
    h.drain_changes();

    h.broker.send(r#"{"type":"welcome"}"#).await.unwrap();
    h.broker.send(r#"{"type":"confirm_subscription","identifier":"{}"}"#).await.unwrap();
    for n in 0..5 {
        h.broker.send(format!(r#"{{"type":"ping","message":{n}}}"#)).await.unwrap();
    }
    // A data frame behind the pings proves they were all consumed.
    h.broker.send(data_frame(2)).await.unwrap();
    h.wait_for(2).await;

    assert_eq!(
        h.drain_changes(),
        vec![StoreChange::Appended {
            id: MessageId::new(2)
        }]
    );
    assert_eq!(ids(&h.store), vec![1, 2]);
    h.shutdown().await;
}

#[tokio::test]
async fn malformed_frame_is_skipped_and_stream_continues() {
    let h = Harness::start().await;
    h.store.load_history(ROOM, Vec::new()).unwrap();

    h.broker.send(data_frame(1)).await.unwrap();
    h.broker.send("this is not json").await.unwrap();
    h.broker.send(r#"{"identifier":"{}","message":{"id":"x"}}"#).await.unwrap();
    h.broker.send(r#"{"type":"disconnect","reason":"server_restart"}"#).await.unwrap();
    h.broker.send(data_frame(2)).await.unwrap();
    h.wait_for(2).await;

    assert_eq!(ids(&h.store), vec![1, 2]);
    assert_eq!(h.manager.status(), ConnectionStatus::Connected);
    h.shutdown().await;
}

#[tokio::test]
async fn live_frames_before_history_are_replayed_after_it() {
    let h = Harness::start().await;

    h.broker.send(data_frame(3)).await.unwrap();
    h.broker.send(data_frame(4)).await.unwrap();
    h.wait_for(2).await;
    assert!(h.store.is_empty());
    assert_eq!(h.store.buffered_len(), 2);

    h.store.load_history(ROOM, vec![message(1), message(2)]).unwrap();
    assert_eq!(ids(&h.store), vec![1, 2, 3, 4]);
    h.shutdown().await;
}

#[tokio::test]
async fn live_copy_of_history_message_is_ignored() {
    let h = Harness::start().await;
    h.store.load_history(ROOM, vec![message(1), message(2)]).unwrap();

    h.broker.send(data_frame(2)).await.unwrap();
    h.broker.send(data_frame(3)).await.unwrap();
    h.wait_for(3).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(ids(&h.store), vec![1, 2, 3]);
    h.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_arrivals_are_all_kept() {
    let store = Arc::new(MessageStore::new(ROOM));
    store.load_history(ROOM, vec![message(1), message(2)]).unwrap();

    let a = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.append(message(3)) })
    };
    let b = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.append(message(4)) })
    };
    assert_eq!(a.await.unwrap(), AppendOutcome::Appended);
    assert_eq!(b.await.unwrap(), AppendOutcome::Appended);

    let seen = ids(&store);
    assert!(
        seen == vec![1, 2, 3, 4] || seen == vec![1, 2, 4, 3],
        "unexpected order {seen:?}"
    );
}

#[tokio::test]
async fn broker_disconnect_stops_the_stream_without_retry() {
    let (connector, mut accepted) = LoopbackConnector::new(16);
    let (mut manager, mut inbound) = ConnectionManager::new(connector.clone(), 16);
    manager.open(ENDPOINT).await.unwrap();
    let broker = accepted.recv().await.unwrap();

    broker.send(data_frame(1)).await.unwrap();
    assert_eq!(inbound.recv().await.unwrap().id, MessageId::new(1));
    drop(broker);

    let mut status = manager.watch_status();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| *s == ConnectionStatus::Disconnected),
    )
    .await
    .unwrap()
    .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.connect_count(), 1);
    assert!(accepted.try_recv().is_err());
}
