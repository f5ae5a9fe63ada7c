// Test-specific lint overrides: integration tests use unwrap/expect freely,
// and some pedantic/nursery lints are not appropriate for test code.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::doc_markdown,
    clippy::future_not_send,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::missing_docs_in_private_items
)]

//! Integration tests for the room session lifecycle.
//!
//! Runs `RoomSession` against an in-memory `ChatApi` and the loopback
//! broker, and renders the room screen through ratatui's `TestBackend`:
//! - empty rooms show the empty placeholder
//! - the first successful send switches the viewport to live following
//! - an echo that arrives before the post returns still jumps
//! - switching rooms never leaks a slow history into the new room
//! - history for another room is replaced by an empty one with a notice
//! - activation without a local user is rejected
//! - deactivation releases the broker socket
//!
//! Verification command: `cargo test --test room_session`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ratatui::{Terminal, backend::TestBackend};
use tokio::sync::mpsc;

use roomchat::api::{ApiError, ChatApi};
use roomchat::app::App;
use roomchat::chat::{ScrollAction, ScrollMode};
use roomchat::connection::ConnectionStatus;
use roomchat::identity::SessionScope;
use roomchat::session::{RoomSession, SessionConfig, SessionError, SessionEvent};
use roomchat::transport::loopback::{BrokerEnd, LoopbackConnector};
use roomchat::ui;
use roomchat_proto::model::{
    Message, MessageId, NewMessage, NewParticipant, NewRoom, Participant, ParticipantId, Room,
    RoomDetails, RoomId,
};

const ROOM_A: RoomId = RoomId::new(1);
const ROOM_B: RoomId = RoomId::new(2);

// =============================================================================
// Test helpers
// =============================================================================

fn ada() -> Participant {
    Participant::new(ParticipantId::new(7), "Ada Lovelace")
}

fn message(id: i64, body: &str) -> Message {
    Message {
        id: MessageId::new(id),
        body: body.to_string(),
        created_at: chrono::Utc::now(),
        user: Participant::new(ParticipantId::new(2), "bob"),
    }
}

fn data_frame(message: &Message) -> String {
    serde_json::json!({
        "identifier": "{\"channel\":\"MessagesChannel\"}",
        "message": message,
    })
    .to_string()
}

/// In-memory backend. Each room can answer after a delay.
#[derive(Default)]
struct FakeApi {
    rooms: Mutex<HashMap<RoomId, (RoomDetails, Duration)>>,
    posted: Mutex<Vec<NewMessage>>,
}

impl FakeApi {
    fn with_room(self, id: RoomId, name: &str, messages: Vec<Message>, delay: Duration) -> Self {
        let details = RoomDetails {
            id,
            name: name.to_string(),
            messages,
        };
        self.rooms.lock().insert(id, (details, delay));
        self
    }
}

impl ChatApi for FakeApi {
    async fn list_users(&self) -> Result<Vec<Participant>, ApiError> {
        Ok(vec![ada()])
    }

    async fn create_user(&self, _user: &NewParticipant) -> Result<(), ApiError> {
        Ok(())
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, ApiError> {
        Ok(self
            .rooms
            .lock()
            .values()
            .map(|(details, _)| Room {
                id: details.id,
                name: details.name.clone(),
            })
            .collect())
    }

    async fn create_room(&self, _room: &NewRoom) -> Result<(), ApiError> {
        Ok(())
    }

    async fn fetch_room(&self, id: RoomId) -> Result<RoomDetails, ApiError> {
        let entry = self.rooms.lock().get(&id).cloned();
        let Some((details, delay)) = entry else {
            return Err(ApiError::InvalidUrl {
                url: format!("chatrooms/{id}"),
                reason: "no such room".to_string(),
            });
        };
        tokio::time::sleep(delay).await;
        Ok(details)
    }

    async fn post_message(&self, message: &NewMessage) -> Result<(), ApiError> {
        self.posted.lock().push(message.clone());
        Ok(())
    }
}

fn signed_in() -> SessionScope {
    let scope = SessionScope::new();
    scope.set_participant(&ada());
    scope
}

fn config() -> SessionConfig {
    SessionConfig {
        ws_url: "loopback://cable".to_string(),
        channel_capacity: 32,
    }
}

async fn wait_for_event(session: &mut RoomSession<FakeApi, LoopbackConnector>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(event) = session.next_event() {
                return event;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("no session event")
}

async fn accept(accepted: &mut mpsc::UnboundedReceiver<BrokerEnd>) -> BrokerEnd {
    let mut broker = tokio::time::timeout(Duration::from_secs(5), accepted.recv())
        .await
        .unwrap()
        .unwrap();
    let identify = broker.recv().await.unwrap();
    assert!(identify.contains("MessagesChannel"));
    broker
}

fn render(app: &App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
    terminal.draw(|frame| ui::draw(frame, app)).unwrap();
    terminal
        .backend()
        .buffer()
        .content
        .iter()
        .map(ratatui::buffer::Cell::symbol)
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn empty_room_renders_placeholder() {
    let api = Arc::new(FakeApi::default().with_room(ROOM_A, "quiet", Vec::new(), Duration::ZERO));
    let (connector, mut accepted) = LoopbackConnector::new(16);
    let mut session = RoomSession::activate(&signed_in(), ROOM_A, api, connector, &config())
        .await
        .unwrap();
    let _broker = accept(&mut accepted).await;

    let event = wait_for_event(&mut session).await;
    assert!(matches!(event, SessionEvent::RoomLoaded { messages: 0, .. }));

    let mut app = App::new("%H:%M", 4);
    app.enter_room_selection(ada());
    app.enter_room(ROOM_A);
    app.set_room_name(session.room_name().unwrap());
    let actions = session.follow_changes(Some(&mut app.viewport));
    assert_eq!(actions, vec![ScrollAction::Snap]);
    app.refresh_room(
        session.status(),
        session.scroll_mode(),
        session.is_loaded(),
        Some(session.messages()),
    );

    let screen = render(&app);
    assert!(screen.contains("quiet"));
    assert!(screen.contains("No messages yet"));
    assert!(screen.contains("Online"));

    session.deactivate().await;
}

#[tokio::test]
async fn first_send_switches_to_live_following() {
    let api = Arc::new(FakeApi::default().with_room(
        ROOM_A,
        "general",
        vec![message(1, "hi")],
        Duration::ZERO,
    ));
    let (connector, mut accepted) = LoopbackConnector::new(16);
    let mut session = RoomSession::activate(&signed_in(), ROOM_A, Arc::clone(&api), connector, &config())
        .await
        .unwrap();
    let broker = accept(&mut accepted).await;
    wait_for_event(&mut session).await;

    let mut app = App::new("%H:%M", 4);
    assert_eq!(session.follow_changes(Some(&mut app.viewport)), vec![ScrollAction::Snap]);
    assert_eq!(session.scroll_mode(), ScrollMode::InitialLoad);

    session.send_message("hello all").await.unwrap();
    assert_eq!(session.scroll_mode(), ScrollMode::Live);
    let posted = api.posted.lock().clone();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].user_id, ada().id);
    assert_eq!(posted[0].chatroom_id, ROOM_A);

    // The backend echoes the post over the socket.
    let mut echo = message(2, "hello all");
    echo.user = ada();
    broker.send(data_frame(&echo)).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.store().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(session.follow_changes(Some(&mut app.viewport)), vec![ScrollAction::Animate]);
    assert_eq!(app.viewport.last_action(), Some(ScrollAction::Animate));

    session.deactivate().await;
}

#[tokio::test]
async fn echo_that_beats_the_post_response_still_snaps() {
    let api = Arc::new(FakeApi::default().with_room(
        ROOM_A,
        "general",
        vec![message(1, "hi")],
        Duration::ZERO,
    ));
    let (connector, mut accepted) = LoopbackConnector::new(16);
    let mut session = RoomSession::activate(&signed_in(), ROOM_A, Arc::clone(&api), connector, &config())
        .await
        .unwrap();
    let broker = accept(&mut accepted).await;
    wait_for_event(&mut session).await;

    // The echo lands in the store before the post returns, so its change
    // is still queued when the session switches to live following.
    let mut echo = message(2, "hello all");
    echo.user = ada();
    broker.send(data_frame(&echo)).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.store().len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    session.send_message("hello all").await.unwrap();
    assert_eq!(session.scroll_mode(), ScrollMode::Live);

    let mut app = App::new("%H:%M", 4);
    assert_eq!(
        session.follow_changes(Some(&mut app.viewport)),
        vec![ScrollAction::Snap, ScrollAction::Snap]
    );

    // Anything after the switch animates.
    broker.send(data_frame(&message(3, "reply"))).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.store().len() < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(session.follow_changes(Some(&mut app.viewport)), vec![ScrollAction::Animate]);

    session.deactivate().await;
}

#[tokio::test]
async fn slow_history_of_previous_room_never_reaches_the_next() {
    let api = Arc::new(
        FakeApi::default()
            .with_room(ROOM_A, "slow", vec![message(10, "from A")], Duration::from_millis(200))
            .with_room(ROOM_B, "fast", vec![message(20, "from B")], Duration::ZERO),
    );
    let scope = signed_in();
    let (connector, mut accepted) = LoopbackConnector::new(16);

    let first = RoomSession::activate(&scope, ROOM_A, Arc::clone(&api), connector.clone(), &config())
        .await
        .unwrap();
    let _broker_a = accept(&mut accepted).await;
    let store_a = Arc::clone(first.store());
    first.deactivate().await;

    let mut second = RoomSession::activate(&scope, ROOM_B, Arc::clone(&api), connector, &config())
        .await
        .unwrap();
    let _broker_b = accept(&mut accepted).await;
    let event = wait_for_event(&mut second).await;
    assert!(matches!(event, SessionEvent::RoomLoaded { room, .. } if room == ROOM_B));

    tokio::time::sleep(Duration::from_millis(300)).await;

    let bodies: Vec<String> = second.messages().into_iter().map(|m| m.body).collect();
    assert_eq!(bodies, vec!["from B"]);
    assert_eq!(second.room_name(), Some("fast"));
    // The aborted load never installed anything either.
    assert!(!store_a.is_history_loaded());
    assert!(store_a.is_empty());

    second.deactivate().await;
}

#[tokio::test]
async fn history_for_another_room_is_replaced_by_empty_history() {
    let api = Arc::new(FakeApi::default());
    // The backend answers a request for room B with room A's payload.
    let wrong = RoomDetails {
        id: ROOM_A,
        name: "wrong".to_string(),
        messages: vec![message(1, "misrouted")],
    };
    api.rooms.lock().insert(ROOM_B, (wrong, Duration::ZERO));

    let (connector, mut accepted) = LoopbackConnector::new(16);
    let mut session = RoomSession::activate(&signed_in(), ROOM_B, api, connector, &config())
        .await
        .unwrap();
    let broker = accept(&mut accepted).await;

    let event = wait_for_event(&mut session).await;
    assert_eq!(
        event,
        SessionEvent::Notice("Room history did not match this room".to_string())
    );
    assert!(session.is_loaded());
    assert_eq!(session.room_name(), None);

    // Live traffic for room B is still shown.
    broker.send(data_frame(&message(5, "live in B"))).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while session.store().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let bodies: Vec<String> = session.messages().into_iter().map(|m| m.body).collect();
    assert_eq!(bodies, vec!["live in B"]);
    session.deactivate().await;
}

#[tokio::test]
async fn activation_without_local_user_is_rejected() {
    let api = Arc::new(FakeApi::default().with_room(ROOM_A, "general", Vec::new(), Duration::ZERO));
    let (connector, mut accepted) = LoopbackConnector::new(16);

    let result = RoomSession::activate(&SessionScope::new(), ROOM_A, api, connector.clone(), &config()).await;

    assert!(matches!(result, Err(SessionError::NoIdentity)));
    assert_eq!(connector.connect_count(), 0);
    assert!(accepted.try_recv().is_err());
}

#[tokio::test]
async fn deactivate_releases_the_socket() {
    let api = Arc::new(FakeApi::default().with_room(ROOM_A, "general", Vec::new(), Duration::ZERO));
    let (connector, mut accepted) = LoopbackConnector::new(16);
    let session = RoomSession::activate(&signed_in(), ROOM_A, api, connector, &config())
        .await
        .unwrap();
    let mut broker = accept(&mut accepted).await;
    assert_eq!(session.status(), ConnectionStatus::Connected);
    assert!(broker.is_client_connected());

    session.deactivate().await;

    let closed = tokio::time::timeout(Duration::from_secs(5), broker.recv())
        .await
        .unwrap();
    assert!(closed.is_none());
    assert!(!broker.is_client_connected());
}
