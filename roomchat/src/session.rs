//! Room session: everything that lives while one room is on screen.
//!
//! [`RoomSession::activate`] binds a room and the local participant to a
//! fresh [`MessageStore`], [`ConnectionManager`] and [`ScrollController`]:
//!
//! 1. resolve the local identity (fail fast without one),
//! 2. spawn the history fetch,
//! 3. open the broker socket and identify,
//! 4. spawn the task that appends live arrivals to the store.
//!
//! History and socket run in parallel; the store buffers live arrivals
//! until history lands. [`RoomSession::deactivate`] aborts the history
//! fetch, closes the socket, then drops the store, so a slow response for
//! this room can never reach the next room's store.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use roomchat_proto::cable::SubscriptionHandle;
use roomchat_proto::model::{Message, NewMessage, Participant, RoomId, ValidationError};

use crate::api::{ApiError, ChatApi};
use crate::chat::scroll::{ScrollAction, ScrollController, ScrollMode, Viewport};
use crate::chat::store::{AppendOutcome, MessageStore, StoreChange};
use crate::connection::{ConnectionError, ConnectionManager, ConnectionStatus};
use crate::identity::SessionScope;
use crate::transport::Connector;

/// Errors raised by a room session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No local participant is recorded; select one first.
    #[error("no local user selected")]
    NoIdentity,

    /// Input was rejected before any request was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The backend rejected or failed a request.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The broker socket failed.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Something the UI should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Room metadata and history arrived.
    RoomLoaded {
        /// Room identifier.
        room: RoomId,
        /// Display name.
        name: String,
        /// Visible messages after the load.
        messages: usize,
    },
    /// A user-visible notice.
    Notice(String),
}

/// Settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Broker socket URL.
    pub ws_url: String,
    /// Capacity of the inbound message channel.
    pub channel_capacity: usize,
}

/// State bound to one room while it is displayed.
pub struct RoomSession<A: ChatApi + 'static, C: Connector> {
    room: RoomId,
    participant: Participant,
    api: Arc<A>,
    store: Arc<MessageStore>,
    changes: mpsc::UnboundedReceiver<StoreChange>,
    scroll: ScrollController,
    connection: ConnectionManager<C>,
    endpoint: String,
    room_name: Option<String>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    history_task: JoinHandle<()>,
    inbound_task: JoinHandle<()>,
}

impl<A: ChatApi + 'static, C: Connector> RoomSession<A, C> {
    /// Activate a session for `room`.
    ///
    /// A socket that cannot be opened does not fail activation: the status
    /// stays [`ConnectionStatus::Disconnected`], a notice is queued, and
    /// [`reconnect`](Self::reconnect) can be tried later.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NoIdentity`] if `scope` holds no local
    /// participant. Nothing is fetched or opened in that case.
    pub async fn activate(
        scope: &SessionScope,
        room: RoomId,
        api: Arc<A>,
        connector: C,
        config: &SessionConfig,
    ) -> Result<Self, SessionError> {
        let Some(participant) = scope.resolve_participant() else {
            tracing::warn!(room_id = %room, "activation without a local user");
            return Err(SessionError::NoIdentity);
        };

        let store = Arc::new(MessageStore::new(room));
        let changes = store.subscribe();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let history_task = tokio::spawn(load_history(
            Arc::clone(&api),
            room,
            Arc::clone(&store),
            events_tx.clone(),
        ));

        let (mut connection, inbound_rx) = ConnectionManager::new(connector, config.channel_capacity);
        let inbound_task = tokio::spawn(append_arrivals(inbound_rx, Arc::clone(&store)));

        if let Err(e) = connection.open(&config.ws_url).await {
            let _ = events_tx.send(SessionEvent::Notice(format!(
                "Offline: could not subscribe to live messages ({e})"
            )));
        }

        tracing::info!(room_id = %room, user_id = %participant.id, "room session active");

        Ok(Self {
            room,
            participant,
            api,
            store,
            changes,
            scroll: ScrollController::new(),
            connection,
            endpoint: config.ws_url.clone(),
            room_name: None,
            events_tx,
            events_rx,
            history_task,
            inbound_task,
        })
    }

    /// The bound room.
    #[must_use]
    pub const fn room(&self) -> RoomId {
        self.room
    }

    /// The local participant.
    #[must_use]
    pub const fn participant(&self) -> &Participant {
        &self.participant
    }

    /// Room display name, once metadata has loaded.
    #[must_use]
    pub fn room_name(&self) -> Option<&str> {
        self.room_name.as_deref()
    }

    /// The room's message store.
    #[must_use]
    pub const fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// Copy of the visible messages.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.store.snapshot()
    }

    /// Whether room history has been installed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.store.is_history_loaded()
    }

    /// Current viewport follow mode.
    #[must_use]
    pub const fn scroll_mode(&self) -> ScrollMode {
        self.scroll.mode()
    }

    /// Broker connectivity.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Subscribe to broker connectivity changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.watch_status()
    }

    /// Handle of the current subscription, if a socket is open.
    #[must_use]
    pub fn subscription_handle(&self) -> Option<SubscriptionHandle> {
        self.connection.handle()
    }

    /// Next pending UI event, if any.
    pub fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.events_rx.try_recv().ok()?;
        if let SessionEvent::RoomLoaded { name, .. } = &event {
            self.room_name = Some(name.clone());
        }
        Some(event)
    }

    /// Drain pending store changes and move `viewport` for each of them.
    ///
    /// Returns the actions taken. Without a viewport the changes are
    /// consumed and nothing moves.
    pub fn follow_changes(
        &mut self,
        mut viewport: Option<&mut (dyn Viewport + '_)>,
    ) -> Vec<ScrollAction> {
        let mut actions = Vec::new();
        while let Ok(change) = self.changes.try_recv() {
            tracing::trace!(room_id = %self.room, ?change, "store change");
            if let Some(action) = self.scroll.on_store_change(viewport.as_deref_mut()) {
                actions.push(action);
            }
        }
        actions
    }

    /// Post a message as the local participant.
    ///
    /// The message shows up through the live stream, not from this call.
    /// On success the viewport switches to animated following; changes
    /// already queued at that point, such as an echo that beat the
    /// response, still jump.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Validation`] for a blank body; nothing is sent.
    /// - [`SessionError::Api`] if the backend rejects the post.
    pub async fn send_message(&mut self, body: &str) -> Result<(), SessionError> {
        let message = NewMessage::new(body, self.participant.id, self.room)?;
        self.api.post_message(&message).await?;
        self.scroll.on_local_send(self.changes.len());
        tracing::debug!(room_id = %self.room, "message posted");
        Ok(())
    }

    /// Re-open the broker socket with a fresh subscription handle.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connection`] if the socket cannot be opened.
    pub async fn reconnect(&mut self) -> Result<SubscriptionHandle, SessionError> {
        tracing::info!(room_id = %self.room, "manual reconnect");
        match self.connection.reconnect(&self.endpoint).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                let _ = self
                    .events_tx
                    .send(SessionEvent::Notice(format!("Reconnect failed: {e}")));
                Err(e.into())
            }
        }
    }

    /// Tear the session down.
    pub async fn deactivate(mut self) {
        self.history_task.abort();
        self.connection.close().await;
        self.inbound_task.abort();
        tracing::info!(room_id = %self.room, messages = self.store.len(), "room session closed");
    }
}

impl<A: ChatApi + 'static, C: Connector> Drop for RoomSession<A, C> {
    fn drop(&mut self) {
        self.history_task.abort();
        self.inbound_task.abort();
    }
}

/// Fetch the room and install its history.
///
/// When no usable history arrives (failed fetch, or a response for another
/// room) a notice is queued and an empty history is installed so that live
/// messages become visible.
async fn load_history<A: ChatApi>(
    api: Arc<A>,
    room: RoomId,
    store: Arc<MessageStore>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let notice = match api.fetch_room(room).await {
        Ok(details) => match store.load_history(details.id, details.messages) {
            Ok(messages) => {
                let _ = events.send(SessionEvent::RoomLoaded {
                    room,
                    name: details.name,
                    messages,
                });
                return;
            }
            Err(e) => {
                tracing::warn!(room_id = %room, error = %e, "history not installed");
                "Room history did not match this room".to_string()
            }
        },
        Err(e) if e.is_not_found() => {
            tracing::warn!(room_id = %room, "room not found");
            "Room not found; showing live messages only".to_string()
        }
        Err(e) => {
            tracing::warn!(room_id = %room, error = %e, "failed to fetch room");
            format!("Could not load room history: {e}")
        }
    };
    if let Err(e) = store.load_history(room, Vec::new()) {
        tracing::debug!(room_id = %room, error = %e, "empty history not installed");
    }
    let _ = events.send(SessionEvent::Notice(notice));
}

/// Move live arrivals from the connection into the store.
async fn append_arrivals(mut inbound: mpsc::Receiver<Message>, store: Arc<MessageStore>) {
    while let Some(message) = inbound.recv().await {
        let id = message.id;
        match store.append(message) {
            AppendOutcome::Duplicate => {
                tracing::debug!(room_id = %store.room(), message_id = %id, "duplicate arrival ignored");
            }
            outcome => tracing::trace!(room_id = %store.room(), message_id = %id, ?outcome, "arrival"),
        }
    }
}
