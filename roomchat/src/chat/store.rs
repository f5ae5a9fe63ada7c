//! In-memory message store for one room.
//!
//! The store merges the REST history with the live stream:
//!
//! 1. It starts *awaiting history*. Live arrivals during this phase are
//!    buffered in arrival order and are not visible.
//! 2. [`MessageStore::load_history`] installs the history, then replays the
//!    buffered arrivals behind it.
//! 3. From then on every [`MessageStore::append`] lands at the tail.
//!
//! Every mutation runs through one reducer under a single lock, so an
//! append always extends the latest state rather than a stale snapshot.
//! Identifiers already present (in history, in the buffer, or from an
//! earlier live arrival) are ignored.
//!
//! # Invariants
//!
//! - The visible sequence is in arrival order and holds no duplicate ids.
//! - The visible sequence only grows.
//! - History for another room is rejected.

use std::collections::HashSet;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use roomchat_proto::model::{Message, MessageId, RoomId};

/// Errors raised by the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// History arrived for a room other than the one the store belongs to.
    #[error("history for room {got} cannot be loaded into the store of room {expected}")]
    StaleRoom {
        /// Room the store belongs to.
        expected: RoomId,
        /// Room the history came from.
        got: RoomId,
    },

    /// History was already loaded; loading again would drop live arrivals.
    #[error("history already loaded for room {0}")]
    HistoryAlreadyLoaded(RoomId),
}

/// Change notification sent to observers after each visible mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// History was installed with `count` messages.
    HistoryLoaded {
        /// Number of messages in the installed history.
        count: usize,
    },
    /// One message was appended at the tail.
    Appended {
        /// Identifier of the appended message.
        id: MessageId,
    },
}

/// Result of [`MessageStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The message is now visible at the tail.
    Appended,
    /// History is not loaded yet; the message waits in the buffer.
    Buffered,
    /// A message with the same id is already present; nothing changed.
    Duplicate,
}

/// Mutable state behind the store lock.
#[derive(Debug, Default)]
struct StoreState {
    /// Visible messages in arrival order.
    messages: Vec<Message>,
    /// Ids of visible and buffered messages.
    ids: HashSet<MessageId>,
    /// Live arrivals waiting for history. `None` once history is loaded.
    pending: Option<Vec<Message>>,
    /// Change observers; closed receivers are pruned on the next notify.
    observers: Vec<mpsc::UnboundedSender<StoreChange>>,
}

impl StoreState {
    fn new() -> Self {
        Self {
            pending: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Install history and replay the buffer, collecting visible changes.
    fn load_history(
        &mut self,
        room: RoomId,
        history: Vec<Message>,
        changes: &mut Vec<StoreChange>,
    ) -> Result<(), StoreError> {
        let Some(pending) = self.pending.take() else {
            return Err(StoreError::HistoryAlreadyLoaded(room));
        };

        self.ids.clear();
        self.messages = Vec::with_capacity(history.len() + pending.len());
        for message in history {
            if self.ids.insert(message.id) {
                self.messages.push(message);
            }
        }
        changes.push(StoreChange::HistoryLoaded {
            count: self.messages.len(),
        });

        for message in pending {
            if self.ids.insert(message.id) {
                changes.push(StoreChange::Appended { id: message.id });
                self.messages.push(message);
            }
        }
        Ok(())
    }

    /// Append or buffer one live arrival, collecting visible changes.
    fn append(&mut self, message: Message, changes: &mut Vec<StoreChange>) -> AppendOutcome {
        if !self.ids.insert(message.id) {
            return AppendOutcome::Duplicate;
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.push(message);
            return AppendOutcome::Buffered;
        }
        changes.push(StoreChange::Appended { id: message.id });
        self.messages.push(message);
        AppendOutcome::Appended
    }

    fn notify(&mut self, changes: &[StoreChange]) {
        if changes.is_empty() {
            return;
        }
        self.observers
            .retain(|observer| changes.iter().all(|change| observer.send(*change).is_ok()));
    }
}

/// Ordered, de-duplicated messages of one room.
///
/// Shared between the history task, the connection pump and the UI behind
/// an `Arc`; all methods take `&self`.
#[derive(Debug)]
pub struct MessageStore {
    /// Room this store belongs to.
    room: RoomId,
    /// Reducer state.
    state: Mutex<StoreState>,
}

impl MessageStore {
    /// Create an empty store awaiting history for `room`.
    #[must_use]
    pub fn new(room: RoomId) -> Self {
        Self {
            room,
            state: Mutex::new(StoreState::new()),
        }
    }

    /// Room this store belongs to.
    #[must_use]
    pub const fn room(&self) -> RoomId {
        self.room
    }

    /// Register an observer.
    ///
    /// The receiver gets one [`StoreChange`] per visible mutation, in
    /// mutation order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StoreChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().observers.push(tx);
        rx
    }

    /// Install the room history, then replay buffered live arrivals.
    ///
    /// Returns the number of visible messages afterwards.
    ///
    /// # Errors
    ///
    /// - [`StoreError::StaleRoom`] if `room` is not this store's room.
    /// - [`StoreError::HistoryAlreadyLoaded`] on a second call.
    pub fn load_history(&self, room: RoomId, history: Vec<Message>) -> Result<usize, StoreError> {
        if room != self.room {
            tracing::warn!(expected = %self.room, got = %room, "discarding stale history");
            return Err(StoreError::StaleRoom {
                expected: self.room,
                got: room,
            });
        }
        let mut state = self.state.lock();
        apply(&mut state, |state, changes| state.load_history(room, history, changes))?;
        tracing::debug!(room_id = %self.room, len = state.messages.len(), "history loaded");
        Ok(state.messages.len())
    }

    /// Append one live arrival.
    pub fn append(&self, message: Message) -> AppendOutcome {
        apply(&mut self.state.lock(), |state, changes| state.append(message, changes))
    }

    /// Copy of the visible sequence.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.state.lock().messages.clone()
    }

    /// Number of visible messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Whether no message is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().messages.is_empty()
    }

    /// Whether history has been installed.
    #[must_use]
    pub fn is_history_loaded(&self) -> bool {
        self.state.lock().pending.is_none()
    }

    /// Number of live arrivals waiting for history.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.state.lock().pending.as_ref().map_or(0, Vec::len)
    }
}

/// Run one reducer step and notify observers while the lock is held, so
/// notifications are delivered in mutation order.
fn apply<R>(state: &mut StoreState, step: impl FnOnce(&mut StoreState, &mut Vec<StoreChange>) -> R) -> R {
    let mut changes = Vec::new();
    let result = step(state, &mut changes);
    state.notify(&changes);
    result
}
