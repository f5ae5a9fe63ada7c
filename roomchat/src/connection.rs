//! Connection manager: one pub/sub socket per room view.
//!
//! The manager owns the transport, performs the identify handshake through
//! a [`SubscriptionHandler`], and runs a background *pump* task that reads
//! frames, classifies them and forwards chat messages on a channel.
//!
//! ```text
//! broker ──frames──> pump task ──Message──> mpsc::Receiver (session)
//!                       │
//!                       └──status──> watch::Receiver (UI)
//! ```
//!
//! The message receiver is handed out once, by [`ConnectionManager::new`].
//! Reopening the socket reuses the same channel, so downstream code never
//! re-registers.
//!
//! Transport failures are not retried here. They surface as
//! [`ConnectionStatus::Disconnected`]; a reconnect is a full
//! [`open`](ConnectionManager::open) with a fresh subscription handle.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use roomchat_proto::cable::SubscriptionHandle;
use roomchat_proto::model::Message;

use crate::chat::subscription::{FrameOutcome, SubscriptionError, SubscriptionHandler};
use crate::transport::{Connector, FrameTransport, TransportError};

/// Connectivity as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Never opened.
    Idle,
    /// Opening the socket and identifying.
    Connecting,
    /// Identified and receiving.
    Connected,
    /// The socket failed or was closed by the broker.
    Disconnected,
    /// Closed locally.
    Closed,
}

impl ConnectionStatus {
    /// Whether live messages are currently flowing.
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Connected => "Online",
            Self::Disconnected => "Offline",
            Self::Closed => "Closed",
        };
        f.write_str(text)
    }
}

/// Errors returned by the connection manager.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The socket could not be opened.
    #[error("failed to connect: {0}")]
    Connect(#[source] TransportError),

    /// The identify handshake failed.
    #[error("subscription failed: {0}")]
    Subscribe(#[from] SubscriptionError),

    /// No live socket.
    #[error("not connected")]
    NotConnected,

    /// A frame could not be sent.
    #[error("send failed: {0}")]
    Send(#[source] TransportError),
}

/// The currently open socket.
struct LiveConnection<T> {
    /// Shared with the pump task.
    transport: Arc<T>,
    /// Protocol state for this socket.
    handler: Arc<SubscriptionHandler>,
    /// Background reader.
    pump: tokio::task::JoinHandle<()>,
}

impl<T: FrameTransport> LiveConnection<T> {
    fn is_alive(&self) -> bool {
        self.transport.is_connected() && !self.pump.is_finished()
    }

    /// Stop the pump, then release the transport.
    async fn shutdown(self) {
        self.pump.abort();
        // Wait so that a pump mid-iteration cannot publish a status after us.
        let _ = self.pump.await;
        self.transport.close().await;
    }
}

/// Owns the pub/sub socket of one room view.
pub struct ConnectionManager<C: Connector> {
    /// Opens transports.
    connector: C,
    /// The open socket, if any.
    live: Option<LiveConnection<C::Transport>>,
    /// Where classified chat messages go.
    inbound_tx: mpsc::Sender<Message>,
    /// Connectivity publisher.
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager and the receiver for inbound chat messages.
    ///
    /// `buffer` is the capacity of the message channel.
    pub fn new(connector: C, buffer: usize) -> (Self, mpsc::Receiver<Message>) {
        let (inbound_tx, inbound_rx) = mpsc::channel(buffer);
        let (status_tx, _) = watch::channel(ConnectionStatus::Idle);
        let manager = Self {
            connector,
            live: None,
            inbound_tx,
            status_tx: Arc::new(status_tx),
        };
        (manager, inbound_rx)
    }

    /// Current connectivity.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    /// Subscribe to connectivity changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Handle of the open socket.
    #[must_use]
    pub fn handle(&self) -> Option<SubscriptionHandle> {
        self.live.as_ref().map(|live| live.handler.handle().clone())
    }

    /// Whether a socket is open and its pump is running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.live.as_ref().is_some_and(LiveConnection::is_alive)
    }

    /// Open the socket to `endpoint` and identify.
    ///
    /// If a live socket already exists its handle is returned and nothing
    /// new is opened. A dead socket is released and replaced.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::Connect`] if the transport cannot be opened.
    /// - [`ConnectionError::Subscribe`] if the identify frame cannot be sent.
    ///
    /// Either way the status becomes [`ConnectionStatus::Disconnected`].
    pub async fn open(&mut self, endpoint: &str) -> Result<SubscriptionHandle, ConnectionError> {
        if let Some(live) = self.live.as_ref().filter(|live| live.is_alive()) {
            let handle = live.handler.handle().clone();
            tracing::debug!(handle = %handle, "socket already open, not opening another");
            return Ok(handle);
        }
        if let Some(dead) = self.live.take() {
            dead.shutdown().await;
        }

        self.status_tx.send_replace(ConnectionStatus::Connecting);

        let transport = match self.connector.connect(endpoint).await {
            Ok(transport) => Arc::new(transport),
            Err(e) => {
                tracing::warn!(url = endpoint, error = %e, "could not open broker socket");
                self.status_tx.send_replace(ConnectionStatus::Disconnected);
                return Err(ConnectionError::Connect(e));
            }
        };

        let handler = Arc::new(SubscriptionHandler::new());
        if let Err(e) = handler.identify(transport.as_ref()).await {
            tracing::warn!(url = endpoint, error = %e, "identify failed");
            transport.close().await;
            self.status_tx.send_replace(ConnectionStatus::Disconnected);
            return Err(e.into());
        }

        let handle = handler.handle().clone();
        self.status_tx.send_replace(ConnectionStatus::Connected);

        let pump = tokio::spawn(pump(
            Arc::clone(&transport),
            Arc::clone(&handler),
            self.inbound_tx.clone(),
            Arc::clone(&self.status_tx),
        ));

        tracing::info!(
            url = endpoint,
            handle = %handle,
            transport = %transport.transport_type(),
            "subscribed to messages channel"
        );

        self.live = Some(LiveConnection {
            transport,
            handler,
            pump,
        });
        Ok(handle)
    }

    /// Close whatever is open and open again with a fresh handle.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub async fn reconnect(&mut self, endpoint: &str) -> Result<SubscriptionHandle, ConnectionError> {
        if let Some(live) = self.live.take() {
            live.shutdown().await;
        }
        self.open(endpoint).await
    }

    /// Send one raw frame on the open socket.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::NotConnected`] without an open socket.
    /// - [`ConnectionError::Send`] if the transport rejects the frame.
    pub async fn send(&self, frame: &str) -> Result<(), ConnectionError> {
        let live = self.live.as_ref().ok_or(ConnectionError::NotConnected)?;
        live.transport.send(frame).await.map_err(ConnectionError::Send)
    }

    /// Release the socket. The status becomes [`ConnectionStatus::Closed`].
    pub async fn close(&mut self) {
        if let Some(live) = self.live.take() {
            let handle = live.handler.handle().clone();
            live.shutdown().await;
            tracing::info!(handle = %handle, "broker socket closed");
        }
        self.status_tx.send_replace(ConnectionStatus::Closed);
    }
}

impl<C: Connector> Drop for ConnectionManager<C> {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.pump.abort();
        }
    }
}

/// Background task: read frames until the transport fails.
async fn pump<T: FrameTransport>(
    transport: Arc<T>,
    handler: Arc<SubscriptionHandler>,
    inbound: mpsc::Sender<Message>,
    status: Arc<watch::Sender<ConnectionStatus>>,
) {
    loop {
        match transport.recv().await {
            Ok(text) => {
                let FrameOutcome::Message(message) = handler.handle_frame(&text) else {
                    continue;
                };
                if inbound.send(message).await.is_err() {
                    tracing::debug!(handle = %handler.handle(), "message receiver dropped, stopping pump");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(handle = %handler.handle(), error = %e, "broker connection lost");
                status.send_replace(ConnectionStatus::Disconnected);
                return;
            }
        }
    }
}
