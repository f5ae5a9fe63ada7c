//! Loopback transport for testing.
//!
//! Uses in-process [`tokio::sync::mpsc`] channels to stand in for the
//! broker. [`LoopbackConnector`] hands the broker side of every connection
//! it opens to the test through a channel, so a test can play the broker:
//! read the identify frame, push control and data frames, or drop the
//! connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};

use super::{Connector, FrameTransport, TransportError, TransportType};

/// Client side of an in-process connection.
pub struct LoopbackTransport {
    /// Sender toward the broker side. `None` once closed locally.
    tx: parking_lot::Mutex<Option<mpsc::Sender<String>>>,
    /// Frames pushed by the broker side.
    rx: Mutex<mpsc::Receiver<String>>,
    /// Set by [`FrameTransport::close`].
    closed: AtomicBool,
}

/// Broker side of an in-process connection.
///
/// Dropping it simulates the broker closing the socket.
pub struct BrokerEnd {
    /// Sender toward the client.
    tx: mpsc::Sender<String>,
    /// Frames sent by the client.
    rx: mpsc::Receiver<String>,
}

impl BrokerEnd {
    /// Push a frame to the client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionClosed`] if the client side is gone.
    pub async fn send(&self, frame: impl Into<String>) -> Result<(), TransportError> {
        self.tx
            .send(frame.into())
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Wait for the next frame the client sent. `None` once the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Return a frame the client already sent, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Whether the client side still holds the connection open.
    #[must_use]
    pub fn is_client_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl LoopbackTransport {
    /// Create a connected client/broker pair.
    ///
    /// `buffer` is the channel capacity in each direction.
    #[must_use]
    pub fn create_pair(buffer: usize) -> (Self, BrokerEnd) {
        let (to_broker, from_client) = mpsc::channel(buffer);
        let (to_client, from_broker) = mpsc::channel(buffer);

        let client = Self {
            tx: parking_lot::Mutex::new(Some(to_broker)),
            rx: Mutex::new(from_broker),
            closed: AtomicBool::new(false),
        };
        let broker = BrokerEnd {
            tx: to_client,
            rx: from_client,
        };
        (client, broker)
    }
}

impl FrameTransport for LoopbackTransport {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        let tx = self
            .tx
            .lock()
            .clone()
            .ok_or(TransportError::ConnectionClosed)?;
        tx.send(frame.to_string())
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn recv(&self) -> Result<String, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        let mut rx = self.rx.lock().await;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
            && self.tx.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.tx.lock().take();
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Loopback
    }
}

/// Connector that opens [`LoopbackTransport`]s.
///
/// Cloning shares the connection counter and the broker channel.
#[derive(Clone)]
pub struct LoopbackConnector {
    /// Where broker ends of new connections are delivered.
    accepted: mpsc::UnboundedSender<BrokerEnd>,
    /// Channel capacity for each new pair.
    buffer: usize,
    /// When set, `connect` fails as if nothing were listening.
    refusing: Arc<AtomicBool>,
    /// Number of successful connects so far.
    connects: Arc<AtomicUsize>,
}

impl LoopbackConnector {
    /// Create a connector and the receiver on which the test gets broker ends.
    #[must_use]
    pub fn new(buffer: usize) -> (Self, mpsc::UnboundedReceiver<BrokerEnd>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Self {
            accepted,
            buffer,
            refusing: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicUsize::new(0)),
        };
        (connector, rx)
    }

    /// Make subsequent connects fail (or succeed again).
    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::Release);
    }

    /// Number of transports opened so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }
}

impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self, endpoint: &str) -> Result<LoopbackTransport, TransportError> {
        if self.refusing.load(Ordering::Acquire) {
            return Err(TransportError::Unreachable(endpoint.to_string()));
        }
        let (client, broker) = LoopbackTransport::create_pair(self.buffer);
        self.accepted
            .send(broker)
            .map_err(|_| TransportError::Unreachable(endpoint.to_string()))?;
        self.connects.fetch_add(1, Ordering::AcqRel);
        Ok(client)
    }
}
