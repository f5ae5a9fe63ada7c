//! WebSocket transport to the pub/sub broker.
//!
//! Implements [`FrameTransport`] over a tokio-tungstenite client
//! connection. A background reader task forwards text frames into a channel
//! so that [`FrameTransport::recv`] never holds the socket itself.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{Connector, FrameTransport, TransportError, TransportType};

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Default timeout for opening the socket.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the inbound frame channel.
pub const DEFAULT_FRAME_BUFFER: usize = 256;

/// Connector producing [`WebSocketTransport`]s.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    /// Maximum time allowed for the TCP + WebSocket handshake.
    connect_timeout: Duration,
    /// Capacity of each transport's inbound frame channel.
    frame_buffer: usize,
}

impl WebSocketConnector {
    /// Create a connector with the given connect timeout.
    #[must_use]
    pub const fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            frame_buffer: DEFAULT_FRAME_BUFFER,
        }
    }

    /// Override the inbound frame channel capacity.
    #[must_use]
    pub const fn with_frame_buffer(mut self, frame_buffer: usize) -> Self {
        self.frame_buffer = frame_buffer;
        self
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn connect(&self, endpoint: &str) -> Result<WebSocketTransport, TransportError> {
        WebSocketTransport::connect(endpoint, self.connect_timeout, self.frame_buffer).await
    }
}

/// WebSocket connection to the broker.
pub struct WebSocketTransport {
    /// The endpoint this transport is connected to.
    endpoint: String,
    /// Write half of the WebSocket connection.
    ws_sender: Arc<Mutex<WsSender>>,
    /// Frames received by the background reader task.
    incoming: Mutex<mpsc::Receiver<String>>,
    /// Whether the connection is believed to be open.
    connected: Arc<AtomicBool>,
    /// Background reader task; aborted on close and on drop.
    reader_handle: tokio::task::JoinHandle<()>,
}

impl WebSocketTransport {
    /// Open a WebSocket connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidEndpoint`] if `endpoint` is not a `ws://` or `wss://` URL.
    /// - [`TransportError::Timeout`] if the handshake exceeds `connect_timeout`.
    /// - [`TransportError::Unreachable`] if nothing is listening.
    /// - [`TransportError::Io`] for TLS or HTTP upgrade failures.
    pub async fn connect(
        endpoint: &str,
        connect_timeout: Duration,
        frame_buffer: usize,
    ) -> Result<Self, TransportError> {
        validate_endpoint(endpoint)?;

        let (ws_stream, _response) = tokio::time::timeout(connect_timeout, connect_async(endpoint))
            .await
            .map_err(|_| {
                tracing::warn!(url = endpoint, "broker WebSocket connect timed out");
                TransportError::Timeout
            })?
            .map_err(|e| {
                tracing::warn!(url = endpoint, err = %e, "broker WebSocket connect failed");
                map_ws_connect_error(endpoint, e)
            })?;

        let (ws_sender, ws_reader) = ws_stream.split();

        let (tx, rx) = mpsc::channel(frame_buffer);
        let connected = Arc::new(AtomicBool::new(true));
        let reader_handle = tokio::spawn(reader_loop(ws_reader, tx, Arc::clone(&connected)));

        tracing::info!(url = endpoint, "connected to broker");

        Ok(Self {
            endpoint: endpoint.to_string(),
            ws_sender: Arc::new(Mutex::new(ws_sender)),
            incoming: Mutex::new(rx),
            connected,
            reader_handle,
        })
    }
}

impl FrameTransport for WebSocketTransport {
    async fn send(&self, frame: &str) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(TransportError::ConnectionClosed);
        }

        let mut sender = self.ws_sender.lock().await;
        sender
            .send(Message::Text(frame.to_string().into()))
            .await
            .map_err(|e| {
                tracing::warn!(url = %self.endpoint, err = %e, "broker send failed");
                self.connected.store(false, Ordering::Relaxed);
                TransportError::ConnectionClosed
            })
    }

    async fn recv(&self) -> Result<String, TransportError> {
        let mut rx = self.incoming.lock().await;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn close(&self) {
        if self.connected.swap(false, Ordering::Relaxed) {
            let mut sender = self.ws_sender.lock().await;
            if let Err(e) = sender.close().await {
                tracing::debug!(url = %self.endpoint, err = %e, "error while closing broker socket");
            }
            tracing::debug!(url = %self.endpoint, "broker socket closed");
        }
        self.reader_handle.abort();
    }

    fn transport_type(&self) -> TransportType {
        TransportType::WebSocket
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

/// Background task that forwards inbound text frames.
///
/// Binary frames are accepted when they hold UTF-8 text. Socket-level
/// ping/pong is answered by tungstenite itself. Sets `connected` to `false`
/// when the socket closes or errors out.
async fn reader_loop(mut ws_reader: WsReader, tx: mpsc::Sender<String>, connected: Arc<AtomicBool>) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if tx.send(text.as_str().to_owned()).await.is_err() {
                    // Transport dropped.
                    break;
                }
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => {
                    if tx.send(text).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(err = %e, "non UTF-8 binary frame from broker, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("broker closed the WebSocket");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(err = %e, "broker WebSocket read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    tracing::debug!("broker reader task exiting");
}

/// Reject anything that is not a `ws://` or `wss://` URL.
fn validate_endpoint(endpoint: &str) -> Result<(), TransportError> {
    let url = url::Url::parse(endpoint).map_err(|e| TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(TransportError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

/// Map a `tokio_tungstenite` connection error to a [`TransportError`].
fn map_ws_connect_error(
    endpoint: &str,
    err: tokio_tungstenite::tungstenite::Error,
) -> TransportError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::ConnectionRefused
                || io_err.kind() == std::io::ErrorKind::AddrNotAvailable
            {
                TransportError::Unreachable(endpoint.to_string())
            } else {
                TransportError::Io(io_err)
            }
        }
        WsError::Tls(_) => TransportError::Io(std::io::Error::other(format!("TLS error: {err}"))),
        WsError::Http(response) => TransportError::Io(std::io::Error::other(format!(
            "broker HTTP error: status {}",
            response.status()
        ))),
        other => TransportError::Io(std::io::Error::other(format!(
            "broker connection error: {other}"
        ))),
    }
}
