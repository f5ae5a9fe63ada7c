//! Socket transport abstraction for `RoomChat`.
//!
//! Defines the [`FrameTransport`] trait that carries JSON text frames to and
//! from the pub/sub broker, and the [`Connector`] trait that opens one.
//! Concrete implementations:
//! - [`websocket::WebSocketConnector`]: tokio-tungstenite client
//! - [`loopback::LoopbackConnector`]: in-process channels for testing

pub mod loopback;
pub mod websocket;

use std::fmt;

/// Describes which kind of transport is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportType {
    /// WebSocket connection to the broker.
    WebSocket,
    /// In-process loopback for testing.
    Loopback,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebSocket => write!(f, "WebSocket"),
            Self::Loopback => write!(f, "Loopback"),
        }
    }
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection has been closed by either side.
    #[error("connection closed")]
    ConnectionClosed,

    /// The operation timed out before completing.
    #[error("transport operation timed out")]
    Timeout,

    /// Nothing accepted the connection at the endpoint.
    #[error("endpoint {0} is unreachable")]
    Unreachable(String),

    /// The endpoint is not a usable socket URL.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An underlying I/O error occurred.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A bidirectional channel of text frames.
///
/// Implementations never interpret frame contents; classification happens
/// in [`crate::chat::subscription`].
pub trait FrameTransport: Send + Sync {
    /// Send one text frame.
    ///
    /// `Ok(())` means the frame was handed to the underlying socket, not
    /// that the broker processed it.
    fn send(&self, frame: &str) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;

    /// Receive the next text frame.
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the connection is gone.
    fn recv(&self) -> impl std::future::Future<Output = Result<String, TransportError>> + Send;

    /// Whether the connection is still believed to be open.
    fn is_connected(&self) -> bool;

    /// Release the underlying connection. Idempotent.
    fn close(&self) -> impl std::future::Future<Output = ()> + Send;

    /// Return the type of this transport.
    fn transport_type(&self) -> TransportType;
}

/// Opens transports to a broker endpoint.
pub trait Connector: Send + Sync {
    /// The transport produced by this connector.
    type Transport: FrameTransport + 'static;

    /// Open a new connection to `endpoint`.
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl std::future::Future<Output = Result<Self::Transport, TransportError>> + Send;
}
