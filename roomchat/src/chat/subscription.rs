//! Identify/subscribe handshake and inbound frame classification.
//!
//! One [`SubscriptionHandler`] exists per opened transport. It owns the
//! [`SubscriptionHandle`] generated for that transport and refuses to
//! identify twice, so a socket can never carry two subscriptions.
//!
//! Malformed frames are a protocol error: they are logged and dropped, and
//! the caller keeps reading. Nothing about them reaches the user.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use roomchat_proto::cable::{self, ControlFrame, FrameError, InboundFrame, SubscriptionHandle};
use roomchat_proto::model::Message;

use crate::transport::{FrameTransport, TransportError};

/// Errors raised while identifying on a transport.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// The identify frame could not be built.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The identify frame could not be sent.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// This handler already identified on its transport.
    #[error("subscription {0} already identified")]
    AlreadyIdentified(SubscriptionHandle),
}

/// What became of one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Control traffic, ignored.
    Control(ControlFrame),
    /// A chat message to append to the store.
    Message(Message),
    /// A malformed frame that was skipped.
    Dropped,
}

/// Speaks the channel protocol for one transport.
#[derive(Debug)]
pub struct SubscriptionHandler {
    /// Correlation token for this transport.
    handle: SubscriptionHandle,
    /// Set once the identify frame went out.
    identified: AtomicBool,
    /// Number of frames dropped as malformed.
    dropped: AtomicU64,
}

impl SubscriptionHandler {
    /// Create a handler with a freshly generated handle.
    #[must_use]
    pub fn new() -> Self {
        Self::with_handle(SubscriptionHandle::generate())
    }

    /// Create a handler for an existing handle.
    #[must_use]
    pub const fn with_handle(handle: SubscriptionHandle) -> Self {
        Self {
            handle,
            identified: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// The handle this handler identifies with.
    #[must_use]
    pub const fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Whether the identify frame has been sent.
    #[must_use]
    pub fn is_identified(&self) -> bool {
        self.identified.load(Ordering::Acquire)
    }

    /// Number of malformed frames dropped so far.
    #[must_use]
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Send the identify frame on `transport`.
    ///
    /// Sent once, immediately; the handler does not wait for the broker's
    /// `welcome` or `confirm_subscription` before the caller starts reading.
    ///
    /// # Errors
    ///
    /// - [`SubscriptionError::AlreadyIdentified`] on a second call.
    /// - [`SubscriptionError::Frame`] / [`SubscriptionError::Transport`] if
    ///   the frame cannot be built or sent. The handler stays marked as
    ///   identified; the transport should be reopened with a new handler.
    pub async fn identify<T: FrameTransport>(&self, transport: &T) -> Result<(), SubscriptionError> {
        if self.identified.swap(true, Ordering::AcqRel) {
            return Err(SubscriptionError::AlreadyIdentified(self.handle.clone()));
        }
        let frame = cable::encode_identify(&self.handle)?;
        transport.send(&frame).await?;
        tracing::debug!(handle = %self.handle, "sent identify frame");
        Ok(())
    }

    /// Classify one inbound text frame.
    pub fn handle_frame(&self, text: &str) -> FrameOutcome {
        match cable::decode_inbound(text) {
            Ok(InboundFrame::Control(control)) => {
                tracing::trace!(handle = %self.handle, ?control, "control frame");
                FrameOutcome::Control(control)
            }
            Ok(InboundFrame::Data(message)) => {
                tracing::debug!(handle = %self.handle, message_id = %message.id, "data frame");
                FrameOutcome::Message(message)
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(handle = %self.handle, error = %e, "dropping malformed frame");
                FrameOutcome::Dropped
            }
        }
    }
}

impl Default for SubscriptionHandler {
    fn default() -> Self {
        Self::new()
    }
}
