//! Room message synchronization.
//!
//! - [`subscription`] speaks the identify/subscribe handshake and sorts
//!   inbound frames into control traffic and chat messages.
//! - [`store`] holds the ordered, de-duplicated messages of one room.
//! - [`scroll`] decides how the viewport follows store changes.

pub mod scroll;
pub mod store;
pub mod subscription;

pub use scroll::{ScrollAction, ScrollController, ScrollMode, Viewport};
pub use store::{AppendOutcome, MessageStore, StoreChange, StoreError};
pub use subscription::{FrameOutcome, SubscriptionError, SubscriptionHandler};
