//! `RoomChat`: terminal client for real-time chat rooms.
//!
//! The interesting part is the synchronization layer: a [`connection`]
//! manager owning one pub/sub socket per room view, the [`chat`] message
//! store that merges REST history with the live stream, and the
//! [`session`] that binds both to a room and a local participant.

pub mod api;
pub mod app;
pub mod chat;
pub mod config;
pub mod connection;
pub mod identity;
pub mod session;
pub mod transport;
pub mod ui;
