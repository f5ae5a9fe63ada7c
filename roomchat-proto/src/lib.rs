//! Shared data model and wire format for `RoomChat`.
//!
//! [`model`] holds the REST-side types (messages, participants, rooms and
//! request bodies); [`cable`] holds the pub/sub socket frames.

pub mod cable;
pub mod model;
