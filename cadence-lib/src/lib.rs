//! # Cadence Library
//!
//! Sequential track playback for the Cadence player. A catalog of tracks is
//! played in order with per-track speeds, advancing to the next track when one
//! finishes and wrapping after the last.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod playback;
mod probe;
