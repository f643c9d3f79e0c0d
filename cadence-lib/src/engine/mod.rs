//! Media engine seam and the adapter that owns the single active handle.
//!
//! The engine reports asynchronous lifecycle changes on an mpsc channel. Every
//! event carries the [`HandleId`] it came from so consumers can drop events
//! from handles that have since been released.

mod adapter;
mod rodio_engine;
pub mod scripted;

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::mpsc::Sender;

pub use adapter::EngineAdapter;
pub use rodio_engine::RodioEngine;

use crate::error::Result;

/// Generation number of a loaded media handle. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    pub fn new(generation: u64) -> Self {
        Self(generation)
    }

    pub fn generation(&self) -> u64 {
        self.0
    }
}

impl Display for HandleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Out-of-band notifications from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    EndOfMedia(HandleId),
    PlaybackFailed { handle: HandleId, reason: String },
    DurationKnown { handle: HandleId, seconds: f64 },
}

impl EngineEvent {
    pub fn handle(&self) -> HandleId {
        match self {
            Self::EndOfMedia(handle) => *handle,
            Self::PlaybackFailed { handle, .. } => *handle,
            Self::DurationKnown { handle, .. } => *handle,
        }
    }
}

/// A source key after resolution, ready to be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub source_key: String,
    pub path: PathBuf,
}

/// The external media engine driven by [`EngineAdapter`].
///
/// Implementations hold at most one open medium. Control calls are requests:
/// they must not block on the engine confirming them.
pub trait MediaEngine: Send {
    /// Check that `source_key` names a playable resource without opening it.
    fn resolve(&self, source_key: &str) -> Result<ResolvedSource>;

    /// Open `source` for `handle`. Events for this medium go to `events`.
    fn open(
        &mut self,
        handle: HandleId,
        source: &ResolvedSource,
        events: Sender<EngineEvent>,
    ) -> Result<()>;

    /// Stop and drop the open medium, if any.
    fn release(&mut self);

    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    fn set_rate(&mut self, rate: f32);

    /// Rate the engine currently applies, when it can report one.
    fn rate(&self) -> Option<f32>;

    fn position(&self) -> f64;
    fn duration(&self) -> Option<f64>;
}
