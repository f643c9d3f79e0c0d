//! Thin façade over a [`MediaEngine`] that owns the one active handle.

use std::sync::mpsc::{self, Receiver, Sender};

use log::{debug, trace};

use super::{EngineEvent, HandleId, MediaEngine, ResolvedSource};
use crate::error::Result;

pub struct EngineAdapter {
    engine: Box<dyn MediaEngine>,
    events: Sender<EngineEvent>,
    active: Option<HandleId>,
    generation: u64,
    handles_opened: u64,
}

impl EngineAdapter {
    /// Wrap `engine`; the returned receiver gets every engine event.
    pub fn new(engine: Box<dyn MediaEngine>) -> (Self, Receiver<EngineEvent>) {
        let (events, receiver) = mpsc::channel();
        let adapter = Self {
            engine,
            events,
            active: None,
            generation: 0,
            handles_opened: 0,
        };
        (adapter, receiver)
    }

    pub fn resolve(&self, source_key: &str) -> Result<ResolvedSource> {
        self.engine.resolve(source_key)
    }

    /// Resolve and open `source_key`, replacing the active handle.
    pub fn load(&mut self, source_key: &str) -> Result<HandleId> {
        let source = self.resolve(source_key)?;
        self.load_resolved(&source)
    }

    /// Open an already resolved source.
    ///
    /// The previous handle is released before the new one is created, also
    /// when opening fails, so two handles never coexist.
    pub fn load_resolved(&mut self, source: &ResolvedSource) -> Result<HandleId> {
        self.release();

        self.generation += 1;
        let handle = HandleId::new(self.generation);
        self.engine.open(handle, source, self.events.clone())?;

        self.active = Some(handle);
        self.handles_opened += 1;
        debug!("opened handle {} for {}", handle, source.source_key);
        Ok(handle)
    }

    /// Stop and drop the active handle, if any.
    pub fn release(&mut self) {
        if let Some(handle) = self.active.take() {
            self.engine.release();
            debug!("released handle {}", handle);
        }
    }

    pub fn active_handle(&self) -> Option<HandleId> {
        self.active
    }

    pub fn is_active(&self, handle: HandleId) -> bool {
        self.active == Some(handle)
    }

    fn require_active(&self, op: &str) -> bool {
        if self.active.is_none() {
            trace!("{} ignored: no active handle", op);
            return false;
        }
        true
    }

    pub fn play(&mut self) {
        if self.require_active("play") {
            self.engine.play();
        }
    }

    pub fn pause(&mut self) {
        if self.require_active("pause") {
            self.engine.pause();
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        if self.require_active("seek") {
            self.engine.seek(seconds);
        }
    }

    /// Best-effort: engines may revert the rate later on their own.
    pub fn set_rate(&mut self, rate: f32) {
        if self.require_active("set_rate") {
            self.engine.set_rate(rate);
        }
    }

    pub fn rate(&self) -> Option<f32> {
        self.active.and_then(|_| self.engine.rate())
    }

    pub fn current_position(&self) -> f64 {
        match self.active {
            Some(_) => self.engine.position(),
            None => 0.0,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.active.and_then(|_| self.engine.duration())
    }

    /// Total number of handles ever opened.
    pub fn handles_opened(&self) -> u64 {
        self.handles_opened
    }

    /// Handles alive right now: zero or one.
    pub fn live_handles(&self) -> usize {
        usize::from(self.active.is_some())
    }
}

impl Drop for EngineAdapter {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scripted::ScriptedEngine;
    use crate::error::PlaybackError;

    #[test]
    fn loading_replaces_the_previous_handle() {
        let engine = ScriptedEngine::new().with_source("a", 10.0).with_source("b", 20.0);
        let remote = engine.remote();
        let (mut adapter, _events) = EngineAdapter::new(Box::new(engine));

        let first = adapter.load("a").expect("load a");
        let second = adapter.load("b").expect("load b");

        assert_ne!(first, second);
        assert!(adapter.is_active(second));
        assert!(!adapter.is_active(first));
        assert_eq!(adapter.live_handles(), 1);
        assert_eq!(remote.max_open_media(), 1);
        assert_eq!(adapter.duration(), Some(20.0));
    }

    #[test]
    fn failed_resolution_keeps_the_active_handle() {
        let engine = ScriptedEngine::new().with_source("a", 10.0);
        let (mut adapter, _events) = EngineAdapter::new(Box::new(engine));

        let handle = adapter.load("a").expect("load a");
        let err = adapter.load("missing").unwrap_err();

        assert!(matches!(err, PlaybackError::Resolution { .. }));
        assert!(adapter.is_active(handle));
    }

    #[test]
    fn controls_without_a_handle_are_ignored() {
        let engine = ScriptedEngine::new();
        let remote = engine.remote();
        let (mut adapter, _events) = EngineAdapter::new(Box::new(engine));

        adapter.play();
        adapter.seek(3.0);
        adapter.set_rate(2.0);

        assert_eq!(adapter.current_position(), 0.0);
        assert_eq!(adapter.rate(), None);
        assert_eq!(remote.play_requests(), 0);
    }
}
