//! In-memory [`MediaEngine`] driven by hand.
//!
//! Useful for tests and for running the player without an audio device. A
//! [`ScriptedRemote`] shares the engine state so a test can end media, fail
//! playback, or revert the rate the way a real engine would, after the engine
//! itself has been moved into an adapter.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use super::{EngineEvent, HandleId, MediaEngine, ResolvedSource};
use crate::error::{PlaybackError, Result};

#[derive(Debug)]
struct OpenMedium {
    handle: HandleId,
    source_key: String,
    events: Sender<EngineEvent>,
    playing: bool,
    position: f64,
    rate: f32,
    duration: Option<f64>,
}

#[derive(Debug, Default)]
struct ScriptState {
    sources: HashMap<String, Option<f64>>,
    undecodable: HashSet<String>,
    open: Option<OpenMedium>,
    live: usize,
    max_live: usize,
    opens: u64,
    play_requests: u64,
    pause_requests: u64,
    seeks: Vec<f64>,
    rates: Vec<f32>,
    last_events: Option<Sender<EngineEvent>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolvable source with a known duration.
    pub fn with_source(self, source_key: &str, duration: f64) -> Self {
        self.state
            .lock()
            .unwrap()
            .sources
            .insert(source_key.to_string(), Some(duration));
        self
    }

    /// Register a resolvable source whose duration is reported later.
    pub fn with_unknown_duration(self, source_key: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .sources
            .insert(source_key.to_string(), None);
        self
    }

    /// Register a source that resolves but fails to open.
    pub fn with_undecodable(self, source_key: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .undecodable
            .insert(source_key.to_string());
        self
    }

    pub fn remote(&self) -> ScriptedRemote {
        ScriptedRemote {
            state: self.state.clone(),
        }
    }
}

impl MediaEngine for ScriptedEngine {
    fn resolve(&self, source_key: &str) -> Result<ResolvedSource> {
        let state = self.state.lock().unwrap();
        if state.sources.contains_key(source_key) || state.undecodable.contains(source_key) {
            return Ok(ResolvedSource {
                source_key: source_key.to_string(),
                path: PathBuf::from(source_key),
            });
        }
        Err(PlaybackError::Resolution {
            source_key: source_key.to_string(),
            reason: "not in script".to_string(),
        })
    }

    fn open(
        &mut self,
        handle: HandleId,
        source: &ResolvedSource,
        events: Sender<EngineEvent>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.undecodable.contains(&source.source_key) {
            return Err(PlaybackError::Decode {
                source_key: source.source_key.clone(),
                reason: "scripted decode failure".to_string(),
            });
        }
        let duration = state.sources.get(&source.source_key).copied().flatten();

        state.opens += 1;
        state.live += 1;
        state.max_live = state.max_live.max(state.live);
        state.last_events = Some(events.clone());
        state.open = Some(OpenMedium {
            handle,
            source_key: source.source_key.clone(),
            events,
            playing: false,
            position: 0.0,
            rate: 1.0,
            duration,
        });
        Ok(())
    }

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.open.take().is_some() {
            state.live -= 1;
        }
    }

    fn play(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.play_requests += 1;
        if let Some(open) = state.open.as_mut() {
            open.playing = true;
        }
    }

    fn pause(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.pause_requests += 1;
        if let Some(open) = state.open.as_mut() {
            open.playing = false;
        }
    }

    fn seek(&mut self, seconds: f64) {
        let mut state = self.state.lock().unwrap();
        state.seeks.push(seconds);
        if let Some(open) = state.open.as_mut() {
            let upper = open.duration.unwrap_or(f64::MAX);
            open.position = seconds.clamp(0.0, upper);
        }
    }

    fn set_rate(&mut self, rate: f32) {
        let mut state = self.state.lock().unwrap();
        state.rates.push(rate);
        if let Some(open) = state.open.as_mut() {
            open.rate = rate;
        }
    }

    fn rate(&self) -> Option<f32> {
        self.state.lock().unwrap().open.as_ref().map(|open| open.rate)
    }

    fn position(&self) -> f64 {
        self.state
            .lock()
            .unwrap()
            .open
            .as_ref()
            .map(|open| open.position)
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.state
            .lock()
            .unwrap()
            .open
            .as_ref()
            .and_then(|open| open.duration)
    }
}

/// Shared view of a [`ScriptedEngine`] for driving and inspecting it.
#[derive(Debug, Clone)]
pub struct ScriptedRemote {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedRemote {
    fn with_open<R>(&self, f: impl FnOnce(&mut OpenMedium) -> R) -> Option<R> {
        self.state.lock().unwrap().open.as_mut().map(f)
    }

    /// Report end-of-media for the open medium.
    pub fn finish(&self) -> Option<HandleId> {
        self.with_open(|open| {
            open.position = open.duration.unwrap_or(open.position);
            open.playing = false;
            let _ = open.events.send(EngineEvent::EndOfMedia(open.handle));
            open.handle
        })
    }

    /// Report a playback failure for the open medium.
    pub fn fail(&self, reason: &str) -> Option<HandleId> {
        self.with_open(|open| {
            open.playing = false;
            let _ = open.events.send(EngineEvent::PlaybackFailed {
                handle: open.handle,
                reason: reason.to_string(),
            });
            open.handle
        })
    }

    /// Report the duration of the open medium and remember it.
    pub fn announce_duration(&self, seconds: f64) -> Option<HandleId> {
        self.with_open(|open| {
            open.duration = Some(seconds);
            let _ = open.events.send(EngineEvent::DurationKnown {
                handle: open.handle,
                seconds,
            });
            open.handle
        })
    }

    /// Send an arbitrary event on the most recent event channel.
    ///
    /// Lets tests deliver late events for handles that are already gone.
    pub fn emit(&self, event: EngineEvent) {
        if let Some(events) = self.state.lock().unwrap().last_events.as_ref() {
            let _ = events.send(event);
        }
    }

    /// Drop back to 1.0x, as engines do when leaving a buffering state.
    pub fn reset_rate(&self) {
        self.with_open(|open| open.rate = 1.0);
    }

    pub fn set_position(&self, seconds: f64) {
        self.with_open(|open| open.position = seconds);
    }

    pub fn current_handle(&self) -> Option<HandleId> {
        self.with_open(|open| open.handle)
    }

    pub fn current_source(&self) -> Option<String> {
        self.with_open(|open| open.source_key.clone())
    }

    pub fn current_rate(&self) -> Option<f32> {
        self.with_open(|open| open.rate)
    }

    pub fn is_playing(&self) -> bool {
        self.with_open(|open| open.playing).unwrap_or(false)
    }

    pub fn position(&self) -> f64 {
        self.with_open(|open| open.position).unwrap_or(0.0)
    }

    pub fn opens(&self) -> u64 {
        self.state.lock().unwrap().opens
    }

    pub fn live_media(&self) -> usize {
        self.state.lock().unwrap().live
    }

    pub fn max_open_media(&self) -> usize {
        self.state.lock().unwrap().max_live
    }

    pub fn play_requests(&self) -> u64 {
        self.state.lock().unwrap().play_requests
    }

    pub fn pause_requests(&self) -> u64 {
        self.state.lock().unwrap().pause_requests
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().unwrap().seeks.clone()
    }

    pub fn rate_requests(&self) -> Vec<f32> {
        self.state.lock().unwrap().rates.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn finish_reports_end_of_media_for_the_open_handle() {
        let mut engine = ScriptedEngine::new().with_source("a", 4.0);
        let remote = engine.remote();
        let (tx, rx) = mpsc::channel();
        let source = engine.resolve("a").expect("resolve");
        engine.open(HandleId::new(7), &source, tx).expect("open");

        assert_eq!(remote.finish(), Some(HandleId::new(7)));
        assert_eq!(rx.try_recv(), Ok(EngineEvent::EndOfMedia(HandleId::new(7))));
        assert_eq!(remote.position(), 4.0);
    }

    #[test]
    fn seeks_clamp_to_known_duration() {
        let mut engine = ScriptedEngine::new().with_source("a", 4.0);
        let remote = engine.remote();
        let (tx, _rx) = mpsc::channel();
        let source = engine.resolve("a").expect("resolve");
        engine.open(HandleId::new(1), &source, tx).expect("open");

        engine.seek(9.0);
        assert_eq!(remote.position(), 4.0);
        engine.seek(-1.0);
        assert_eq!(remote.position(), 0.0);
    }
}
