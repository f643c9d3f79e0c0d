//! Playback session state machine.
//!
//! The session decides what should be playing: it owns the selection, the
//! playing flag, position and duration, and the engine adapter holding the one
//! active handle. Every method is synchronous and expects to be called from a
//! single owner context (the transport serialises callers behind one mutex).
//! Work that has to happen later, such as re-applying the speed after a settle
//! delay or sampling the position, is described by the returned [`Transition`]
//! and scheduled by the caller.

use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::catalog::{Catalog, TrackDescriptor, TrackId};
use crate::engine::{EngineAdapter, EngineEvent, HandleId};
use crate::error::{PlaybackError, Result};

use super::status::PlaybackStatus;

/// Duration reported before the engine knows the real one.
pub const DURATION_SENTINEL: f64 = 1.0;

const RATE_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing selected.
    Idle,
    /// Handle created, not yet asked to play.
    Loading,
    Playing,
    Paused,
    /// Selection kept for display; its handle is gone until someone reselects.
    Failed,
}

/// What a state change did to the active handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// A new handle was created and asked to play.
    Started(HandleId),
    /// The playing track was selected again; its speed was re-applied.
    Reasserted(HandleId),
    Paused(HandleId),
    Resumed(HandleId),
    /// The active handle was released.
    Stopped,
}

pub struct PlaybackSession {
    catalog: Arc<Catalog>,
    adapter: EngineAdapter,
    state: SessionState,
    selected: Option<TrackId>,
    is_playing: bool,
    position: f64,
    duration: f64,
    duration_known: bool,
    last_error: Option<String>,
}

impl PlaybackSession {
    pub fn new(catalog: Arc<Catalog>, adapter: EngineAdapter) -> Self {
        Self {
            catalog,
            adapter,
            state: SessionState::Idle,
            selected: None,
            is_playing: false,
            position: 0.0,
            duration: DURATION_SENTINEL,
            duration_known: false,
            last_error: None,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selected(&self) -> Option<&TrackId> {
        self.selected.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// False while the duration is still the sentinel.
    pub fn duration_known(&self) -> bool {
        self.duration_known
    }

    pub fn active_handle(&self) -> Option<HandleId> {
        self.adapter.active_handle()
    }

    pub fn handles_opened(&self) -> u64 {
        self.adapter.handles_opened()
    }

    pub fn live_handles(&self) -> usize {
        self.adapter.live_handles()
    }

    fn selected_track(&self) -> Option<&TrackDescriptor> {
        self.selected.as_ref().and_then(|id| self.catalog.get(id))
    }

    fn lookup(&self, id: &TrackId) -> Result<TrackDescriptor> {
        if self.catalog.is_empty() {
            return Err(PlaybackError::EmptyCatalog);
        }
        self.catalog
            .get(id)
            .cloned()
            .ok_or_else(|| PlaybackError::UnknownTrack(id.clone()))
    }

    /// Select `id` and start it.
    ///
    /// Selecting the track that is already playing keeps its handle and
    /// position and only re-applies its speed.
    pub fn select_track(&mut self, id: &TrackId) -> Result<Transition> {
        let track = self.lookup(id)?;

        if self.is_playing && self.selected.as_ref() == Some(&track.id) {
            if let Some(handle) = self.adapter.active_handle() {
                self.adapter.set_rate(track.speed);
                debug!("reasserted {} at {}x on {}", track.id, track.speed, handle);
                return Ok(Transition::Reasserted(handle));
            }
        }

        self.start(&track)
    }

    /// Release whatever is loaded and start `track` from the beginning.
    fn start(&mut self, track: &TrackDescriptor) -> Result<Transition> {
        // A bad key must leave the current handle untouched.
        let source = match self.adapter.resolve(&track.source_key) {
            Ok(source) => source,
            Err(err) => {
                warn!("cannot select {}: {}", track.id, err);
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        self.selected = Some(track.id.clone());
        self.is_playing = false;
        self.position = 0.0;
        self.duration = DURATION_SENTINEL;
        self.duration_known = false;
        self.state = SessionState::Loading;

        let handle = match self.adapter.load_resolved(&source) {
            Ok(handle) => handle,
            Err(err) => {
                error!("failed to open {}: {}", track.id, err);
                self.state = SessionState::Failed;
                self.last_error = Some(err.to_string());
                return Err(err);
            }
        };

        self.adapter.set_rate(track.speed);
        if let Some(seconds) = self.adapter.duration().filter(|seconds| *seconds > 0.0) {
            self.duration = seconds;
            self.duration_known = true;
        }

        self.adapter.play();
        self.is_playing = true;
        self.state = SessionState::Playing;
        self.last_error = None;

        info!(
            "playing {} ({}) at {}x on {}",
            track.display_name, track.id, track.speed, handle
        );
        Ok(Transition::Started(handle))
    }

    /// Apply an engine event. Events from released handles are dropped.
    pub fn handle_event(&mut self, event: EngineEvent) -> Option<Transition> {
        if !self.adapter.is_active(event.handle()) {
            debug!("dropping stale event {:?}", event);
            return None;
        }

        match event {
            EngineEvent::EndOfMedia(handle) => self.on_end_of_media(handle),
            EngineEvent::PlaybackFailed { handle, reason } => {
                Some(self.on_playback_failed(handle, &reason))
            }
            EngineEvent::DurationKnown { seconds, .. } => {
                if seconds > 0.0 {
                    self.duration = seconds;
                    self.duration_known = true;
                }
                None
            }
        }
    }

    /// Advance to the next track in catalog order, wrapping after the last.
    pub fn on_end_of_media(&mut self, handle: HandleId) -> Option<Transition> {
        if !self.adapter.is_active(handle) {
            debug!("ignoring end of media for stale handle {}", handle);
            return None;
        }

        // The medium is over; the next start is a restart even when the
        // catalog holds a single track.
        self.is_playing = false;
        let next = self
            .selected
            .as_ref()
            .and_then(|id| self.catalog.next_after(id))
            .cloned()?;

        debug!("end of media on {}, advancing to {}", handle, next.id);
        match self.start(&next) {
            Ok(transition) => Some(transition),
            Err(err) => {
                // Stop the chain here; a human reselecting is the recovery.
                self.adapter.release();
                self.selected = Some(next.id.clone());
                self.state = SessionState::Failed;
                warn!("auto-advance stopped at {}: {}", next.id, err);
                Some(Transition::Stopped)
            }
        }
    }

    fn on_playback_failed(&mut self, handle: HandleId, reason: &str) -> Transition {
        error!("playback failed on {}: {}", handle, reason);
        self.adapter.release();
        self.is_playing = false;
        self.state = SessionState::Failed;
        self.last_error = Some(PlaybackError::Engine(reason.to_string()).to_string());
        Transition::Stopped
    }

    /// Pause when playing, resume when paused; otherwise do nothing.
    pub fn toggle_play_pause(&mut self) -> Option<Transition> {
        let handle = self.adapter.active_handle();
        match (self.state, handle) {
            (SessionState::Playing, Some(handle)) => {
                self.adapter.pause();
                self.is_playing = false;
                self.state = SessionState::Paused;
                debug!("paused {}", handle);
                Some(Transition::Paused(handle))
            }
            (SessionState::Paused, Some(handle)) => {
                self.adapter.play();
                self.is_playing = true;
                self.state = SessionState::Playing;
                debug!("resumed {}", handle);
                Some(Transition::Resumed(handle))
            }
            (state, _) => {
                debug!("toggle ignored in {:?}", state);
                None
            }
        }
    }

    /// Ask the engine to seek. Only valid while playing or paused.
    ///
    /// Negative targets become zero; targets past the end are left to the
    /// engine.
    pub fn seek(&mut self, target: f64) -> bool {
        if !matches!(self.state, SessionState::Playing | SessionState::Paused) {
            debug!("seek ignored in {:?}", self.state);
            return false;
        }
        let target = if target.is_nan() { 0.0 } else { target.max(0.0) };
        self.adapter.seek(target);
        self.position = target;
        true
    }

    /// Re-apply the selected track's speed to `handle`.
    ///
    /// Stale handles are ignored. When the engine can report its rate and it
    /// already matches, nothing is sent.
    pub fn reapply_speed(&mut self, handle: HandleId) -> bool {
        if !self.adapter.is_active(handle) {
            debug!("skipping speed re-apply for stale handle {}", handle);
            return false;
        }
        let Some(speed) = self.selected_track().map(|track| track.speed) else {
            return false;
        };

        match self.adapter.rate() {
            Some(rate) if (rate - speed).abs() < RATE_TOLERANCE => {
                debug!("rate {}x confirmed on {}", rate, handle);
                false
            }
            reported => {
                if let Some(rate) = reported {
                    debug!("rate drifted to {}x on {}, restoring {}x", rate, handle, speed);
                }
                self.adapter.set_rate(speed);
                true
            }
        }
    }

    /// Copy the engine position into the session.
    pub fn sample_position(&mut self, handle: HandleId) -> bool {
        if !self.adapter.is_active(handle) {
            return false;
        }
        self.position = self.adapter.current_position().max(0.0);
        if !self.duration_known {
            if let Some(seconds) = self.adapter.duration().filter(|seconds| *seconds > 0.0) {
                self.duration = seconds;
                self.duration_known = true;
            }
        }
        true
    }

    /// Start the track after the selection, or the first track when idle.
    pub fn next(&mut self) -> Result<Transition> {
        let target = match self.selected.as_ref() {
            Some(id) => self.catalog.next_after(id),
            None => self.catalog.first(),
        }
        .cloned()
        .ok_or(PlaybackError::EmptyCatalog)?;
        self.start(&target)
    }

    /// Start the track before the selection, or the first track when idle.
    pub fn previous(&mut self) -> Result<Transition> {
        let target = match self.selected.as_ref() {
            Some(id) => self.catalog.previous_before(id),
            None => self.catalog.first(),
        }
        .cloned()
        .ok_or(PlaybackError::EmptyCatalog)?;
        self.start(&target)
    }

    pub fn status(&self) -> PlaybackStatus {
        let track = self.selected_track();
        PlaybackStatus {
            selected: self.selected.clone(),
            selected_name: track.map(|track| track.display_name.clone()),
            state: self.state,
            is_playing: self.is_playing,
            position: self.position,
            duration: self.duration,
            speed: track.map(|track| track.speed),
            last_error: self.last_error.clone(),
        }
    }

    /// Release the handle and return to idle.
    pub fn shutdown(&mut self) {
        self.adapter.release();
        self.state = SessionState::Idle;
        self.selected = None;
        self.is_playing = false;
        self.position = 0.0;
        self.duration = DURATION_SENTINEL;
        self.duration_known = false;
    }
}
