//! Transport controller: the public playback surface.
//!
//! All session mutation happens behind one mutex. Follow-up work for a
//! transition (delayed speed re-apply, restarting the position sampler) runs
//! after that lock is released, so background tasks can take it themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::catalog::{Catalog, TrackDescriptor, TrackId};
use crate::engine::{EngineAdapter, EngineEvent, HandleId, MediaEngine};
use crate::error::Result;

use super::progress::{ProgressReporter, ReportCallback, ReportSlot};
use super::session::{PlaybackSession, Transition};
use super::settings::TransportSettings;
use super::status::PlaybackStatus;
use super::tasks::DelayedTask;

/// Handle to a running transport.
///
/// Clones share one session. Dropping the last clone shuts the transport
/// down. A report callback that captures a clone keeps it alive until
/// [`Transport::shutdown`] is called.
#[derive(Clone)]
pub struct Transport {
    shared: Shared,
    _teardown: Arc<Teardown>,
}

/// State reachable from background threads. Holding it does not keep the
/// transport alive.
#[derive(Clone)]
struct Shared {
    catalog: Arc<Catalog>,
    session: Arc<Mutex<PlaybackSession>>,
    settings: TransportSettings,
    report: ReportSlot,
    sampler: Arc<Mutex<Option<ProgressReporter>>>,
    speed_tasks: Arc<Mutex<Vec<(HandleId, DelayedTask)>>>,
    closed: Arc<AtomicBool>,
    pump_abort: Arc<AtomicBool>,
    pump: Arc<Mutex<Option<JoinHandle<()>>>>,
}

struct Teardown(Shared);

impl Drop for Teardown {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

impl Transport {
    /// Build a transport over `catalog` and start its event pump.
    ///
    /// Nothing plays until [`Transport::play`] or [`Transport::autoplay`].
    pub fn new(catalog: Catalog, engine: Box<dyn MediaEngine>, settings: TransportSettings) -> Self {
        let catalog = Arc::new(catalog);
        let (adapter, events) = EngineAdapter::new(engine);
        let session = PlaybackSession::new(catalog.clone(), adapter);

        let shared = Shared {
            catalog,
            session: Arc::new(Mutex::new(session)),
            settings,
            report: Arc::new(Mutex::new(None)),
            sampler: Arc::new(Mutex::new(None)),
            speed_tasks: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            pump_abort: Arc::new(AtomicBool::new(false)),
            pump: Arc::new(Mutex::new(None)),
        };

        let this = shared.clone();
        let pump = thread::spawn(move || this.pump_events(events));
        *shared.pump.lock().unwrap() = Some(pump);

        Self {
            _teardown: Arc::new(Teardown(shared.clone())),
            shared,
        }
    }

    pub fn list_tracks(&self) -> &[TrackDescriptor] {
        self.shared.catalog.tracks()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.shared.catalog
    }

    /// Play `id`, or re-assert its speed when it is already playing.
    pub fn play(&self, id: &TrackId) -> Result<()> {
        let result = self.shared.session.lock().unwrap().select_track(id);
        self.shared.settle(result)
    }

    /// Start the first track, as happens right after the library loads.
    ///
    /// An empty catalog leaves the transport idle.
    pub fn autoplay(&self) -> Result<()> {
        let Some(first) = self.shared.catalog.first() else {
            info!("catalog is empty; nothing to autoplay");
            return Ok(());
        };
        self.play(&first.id)
    }

    /// Pause or resume. Returns false when there is nothing to toggle.
    pub fn toggle_play_pause(&self) -> bool {
        let transition = self.shared.session.lock().unwrap().toggle_play_pause();
        match transition {
            Some(transition) => {
                self.shared.follow_up(transition);
                true
            }
            None => false,
        }
    }

    /// Seek to `seconds`, clamped to the track.
    pub fn seek_to(&self, seconds: f64) -> bool {
        let mut session = self.shared.session.lock().unwrap();
        let target = clamp_target(&session, seconds);
        session.seek(target)
    }

    /// Seek relative to the last known position.
    pub fn seek_by(&self, delta: f64) -> bool {
        let mut session = self.shared.session.lock().unwrap();
        let target = clamp_target(&session, session.position() + delta);
        session.seek(target)
    }

    pub fn next(&self) -> Result<()> {
        let result = self.shared.session.lock().unwrap().next();
        self.shared.settle(result)
    }

    pub fn previous(&self) -> Result<()> {
        let result = self.shared.session.lock().unwrap().previous();
        self.shared.settle(result)
    }

    pub fn current_status(&self) -> PlaybackStatus {
        self.shared.session.lock().unwrap().status()
    }

    /// Install the consumer of periodic status snapshots.
    pub fn set_reporting(&self, callback: ReportCallback) {
        *self.shared.report.lock().unwrap() = Some(callback);
    }

    /// Stop background work and release the engine handle.
    ///
    /// Later calls, including the one made on drop, do nothing.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }
}

impl Shared {
    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.pump_abort.store(true, Ordering::SeqCst);
        let pump = self.pump.lock().unwrap().take();
        if let Some(pump) = pump {
            if pump.thread().id() == thread::current().id() {
                warn!("shutdown called from the event pump; skipping join");
            } else if pump.join().is_err() {
                warn!("event pump panicked during join");
            }
        }

        let tasks: Vec<_> = self.speed_tasks.lock().unwrap().drain(..).collect();
        for (_, task) in tasks {
            task.cancel_and_join();
        }
        let sampler = self.sampler.lock().unwrap().take();
        if let Some(sampler) = sampler {
            sampler.stop();
        }
        self.session.lock().unwrap().shutdown();
        info!("transport shut down");
    }

    fn settle(&self, result: Result<Transition>) -> Result<()> {
        match result {
            Ok(transition) => {
                self.follow_up(transition);
                Ok(())
            }
            Err(err) => {
                self.realign();
                Err(err)
            }
        }
    }

    fn follow_up(&self, transition: Transition) {
        debug!("transition {:?}", transition);
        match transition {
            Transition::Started(handle) | Transition::Resumed(handle) => {
                self.align_speed_tasks(Some(handle))
            }
            Transition::Stopped => self.align_speed_tasks(None),
            Transition::Reasserted(_) | Transition::Paused(_) => {}
        }
        self.realign_sampler();
    }

    /// Bring background work in line with the session after a failed call.
    fn realign(&self) {
        self.align_speed_tasks(None);
        self.realign_sampler();
    }

    /// Make sure exactly one sampler runs, bound to the active handle.
    fn realign_sampler(&self) {
        let old = {
            let mut sampler = self.sampler.lock().unwrap();
            let active = self.session.lock().unwrap().active_handle();
            if sampler.as_ref().map(|current| current.handle()) == active {
                return;
            }

            let old = sampler.take();
            if let Some(handle) = active {
                let reporter = ProgressReporter::new(
                    self.session.clone(),
                    handle,
                    self.report.clone(),
                    self.settings.progress_interval,
                );
                reporter.start();
                debug!("sampler started for {}", handle);
                *sampler = Some(reporter);
            }
            old
        };

        // Joined outside the lock: the old sampler may be inside a callback
        // that calls back into the transport.
        if let Some(old) = old {
            old.stop();
        }
    }

    /// Cancel re-apply tasks for anything but the active handle, then
    /// schedule a fresh set for `reapply` if it is still the active one.
    ///
    /// Transitions reach here from several threads in no fixed order, so the
    /// active handle is read while the task list is locked.
    fn align_speed_tasks(&self, reapply: Option<HandleId>) {
        let stale = {
            let mut tasks = self.speed_tasks.lock().unwrap();
            let active = self.session.lock().unwrap().active_handle();
            let (kept, stale): (Vec<_>, Vec<_>) = tasks
                .drain(..)
                .filter(|(_, task)| !task.is_finished())
                .partition(|(handle, _)| Some(*handle) == active);
            *tasks = kept;

            match reapply {
                Some(handle) if Some(handle) == active => {
                    for delay in &self.settings.speed_settle_delays {
                        let session = self.session.clone();
                        let task = DelayedTask::spawn(*delay, move || {
                            session.lock().unwrap().reapply_speed(handle);
                        });
                        tasks.push((handle, task));
                    }
                }
                Some(handle) => debug!("not scheduling speed re-apply for stale handle {}", handle),
                None => {}
            }
            stale
        };

        for (handle, task) in stale {
            debug!("cancelling speed re-apply for {}", handle);
            task.cancel();
        }
    }

    fn pump_events(&self, events: Receiver<EngineEvent>) {
        while !self.pump_abort.load(Ordering::SeqCst) {
            match events.recv_timeout(self.settings.event_poll_interval) {
                Ok(event) => {
                    let transition = self.session.lock().unwrap().handle_event(event);
                    if let Some(transition) = transition {
                        self.follow_up(transition);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("event pump stopped");
    }
}

fn clamp_target(session: &PlaybackSession, seconds: f64) -> f64 {
    let target = if seconds.is_nan() { 0.0 } else { seconds.max(0.0) };
    if session.duration_known() {
        target.min(session.duration())
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::speed_for_token;
    use crate::engine::scripted::{ScriptedEngine, ScriptedRemote};
    use crate::playback::session::SessionState;
    use std::time::{Duration, Instant};

    fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    fn track(id: &str, token: u32) -> TrackDescriptor {
        TrackDescriptor::new(id, id.to_uppercase(), format!("{}.mp3", id), speed_for_token(token))
            .with_token(token)
    }

    fn settings() -> TransportSettings {
        TransportSettings::default()
            .with_progress_interval(Duration::from_millis(10))
            .with_speed_settle_delays(vec![Duration::from_millis(100)])
            .with_event_poll_interval(Duration::from_millis(5))
    }

    fn transport(tracks: Vec<TrackDescriptor>, settings: TransportSettings) -> (Transport, ScriptedRemote) {
        let mut engine = ScriptedEngine::new();
        for track in &tracks {
            engine = engine.with_source(&track.source_key, 60.0);
        }
        let remote = engine.remote();
        let catalog = Catalog::new(tracks).expect("catalog");
        (Transport::new(catalog, Box::new(engine), settings), remote)
    }

    fn selected(transport: &Transport) -> Option<TrackId> {
        transport.current_status().selected
    }

    #[test]
    fn autoplay_cycles_through_the_recitations() {
        let (transport, remote) =
            transport(vec![track("a", 1), track("b", 30), track("c", 59)], settings());

        transport.autoplay().expect("autoplay");
        assert_eq!(selected(&transport), Some(TrackId::from("a")));
        assert_eq!(remote.current_rate(), Some(2.0));

        for (next, speed) in [("b", 1.5), ("c", 1.5), ("a", 2.0)] {
            let before = remote.current_handle();
            remote.finish();
            assert!(wait_until(|| remote.current_handle() != before
                && selected(&transport) == Some(TrackId::from(next))));
            let status = transport.current_status();
            assert!(status.is_playing);
            assert_eq!(status.speed, Some(speed));
            assert_eq!(remote.current_rate(), Some(speed));
        }
        assert_eq!(remote.max_open_media(), 1);
        transport.shutdown();
    }

    #[test]
    fn play_unknown_track_is_an_error() {
        let (transport, _remote) = transport(vec![track("a", 1)], settings());

        let err = transport.play(&TrackId::from("zzz")).unwrap_err();

        assert!(matches!(err, crate::error::PlaybackError::UnknownTrack(_)));
        assert_eq!(transport.current_status().state, SessionState::Idle);
        transport.shutdown();
    }

    #[test]
    fn empty_catalog_is_a_no_op() {
        let (transport, remote) = transport(Vec::new(), settings());

        transport.autoplay().expect("autoplay");
        assert!(!transport.toggle_play_pause());
        assert!(!transport.seek_to(3.0));
        assert!(transport.next().is_err());
        assert_eq!(remote.opens(), 0);
        transport.shutdown();
    }

    #[test]
    fn seek_is_clamped_to_the_track() {
        let (transport, remote) = transport(vec![track("a", 1)], settings());
        transport.autoplay().expect("autoplay");

        assert!(transport.seek_to(500.0));
        assert!(transport.seek_to(-3.0));
        assert!(transport.seek_to(20.0));

        assert_eq!(remote.seeks(), vec![60.0, 0.0, 20.0]);
        let status = transport.current_status();
        assert!(status.is_playing);
        assert_eq!(status.position, 20.0);
        transport.shutdown();
    }

    #[test]
    fn seek_by_moves_relative_to_position() {
        let (transport, remote) = transport(vec![track("a", 1)], settings());
        transport.autoplay().expect("autoplay");
        transport.seek_to(30.0);

        transport.seek_by(10.0);
        transport.seek_by(-50.0);

        assert_eq!(remote.seeks(), vec![30.0, 40.0, 0.0]);
        transport.shutdown();
    }

    #[test]
    fn delayed_reapply_restores_a_reverted_rate() {
        let (transport, remote) = transport(vec![track("b", 30)], settings());
        transport.autoplay().expect("autoplay");

        remote.reset_rate();
        assert_eq!(remote.current_rate(), Some(1.0));

        assert!(wait_until(|| remote.current_rate() == Some(1.5)));
        transport.shutdown();
    }

    #[test]
    fn track_change_cancels_delayed_reapply() {
        let slow = settings().with_speed_settle_delays(vec![Duration::from_millis(150)]);
        let (transport, remote) = transport(vec![track("a", 1), track("b", 30)], slow);

        transport.play(&TrackId::from("b")).expect("play b");
        transport.play(&TrackId::from("a")).expect("play a");
        thread::sleep(Duration::from_millis(300));

        assert_eq!(remote.current_rate(), Some(2.0));
        assert_eq!(remote.rate_requests(), vec![1.5, 2.0]);
        transport.shutdown();
    }

    #[test]
    fn out_of_order_follow_ups_keep_the_active_reapply() {
        let (transport, remote) = transport(vec![track("a", 1), track("b", 30)], settings());
        transport.play(&TrackId::from("a")).expect("play a");
        let first = remote.current_handle().expect("first handle");
        transport.play(&TrackId::from("b")).expect("play b");
        let second = remote.current_handle().expect("second handle");

        transport.shared.follow_up(Transition::Started(second));
        transport.shared.follow_up(Transition::Started(first));
        remote.reset_rate();

        assert!(wait_until(|| remote.current_rate() == Some(1.5)));
        assert_eq!(remote.current_handle(), Some(second));
        transport.shutdown();
    }

    #[test]
    fn default_settle_delays_apply_twice() {
        let (transport, remote) = transport(vec![track("b", 30)], TransportSettings::default());
        let started = Instant::now();
        transport.autoplay().expect("autoplay");

        thread::sleep(Duration::from_millis(150).saturating_sub(started.elapsed()));
        remote.reset_rate();

        assert!(wait_until(|| remote.current_rate() == Some(1.5)));
        assert!(started.elapsed() < Duration::from_millis(600));
        assert_eq!(remote.rate_requests(), vec![1.5, 1.5]);
        transport.shutdown();
    }

    #[test]
    fn seek_passes_through_while_duration_is_unknown() {
        let engine = ScriptedEngine::new().with_unknown_duration("a.mp3");
        let remote = engine.remote();
        let catalog = Catalog::new(vec![track("a", 1)]).expect("catalog");
        let transport = Transport::new(catalog, Box::new(engine), settings());
        transport.autoplay().expect("autoplay");

        assert!(transport.seek_to(500.0));

        assert_eq!(remote.seeks(), vec![500.0]);
        assert_eq!(transport.current_status().position, 500.0);
        transport.shutdown();
    }

    #[test]
    fn resume_reapplies_speed() {
        let (transport, remote) = transport(vec![track("c", 59)], settings());
        transport.autoplay().expect("autoplay");

        assert!(transport.toggle_play_pause());
        assert!(!transport.current_status().is_playing);
        assert!(transport.toggle_play_pause());
        remote.reset_rate();

        assert!(wait_until(|| remote.current_rate() == Some(1.5)));
        assert!(transport.current_status().is_playing);
        transport.shutdown();
    }

    #[test]
    fn reporter_publishes_sampled_positions() {
        let (transport, remote) = transport(vec![track("a", 1)], settings());
        let positions: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = positions.clone();
        transport.set_reporting(Arc::new(Mutex::new(move |status: PlaybackStatus| {
            sink.lock().unwrap().push(status.position);
        })));

        transport.autoplay().expect("autoplay");
        remote.set_position(12.0);

        assert!(wait_until(|| positions.lock().unwrap().contains(&12.0)));
        assert_eq!(transport.current_status().position, 12.0);
        transport.shutdown();
    }

    #[test]
    fn stale_end_of_media_does_not_advance() {
        let (transport, remote) = transport(vec![track("a", 1), track("b", 30)], settings());
        transport.autoplay().expect("autoplay");
        let stale = remote.current_handle().expect("handle");

        transport.play(&TrackId::from("b")).expect("play b");
        remote.emit(EngineEvent::EndOfMedia(stale));
        thread::sleep(Duration::from_millis(50));

        assert_eq!(selected(&transport), Some(TrackId::from("b")));
        assert_eq!(remote.opens(), 2);
        transport.shutdown();
    }

    #[test]
    fn reselecting_the_playing_track_keeps_the_handle() {
        let (transport, remote) = transport(vec![track("a", 1)], settings());
        transport.autoplay().expect("autoplay");
        remote.set_position(5.0);
        assert!(wait_until(|| transport.current_status().position == 5.0));

        transport.play(&TrackId::from("a")).expect("reselect");

        assert_eq!(remote.opens(), 1);
        assert_eq!(transport.current_status().position, 5.0);
        transport.shutdown();
    }

    #[test]
    fn shutdown_releases_everything() {
        let (transport, remote) = transport(vec![track("a", 1)], settings());
        transport.autoplay().expect("autoplay");

        transport.shutdown();

        assert_eq!(remote.live_media(), 0);
        assert_eq!(transport.current_status().state, SessionState::Idle);
    }

    #[test]
    fn dropping_the_last_clone_shuts_down() {
        let (transport, remote) = transport(vec![track("a", 1)], settings());
        transport.autoplay().expect("autoplay");
        let clone = transport.clone();

        drop(transport);
        assert_eq!(remote.live_media(), 1);
        assert!(clone.current_status().is_playing);

        drop(clone);
        assert_eq!(remote.live_media(), 0);
    }
}
