//! Periodic position sampler for UI updates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::engine::HandleId;

use super::session::PlaybackSession;
use super::status::PlaybackStatus;

/// Consumer of status snapshots.
pub type ReportCallback = Arc<Mutex<dyn Fn(PlaybackStatus) + Send>>;

/// Shared slot for the installed callback, swappable while samplers run.
pub(crate) type ReportSlot = Arc<Mutex<Option<ReportCallback>>>;

/// Background sampler bound to one handle.
///
/// Each tick copies the engine position into the session and forwards the
/// status to the callback when it changed. The sampler exits on its own once
/// its handle is no longer active.
#[derive(Clone)]
pub struct ProgressReporter {
    session: Arc<Mutex<PlaybackSession>>,
    handle: HandleId,
    report: ReportSlot,
    interval: Duration,
    finish: Arc<AtomicBool>,
    thread_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ProgressReporter {
    pub(crate) fn new(
        session: Arc<Mutex<PlaybackSession>>,
        handle: HandleId,
        report: ReportSlot,
        interval: Duration,
    ) -> Self {
        Self {
            session,
            handle,
            report,
            interval,
            finish: Arc::new(AtomicBool::new(false)),
            thread_handle: Arc::new(Mutex::new(None)),
        }
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    fn run(&self) {
        let mut last_report: Option<PlaybackStatus> = None;

        loop {
            if self.finish.load(Ordering::Relaxed) {
                break;
            }

            let status = {
                let mut session = self.session.lock().unwrap();
                if !session.sample_position(self.handle) {
                    log::debug!("sampler for {} exiting: handle released", self.handle);
                    break;
                }
                session.status()
            };

            if last_report.as_ref() != Some(&status) {
                let callback = self.report.lock().unwrap().clone();
                if let Some(callback) = callback {
                    (*callback.lock().unwrap())(status.clone());
                }
                last_report = Some(status);
            }

            thread::park_timeout(self.interval);
        }
    }

    /// Start the background sampling thread.
    pub fn start(&self) {
        self.stop();
        self.finish.store(false, Ordering::Relaxed);
        let this = self.clone();
        let handle = thread::spawn(move || this.run());
        *self.thread_handle.lock().unwrap() = Some(handle);
    }

    /// Stop the background sampling thread.
    pub fn stop(&self) {
        self.finish.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.lock().unwrap().take() {
            if handle.thread().id() == thread::current().id() {
                log::warn!("sampler stop called from sampler thread; skipping join");
            } else {
                handle.thread().unpark();
                if handle.join().is_err() {
                    log::warn!("sampler thread panicked during join");
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}
