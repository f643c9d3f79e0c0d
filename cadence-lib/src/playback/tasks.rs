//! Cancellable one-shot tasks run after a delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Runs a closure on its own thread once `delay` has passed, unless cancelled
/// first.
pub struct DelayedTask {
    cancelled: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DelayedTask {
    pub fn spawn<F>(delay: Duration, task: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let thread = thread::spawn(move || {
            let deadline = Instant::now() + delay;
            loop {
                if flag.load(Ordering::SeqCst) {
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::park_timeout(deadline - now);
            }
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });

        Self {
            cancelled,
            thread: Some(thread),
        }
    }

    /// Prevent the task from running if it has not started yet.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(thread) = &self.thread {
            thread.thread().unpark();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map(|thread| thread.is_finished())
            .unwrap_or(true)
    }

    /// Cancel and wait for the thread, unless called from it.
    pub fn cancel_and_join(mut self) {
        self.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                log::warn!("delayed task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn runs_after_the_delay() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = DelayedTask::spawn(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let deadline = Instant::now() + Duration::from_secs(2);
        while !task.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let task = DelayedTask::spawn(Duration::from_secs(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let started = Instant::now();
        task.cancel_and_join();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
