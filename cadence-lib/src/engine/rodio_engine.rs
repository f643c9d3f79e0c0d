//! [`MediaEngine`] backed by a rodio output stream.
//!
//! The output stream lives on its own thread for the lifetime of the engine.
//! Each opened medium gets a fresh sink plus a watcher thread that reports
//! end-of-media for that handle and exits when the medium is released.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, warn};
use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use super::{EngineEvent, HandleId, MediaEngine, ResolvedSource};
use crate::error::{PlaybackError, Result};
use crate::probe;

const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;
const WATCH_INTERVAL_MS: u64 = 20;

/// Keeps the (non-`Send`) output stream alive on a dedicated thread.
struct OutputThread {
    mixer: Mixer,
    _shutdown: Sender<()>,
}

impl OutputThread {
    fn open() -> Result<Self> {
        let (mixer_tx, mixer_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::spawn(move || match open_output_stream_with_retry() {
            Some(stream) => {
                if mixer_tx.send(Ok(stream.mixer().clone())).is_err() {
                    return;
                }
                // Returns once the engine drops its sender.
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("output stream closed");
            }
            None => {
                let _ = mixer_tx.send(Err(PlaybackError::OutputUnavailable(
                    "no default output device".to_string(),
                )));
            }
        });

        let mixer = mixer_rx.recv().map_err(|_| {
            PlaybackError::OutputUnavailable("output thread exited early".to_string())
        })??;

        Ok(Self {
            mixer,
            _shutdown: shutdown_tx,
        })
    }
}

/// Open the default output stream with bounded retry behavior.
fn open_output_stream_with_retry() -> Option<OutputStream> {
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Some(stream),
            Err(err) => {
                if attempt == OUTPUT_STREAM_OPEN_RETRIES {
                    error!(
                        "failed to open default output stream after {} attempts: {}",
                        OUTPUT_STREAM_OPEN_RETRIES, err
                    );
                    return None;
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    None
}

/// One opened medium and its end-of-media watcher.
struct RodioMedium {
    handle: HandleId,
    sink: Arc<Mutex<Sink>>,
    duration: Option<f64>,
    abort: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl RodioMedium {
    fn stop(mut self) {
        self.abort.store(true, Ordering::SeqCst);
        self.sink.lock().unwrap().stop();
        if let Some(watcher) = self.watcher.take() {
            if watcher.join().is_err() {
                warn!("watcher for handle {} panicked", self.handle);
            }
        }
    }
}

pub struct RodioEngine {
    root: Option<PathBuf>,
    output: OutputThread,
    current: Option<RodioMedium>,
}

impl RodioEngine {
    /// Open the default output device.
    ///
    /// Relative source keys are resolved against `root` when given.
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            root,
            output: OutputThread::open()?,
            current: None,
        })
    }

    fn path_for(&self, source_key: &str) -> PathBuf {
        let path = Path::new(source_key);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn with_sink<R>(&self, f: impl FnOnce(&Sink) -> R) -> Option<R> {
        self.current
            .as_ref()
            .map(|medium| f(&medium.sink.lock().unwrap()))
    }
}

fn spawn_watcher(
    handle: HandleId,
    sink: Arc<Mutex<Sink>>,
    abort: Arc<AtomicBool>,
    probe_path: Option<PathBuf>,
    events: Sender<EngineEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Some(path) = probe_path {
            if let Some(seconds) = probe::read_duration(&path) {
                let _ = events.send(EngineEvent::DurationKnown { handle, seconds });
            }
        }

        loop {
            if abort.load(Ordering::SeqCst) {
                return;
            }
            let empty = sink.lock().unwrap().empty();
            if empty {
                debug!("handle {} reached end of media", handle);
                let _ = events.send(EngineEvent::EndOfMedia(handle));
                return;
            }
            thread::sleep(Duration::from_millis(WATCH_INTERVAL_MS));
        }
    })
}

impl MediaEngine for RodioEngine {
    fn resolve(&self, source_key: &str) -> Result<ResolvedSource> {
        let path = self.path_for(source_key);
        if !path.is_file() {
            return Err(PlaybackError::Resolution {
                source_key: source_key.to_string(),
                reason: format!("{} is not a file", path.display()),
            });
        }
        Ok(ResolvedSource {
            source_key: source_key.to_string(),
            path,
        })
    }

    fn open(
        &mut self,
        handle: HandleId,
        source: &ResolvedSource,
        events: Sender<EngineEvent>,
    ) -> Result<()> {
        self.release();

        let file = File::open(&source.path).map_err(|err| PlaybackError::Resolution {
            source_key: source.source_key.clone(),
            reason: err.to_string(),
        })?;
        let decoder = Decoder::new(BufReader::new(file)).map_err(|err| PlaybackError::Decode {
            source_key: source.source_key.clone(),
            reason: err.to_string(),
        })?;
        let duration = decoder.total_duration().map(|d| d.as_secs_f64());

        let sink = Sink::connect_new(&self.output.mixer);
        sink.pause();
        sink.append(decoder);
        let sink = Arc::new(Mutex::new(sink));

        let abort = Arc::new(AtomicBool::new(false));
        let probe_path = duration.is_none().then(|| source.path.clone());
        let watcher = spawn_watcher(handle, sink.clone(), abort.clone(), probe_path, events);

        self.current = Some(RodioMedium {
            handle,
            sink,
            duration,
            abort,
            watcher: Some(watcher),
        });
        Ok(())
    }

    fn release(&mut self) {
        if let Some(medium) = self.current.take() {
            medium.stop();
        }
    }

    fn play(&mut self) {
        self.with_sink(|sink| sink.play());
    }

    fn pause(&mut self) {
        self.with_sink(|sink| sink.pause());
    }

    fn seek(&mut self, seconds: f64) {
        let target = Duration::from_secs_f64(seconds.max(0.0));
        if let Some(Err(err)) = self.with_sink(|sink| sink.try_seek(target)) {
            warn!("seek to {:.2}s failed: {}", seconds, err);
        }
    }

    fn set_rate(&mut self, rate: f32) {
        self.with_sink(|sink| sink.set_speed(rate));
    }

    fn rate(&self) -> Option<f32> {
        self.with_sink(|sink| sink.speed())
    }

    fn position(&self) -> f64 {
        self.with_sink(|sink| sink.get_pos().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.current.as_ref().and_then(|medium| medium.duration)
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        self.release();
    }
}
