//! In-memory logger feeding the log panel of the terminal UI.

use log::{LevelFilter, Log, Metadata, Record};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::os::unix::io::{AsRawFd, FromRawFd, RawFd};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;

const LOG_CAPACITY: usize = 500;

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

struct SharedLogger {
    level: LevelFilter,
    buffer: LogBuffer,
    echo_stderr: bool,
}

impl Log for SharedLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format!("[{}] {}: {}", record.level(), record.target(), record.args());
        if self.echo_stderr {
            eprintln!("{}", line);
        }
        push_line(&self.buffer, line);
    }

    fn flush(&self) {}
}

static LOG_BUFFER: OnceLock<LogBuffer> = OnceLock::new();
static LOGGER: OnceLock<SharedLogger> = OnceLock::new();

fn push_line(buffer: &LogBuffer, line: String) {
    let mut buffer = buffer.lock().unwrap();
    if buffer.len() >= LOG_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(line);
}

fn level_from_env(value: Option<&str>) -> LevelFilter {
    match value.map(str::to_lowercase).as_deref() {
        Some("off") => LevelFilter::Off,
        Some("error") => LevelFilter::Error,
        Some("warn") => LevelFilter::Warn,
        Some("debug") => LevelFilter::Debug,
        Some("trace") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Install the logger. Level comes from `RUST_LOG`; `CADENCE_LOG_STDERR=1`
/// also echoes every line to stderr.
pub fn init() -> LogBuffer {
    let buffer = LOG_BUFFER
        .get_or_init(|| Arc::new(Mutex::new(VecDeque::with_capacity(LOG_CAPACITY))))
        .clone();

    let level = level_from_env(std::env::var("RUST_LOG").ok().as_deref());
    let echo_stderr = std::env::var("CADENCE_LOG_STDERR")
        .map(|value| value != "0")
        .unwrap_or(false);

    let logger = SharedLogger {
        level,
        buffer: buffer.clone(),
        echo_stderr,
    };

    let logger_ref = LOGGER.get_or_init(|| logger);
    if log::set_logger(logger_ref).is_ok() {
        log::set_max_level(level);
    }

    buffer
}

pub fn snapshot(buffer: &LogBuffer) -> Vec<String> {
    buffer.lock().unwrap().iter().cloned().collect()
}

/// Restores the original stderr when dropped.
pub struct StderrCaptureGuard {
    original_fd: RawFd,
    stderr_fd: RawFd,
    reader_handle: Option<JoinHandle<()>>,
}

impl Drop for StderrCaptureGuard {
    fn drop(&mut self) {
        unsafe {
            libc::dup2(self.original_fd, self.stderr_fd);
            libc::close(self.original_fd);
        }
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Redirect stderr into the log buffer while the terminal UI owns the screen.
///
/// Audio backends write diagnostics straight to stderr, which would tear
/// through the alternate screen.
pub fn capture_stderr(buffer: LogBuffer) -> Option<StderrCaptureGuard> {
    let stderr_fd = std::io::stderr().as_raw_fd();
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return None;
    }
    let [read_fd, write_fd] = fds;

    let original_fd = unsafe { libc::dup(stderr_fd) };
    if original_fd < 0 {
        close_fds(&[read_fd, write_fd]);
        return None;
    }
    if unsafe { libc::dup2(write_fd, stderr_fd) } < 0 {
        close_fds(&[read_fd, write_fd, original_fd]);
        return None;
    }

    let handle = std::thread::spawn(move || {
        let file = unsafe { std::fs::File::from_raw_fd(read_fd) };
        forward_lines(BufReader::new(file), &buffer);
    });
    close_fds(&[write_fd]);

    Some(StderrCaptureGuard {
        original_fd,
        stderr_fd,
        reader_handle: Some(handle),
    })
}

fn close_fds(fds: &[RawFd]) {
    for fd in fds {
        unsafe {
            libc::close(*fd);
        }
    }
}

/// Copy non-blank lines from `reader` into `buffer` until end of input.
fn forward_lines(mut reader: impl BufRead, buffer: &LogBuffer) {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if !trimmed.is_empty() {
            push_line(buffer, format!("[STDERR] {}", trimmed));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keeps_only_the_newest_lines() {
        let buffer: LogBuffer = Arc::new(Mutex::new(VecDeque::new()));
        for i in 0..LOG_CAPACITY + 3 {
            push_line(&buffer, format!("line {}", i));
        }

        let lines = snapshot(&buffer);
        assert_eq!(lines.len(), LOG_CAPACITY);
        assert_eq!(lines[0], "line 3");
        assert_eq!(lines[LOG_CAPACITY - 1], format!("line {}", LOG_CAPACITY + 2));
    }

    #[test]
    fn forwarded_stderr_skips_blank_lines() {
        let buffer: LogBuffer = Arc::new(Mutex::new(VecDeque::new()));
        let output: &[u8] = b"ALSA lib pcm.c: underrun\n\n   \nsecond line\r\n";

        forward_lines(output, &buffer);

        assert_eq!(
            snapshot(&buffer),
            vec!["[STDERR] ALSA lib pcm.c: underrun", "[STDERR] second line"]
        );
    }

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(level_from_env(None), LevelFilter::Info);
        assert_eq!(level_from_env(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(level_from_env(Some("chatty")), LevelFilter::Info);
    }
}
