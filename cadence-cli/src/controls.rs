use std::time::Duration;

use cadence_lib::playback::{PlaybackStatus, SessionState, Transport};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use log::warn;

const SEEK_STEP_SECONDS: f64 = 10.0;

pub struct StatusSnapshot {
    pub text: String,
    pub progress: f64,
    pub gauge_label: String,
}

pub fn status_text(status: &PlaybackStatus) -> StatusSnapshot {
    let state = match status.state {
        SessionState::Idle => "■ Stopped",
        SessionState::Loading => "… Loading",
        SessionState::Playing => "▶ Playing",
        SessionState::Paused => "⏸ Paused",
        SessionState::Failed => "✖ Failed",
    };
    let title = status.selected_name.as_deref().unwrap_or("-");
    let speed = status
        .speed
        .map(|speed| format!("{:.1}x", speed))
        .unwrap_or_else(|| "-".to_string());

    let mut text = format!("{}   {}\nSpeed: {}", state, title, speed);
    if let Some(err) = &status.last_error {
        text.push_str(&format!("\nError: {}", err));
    }

    StatusSnapshot {
        text,
        progress: status.progress(),
        gauge_label: format!(
            "{} / {}",
            format_time(status.position),
            format_time(status.duration)
        ),
    }
}

/// Track-list cursor, independent of what is playing.
#[derive(Debug, Default)]
pub struct Cursor {
    pub index: usize,
}

impl Cursor {
    fn up(&mut self, len: usize) {
        if len > 0 {
            self.index = (self.index + len - 1) % len;
        }
    }

    fn down(&mut self, len: usize) {
        if len > 0 {
            self.index = (self.index + 1) % len;
        }
    }
}

/// Poll for one key press and apply it. Returns false when the user quits.
pub fn handle_key_event(transport: &Transport, cursor: &mut Cursor) -> bool {
    if event::poll(Duration::from_millis(100)).unwrap_or(false) {
        if let Ok(Event::Key(key)) = event::read() {
            if key.kind != KeyEventKind::Press {
                return true;
            }
            return apply_key(transport, cursor, key.code);
        }
    }

    true
}

pub fn apply_key(transport: &Transport, cursor: &mut Cursor, code: KeyCode) -> bool {
    let len = transport.list_tracks().len();
    match code {
        KeyCode::Char('q') => return false,
        KeyCode::Char(' ') => {
            transport.toggle_play_pause();
        }
        KeyCode::Left => {
            transport.seek_by(-SEEK_STEP_SECONDS);
        }
        KeyCode::Right => {
            transport.seek_by(SEEK_STEP_SECONDS);
        }
        KeyCode::Char('n') => {
            if let Err(err) = transport.next() {
                warn!("next: {}", err);
            }
        }
        KeyCode::Char('p') => {
            if let Err(err) = transport.previous() {
                warn!("previous: {}", err);
            }
        }
        KeyCode::Up => cursor.up(len),
        KeyCode::Down => cursor.down(len),
        KeyCode::Enter => {
            if let Some(track) = transport.list_tracks().get(cursor.index) {
                let id = track.id.clone();
                if let Err(err) = transport.play(&id) {
                    warn!("cannot play {}: {}", id, err);
                }
            }
        }
        _ => {}
    }

    true
}

pub fn format_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0).floor() as u64;
    let minutes = seconds / 60;
    let seconds = seconds % 60;
    let hours = minutes / 60;
    let minutes = minutes % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
