//! Status snapshots handed to display consumers.

use crate::catalog::TrackId;

use super::session::SessionState;

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub selected: Option<TrackId>,
    /// Display name of the selected track.
    pub selected_name: Option<String>,
    pub state: SessionState,
    pub is_playing: bool,
    /// Seconds into the current track.
    pub position: f64,
    /// Seconds; `1.0` until the engine knows the real duration.
    pub duration: f64,
    /// Speed of the selected track.
    pub speed: Option<f32>,
    pub last_error: Option<String>,
}

impl PlaybackStatus {
    /// Fraction of the track played, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
