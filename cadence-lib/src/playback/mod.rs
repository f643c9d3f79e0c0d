//! Playback session, transport controller and their background tasks.

mod progress;
mod session;
mod settings;
mod status;
mod tasks;
mod transport;

pub use progress::{ProgressReporter, ReportCallback};
pub use session::{PlaybackSession, SessionState, Transition, DURATION_SENTINEL};
pub use settings::TransportSettings;
pub use status::PlaybackStatus;
pub use transport::Transport;
