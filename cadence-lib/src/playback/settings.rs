//! Tunables for the transport and its background tasks.

use std::time::Duration;

const PROGRESS_INTERVAL_MS: u64 = 500;
const SPEED_SETTLE_DELAYS_MS: [u64; 2] = [100, 200];
const EVENT_POLL_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct TransportSettings {
    /// Interval of the position sampler.
    pub progress_interval: Duration,
    /// Delays after start/resume at which the track speed is applied again.
    pub speed_settle_delays: Vec<Duration>,
    /// How long the event pump waits before checking for shutdown.
    pub event_poll_interval: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_millis(PROGRESS_INTERVAL_MS),
            speed_settle_delays: SPEED_SETTLE_DELAYS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            event_poll_interval: Duration::from_millis(EVENT_POLL_MS),
        }
    }
}

impl TransportSettings {
    /// Configure the sampler interval. Zero is raised to one millisecond.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Configure the settle delays. An empty list disables delayed re-apply.
    pub fn with_speed_settle_delays(mut self, delays: Vec<Duration>) -> Self {
        self.speed_settle_delays = delays;
        self
    }

    pub fn with_event_poll_interval(mut self, interval: Duration) -> Self {
        self.event_poll_interval = interval.max(Duration::from_millis(1));
        self
    }
}
