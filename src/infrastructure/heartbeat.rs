use crate::types::{DEFAULT_PING_INTERVAL, DEFAULT_PING_TIMEOUT};
use std::time::Duration;
use tokio::time::Instant;

/// Tracks server liveness for an Engine.IO session.
///
/// Engine.IO v4 servers send a ping every `ping_interval` and expect the client
/// to consider the link dead if nothing arrives within
/// `ping_interval + ping_timeout`. Any inbound frame counts as proof of life.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    window: Duration,
    last_seen: Instant,
}

impl HeartbeatMonitor {
    pub fn new(ping_interval: Duration, ping_timeout: Duration) -> Self {
        Self {
            window: ping_interval + ping_timeout,
            last_seen: Instant::now(),
        }
    }

    /// Build from the millisecond values carried by the Engine.IO open packet
    pub fn from_millis(ping_interval: Option<u64>, ping_timeout: Option<u64>) -> Self {
        Self::new(
            Duration::from_millis(ping_interval.unwrap_or(DEFAULT_PING_INTERVAL)),
            Duration::from_millis(ping_timeout.unwrap_or(DEFAULT_PING_TIMEOUT)),
        )
    }

    /// Record inbound traffic
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Instant after which the link is considered dead
    pub fn deadline(&self) -> Instant {
        self.last_seen + self.window
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline()
    }
}
