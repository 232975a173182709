use std::time::{Duration, Instant};

/// Default autosave period.
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Fixed-interval autosave timer.
///
/// The timer is polled by whoever owns the edit loop; it never spawns
/// threads. Saving is independent of validation results.
#[derive(Debug, Clone)]
pub struct Autosave {
    interval: Duration,
    last: Instant,
}

impl Autosave {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True once a full interval has passed since the last save.
    pub fn due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.interval
    }

    /// Time left before the next save is due.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(self.last))
    }

    /// Record an autosave, restarting the period.
    pub fn mark(&mut self, now: Instant) {
        self.last = now;
    }
}

impl Default for Autosave {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSAVE_INTERVAL)
    }
}
