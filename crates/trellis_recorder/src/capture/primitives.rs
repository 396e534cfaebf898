//! Timestamps and the session clock.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Microseconds since the recording session started.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_millis(&self) -> u64 {
        self.0 / 1000
    }

    /// Shift back by `offset`, saturating at zero.
    pub fn saturating_sub(self, offset: Duration) -> Self {
        Self(self.0.saturating_sub(Self::from_duration(offset).0))
    }
}

impl std::ops::Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        Duration::from_micros(self.0.saturating_sub(rhs.0))
    }
}

/// Session clock. Time spent paused does not advance it.
#[derive(Debug)]
pub struct RecordingClock {
    start: Instant,
    paused_total: Duration,
    paused_at: Option<Instant>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            paused_total: Duration::ZERO,
            paused_at: None,
        }
    }

    /// Running time since start. Frozen while paused.
    pub fn now(&self) -> Timestamp {
        let end = self.paused_at.unwrap_or_else(Instant::now);
        let running = end.saturating_duration_since(self.start);
        Timestamp::from_duration(running).saturating_sub(self.paused_total)
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn pause(&mut self) {
        self.paused_at.get_or_insert_with(Instant::now);
    }

    pub fn resume(&mut self) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += paused_at.elapsed();
        }
    }

    /// Restart the clock at zero, running.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for RecordingClock {
    fn default() -> Self {
        Self::new()
    }
}
