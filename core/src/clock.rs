//! Replay clock — owns the current replay time and keeps it in range.

use crate::types::{seconds_to_micros, Micros};
use serde::Serialize;

/// One advance or retreat moves the clock by one simulated second.
pub const REPLAY_STEP_SECONDS: f64 = 1.0;

/// Only [`ReplayClock::new`] builds one. `0 <= current_time <= max_time` always holds.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReplayClock {
    current_time: f64,
    max_time:     f64,
}

impl ReplayClock {
    /// A clock at 0 that never passes `max_time` seconds.
    pub fn new(max_time: f64) -> Self {
        Self {
            current_time: 0.0,
            max_time: if max_time.is_finite() { max_time.max(0.0) } else { 0.0 },
        }
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    /// The store key for the current time.
    pub fn current_us(&self) -> Micros {
        seconds_to_micros(self.current_time)
    }

    /// Step forward one tick. Returns the new time.
    pub fn advance(&mut self) -> f64 {
        self.current_time = (self.current_time + REPLAY_STEP_SECONDS).min(self.max_time);
        self.current_time
    }

    /// Step back one tick. Returns the new time.
    pub fn retreat(&mut self) -> f64 {
        self.current_time = (self.current_time - REPLAY_STEP_SECONDS).max(0.0);
        self.current_time
    }

    /// Jump to `t`, clamped into `[0, max_time]`. NaN jumps to 0.
    pub fn seek(&mut self, t: f64) -> f64 {
        self.current_time = if t.is_nan() { 0.0 } else { t.clamp(0.0, self.max_time) };
        self.current_time
    }
}
