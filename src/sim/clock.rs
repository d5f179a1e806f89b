//! Run clock: the authoritative countdown for a run
//!
//! The clock only computes time. Reacting to it reaching zero is the
//! session's job, done in a separate pass after the update.

use serde::{Deserialize, Serialize};

use crate::round_centis;
use crate::tuning::DifficultyProfile;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunClock {
    time_left: f64,
    reward_cap: f64,
}

impl RunClock {
    pub fn new(start_time: f64, reward_cap: f64) -> Self {
        Self {
            time_left: start_time.max(0.0),
            reward_cap,
        }
    }

    pub fn for_profile(profile: &DifficultyProfile) -> Self {
        Self::new(profile.start_time, profile.time_reward_cap)
    }

    pub fn time_left(&self) -> f64 {
        self.time_left
    }

    pub fn reward_cap(&self) -> f64 {
        self.reward_cap
    }

    pub fn is_expired(&self) -> bool {
        self.time_left <= 0.0
    }

    /// Fixed-cadence decrement. No drift correction; rounded to hundredths.
    /// Returns true once the clock has run out.
    pub fn tick(&mut self, delta_secs: f64) -> bool {
        self.time_left = round_centis(self.time_left - delta_secs).max(0.0);
        self.is_expired()
    }

    /// Apply a reward (positive) or penalty (negative).
    ///
    /// Rewards stop at the reward cap, penalties stop at zero. Returns true
    /// once the clock has run out.
    pub fn apply_delta(&mut self, delta_secs: f64) -> bool {
        let next = self.time_left + delta_secs;
        self.time_left = if delta_secs >= 0.0 {
            next.min(self.reward_cap.max(self.time_left))
        } else {
            next.max(0.0)
        };
        self.is_expired()
    }
}
