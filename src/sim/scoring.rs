//! Hit scoring and run aggregates
//!
//! Pure arithmetic: points and time reward from reaction latency and the
//! streak held before the hit.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::tuning::DifficultyProfile;

/// What a correct hit is worth
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitOutcome {
    pub points: u64,
    /// Seconds added to the run clock (before the reward cap)
    pub time_gained: f64,
}

/// Speed component of a hit, floored so slow hits still score
pub fn speed_bonus(reaction_ms: f64) -> u64 {
    let raw = ((SPEED_BONUS_REFERENCE_MS - reaction_ms) / SPEED_BONUS_DIVISOR).round() as i64;
    raw.max(SPEED_BONUS_FLOOR) as u64
}

/// Combo component: nothing for the first two hits of a streak
pub fn streak_bonus(streak_before: u32) -> u64 {
    u64::from(streak_before.saturating_sub(1)) * STREAK_BONUS_PER_STEP
}

/// Seconds earned by a hit
pub fn time_reward(profile: &DifficultyProfile, reaction_ms: f64, streak_before: u32) -> f64 {
    let reward = (TIME_REWARD_BASE
        - reaction_ms / profile.reward_slope
        - f64::from(streak_before) * profile.reward_streak_factor)
        .max(profile.reward_floor);
    (reward + profile.reward_bonus).max(profile.min_gain)
}

pub fn on_hit(profile: &DifficultyProfile, reaction_ms: f64, streak_before: u32) -> HitOutcome {
    HitOutcome {
        points: HIT_BASE_POINTS + speed_bonus(reaction_ms) + streak_bonus(streak_before),
        time_gained: time_reward(profile, reaction_ms, streak_before),
    }
}

/// Streak milestones announced to the player
pub const COMBO_LABELS: [(u32, &str); 5] = [
    (5, "HOT"),
    (10, "ON FIRE"),
    (20, "UNSTOPPABLE"),
    (30, "GODLIKE"),
    (50, "LEGENDARY"),
];

pub fn combo_label(streak: u32) -> Option<&'static str> {
    COMBO_LABELS
        .iter()
        .find(|(at, _)| *at == streak)
        .map(|(_, label)| *label)
}

/// Running per-run aggregates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub hits: u32,
    /// Expired targets, wrong taps and hazard taps
    pub misses: u32,
    pub fastest_reaction_ms: Option<u32>,
    pub total_reaction_ms: f64,
    pub bonus_taps: u32,
}

impl RunStats {
    pub fn record_hit(&mut self, reaction_ms: f64) {
        let rounded = reaction_ms.max(0.0).round() as u32;
        self.hits += 1;
        self.total_reaction_ms += reaction_ms;
        self.fastest_reaction_ms = Some(self.fastest_reaction_ms.map_or(rounded, |f| f.min(rounded)));
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_bonus(&mut self) {
        self.bonus_taps += 1;
    }

    pub fn attempts(&self) -> u32 {
        self.hits + self.misses
    }

    /// Hit percentage, `None` before the first attempt
    pub fn accuracy(&self) -> Option<u32> {
        let attempts = self.attempts();
        (attempts > 0).then(|| (f64::from(self.hits) / f64::from(attempts) * 100.0).round() as u32)
    }

    pub fn avg_reaction_ms(&self) -> Option<u32> {
        (self.hits > 0).then(|| (self.total_reaction_ms / f64::from(self.hits)).round() as u32)
    }
}
