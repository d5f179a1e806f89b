//! Data-driven game balance
//!
//! Difficulty tiers map to an immutable [`DifficultyProfile`]. The competition
//! tier ratchets hazard probability up with score, so profiles are resolved
//! again on every target respawn.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Difficulty tier selected for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Normal,
    Hard,
    Extreme,
    /// Leaderboard tier - hazards appear as the score climbs
    Competition,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Normal,
        Difficulty::Hard,
        Difficulty::Extreme,
        Difficulty::Competition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
            Difficulty::Extreme => "extreme",
            Difficulty::Competition => "competition",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "normal" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            "extreme" => Some(Difficulty::Extreme),
            "competition" | "comp" => Some(Difficulty::Competition),
            _ => None,
        }
    }
}

/// Tunable constants for one difficulty tier
///
/// Times are seconds unless the field name says otherwise; pace values are ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub start_time: f64,
    pub miss_penalty: f64,
    /// Chance (0..1) that a hazard decoy accompanies a new target
    pub hazard_chance: f64,
    pub time_reward_cap: f64,
    pub pace_base_ms: f64,
    pub pace_floor_ms: f64,
    pub pace_score_factor: f64,
    pub pace_streak_factor: f64,
    pub reward_bonus: f64,
    pub reward_floor: f64,
    pub reward_slope: f64,
    pub reward_streak_factor: f64,
    pub min_gain: f64,
    pub wrong_click_penalty: f64,
}

impl DifficultyProfile {
    pub const NORMAL: Self = Self {
        start_time: 30.0,
        miss_penalty: 4.0,
        hazard_chance: 0.0,
        time_reward_cap: 50.0,
        pace_base_ms: 1900.0,
        pace_floor_ms: 900.0,
        pace_score_factor: 4.5,
        pace_streak_factor: 9.0,
        reward_bonus: 0.8,
        reward_floor: 0.55,
        reward_slope: 940.0,
        reward_streak_factor: 0.012,
        min_gain: 1.1,
        wrong_click_penalty: 1.4,
    };

    pub const HARD: Self = Self {
        start_time: 25.0,
        miss_penalty: 4.5,
        hazard_chance: 0.08,
        time_reward_cap: 40.0,
        pace_base_ms: 1500.0,
        pace_floor_ms: 700.0,
        pace_score_factor: 6.5,
        pace_streak_factor: 12.0,
        reward_bonus: 0.65,
        reward_floor: 0.38,
        reward_slope: 900.0,
        reward_streak_factor: 0.018,
        min_gain: 0.85,
        wrong_click_penalty: 1.6,
    };

    pub const EXTREME: Self = Self {
        start_time: 20.0,
        miss_penalty: 5.0,
        hazard_chance: 0.14,
        time_reward_cap: 34.0,
        pace_base_ms: 1250.0,
        pace_floor_ms: 550.0,
        pace_score_factor: 8.5,
        pace_streak_factor: 15.0,
        reward_bonus: 0.55,
        reward_floor: 0.32,
        reward_slope: 860.0,
        reward_streak_factor: 0.023,
        min_gain: 0.75,
        wrong_click_penalty: 1.9,
    };

    /// Competition base values; `hazard_chance` is replaced by [`competition_hazard_chance`]
    pub const COMPETITION: Self = Self {
        start_time: 30.0,
        miss_penalty: 4.0,
        hazard_chance: 0.0,
        time_reward_cap: 45.0,
        pace_base_ms: 1700.0,
        pace_floor_ms: 800.0,
        pace_score_factor: 5.0,
        pace_streak_factor: 10.0,
        reward_bonus: 0.72,
        reward_floor: 0.46,
        reward_slope: 920.0,
        reward_streak_factor: 0.015,
        min_gain: 0.95,
        wrong_click_penalty: 1.5,
    };

    /// Miss window for the next target (ms). Shrinks with score and streak.
    pub fn miss_window_ms(&self, score: u64, streak: u32) -> f64 {
        let paced = self.pace_base_ms
            - score as f64 * self.pace_score_factor
            - streak as f64 * self.pace_streak_factor;
        paced.max(self.pace_floor_ms)
    }
}

/// Hazard probability for the competition tier, stepped by score band
pub fn competition_hazard_chance(score: u64) -> f64 {
    match score {
        0..150 => 0.0,
        150..300 => 0.04,
        300..500 => 0.08,
        _ => 0.13,
    }
}

/// Look up the profile for `tier` at the current `score`
pub fn resolve_profile(tier: Difficulty, score: u64) -> DifficultyProfile {
    match tier {
        Difficulty::Normal => DifficultyProfile::NORMAL,
        Difficulty::Hard => DifficultyProfile::HARD,
        Difficulty::Extreme => DifficultyProfile::EXTREME,
        Difficulty::Competition => DifficultyProfile {
            hazard_chance: competition_hazard_chance(score),
            ..DifficultyProfile::COMPETITION
        },
    }
}

/// Timer and bonus tunables shared by every tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub tick_interval_ms: f64,
    pub countdown_steps: u8,
    pub countdown_step_ms: f64,
    pub max_frame_ms: f64,
    pub compact_grid_max_width: f64,
    pub bonus_points: u64,
    pub bonus_ttl_ms: f64,
    /// Hits between bonus surfacings, inclusive range
    pub bonus_every: (u32, u32),
    pub bonus_variants: u8,
    pub hazard_score_penalty: u64,
    pub hazard_extra_penalty: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            tick_interval_ms: TICK_INTERVAL_MS,
            countdown_steps: COUNTDOWN_STEPS,
            countdown_step_ms: COUNTDOWN_STEP_MS,
            max_frame_ms: MAX_FRAME_MS,
            compact_grid_max_width: COMPACT_GRID_MAX_WIDTH,
            bonus_points: BONUS_POINTS,
            bonus_ttl_ms: BONUS_TTL_MS,
            bonus_every: BONUS_EVERY,
            bonus_variants: BONUS_VARIANTS,
            hazard_score_penalty: HAZARD_SCORE_PENALTY,
            hazard_extra_penalty: HAZARD_EXTRA_PENALTY,
        }
    }
}

impl Tuning {
    /// Clock cadence, floored so a zero or garbage value cannot stall the timeline
    pub fn tick_interval_ms(&self) -> f64 {
        self.tick_interval_ms.max(MIN_TICK_INTERVAL_MS)
    }

    /// Per-call frame cap, always positive
    pub fn max_frame_ms(&self) -> f64 {
        self.max_frame_ms.max(MIN_FRAME_MS)
    }

    /// Bonus interval bounds, ordered and never zero
    pub fn bonus_interval(&self) -> (u32, u32) {
        let (a, b) = self.bonus_every;
        let lo = a.min(b).max(1);
        (lo, a.max(b).max(lo))
    }
}
