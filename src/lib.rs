//! Reflex Tile - A reflex-tap arcade game
//!
//! Core modules:
//! - `sim`: Deterministic run engine (timers, targets, scoring, session control)
//! - `tuning`: Data-driven game balance (difficulty tiers, timer tunables)
//! - `settings`: Persisted player preferences
//! - `best`: Personal best record kept by the front-end

pub mod best;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use best::PersonalBest;
pub use settings::Settings;
pub use tuning::{Difficulty, DifficultyProfile, Tuning, resolve_profile};

/// Game configuration constants
pub mod consts {
    /// Run clock cadence (ms between ticks)
    pub const TICK_INTERVAL_MS: f64 = 100.0;
    /// Shortest tick the centisecond clock can resolve
    pub const MIN_TICK_INTERVAL_MS: f64 = 10.0;

    /// Pre-run countdown: 3, 2, 1, GO
    pub const COUNTDOWN_STEPS: u8 = 3;
    pub const COUNTDOWN_STEP_MS: f64 = 700.0;

    /// Largest frame delta accepted by `Session::advance` (tab switches, stalls)
    pub const MAX_FRAME_MS: f64 = 250.0;
    pub const MIN_FRAME_MS: f64 = 1.0;

    /// Grid sizing - viewports at or below this width get the compact grid
    pub const COMPACT_GRID_MAX_WIDTH: f64 = 540.0;
    pub const COMPACT_GRID_SIDE: usize = 4;
    pub const FULL_GRID_SIDE: usize = 5;

    /// Attempts before `pick_cell` gives up and keeps the previous cell
    pub const PICK_ATTEMPTS: u32 = 40;

    /// Bonus tile
    pub const BONUS_POINTS: u64 = 25;
    pub const BONUS_TTL_MS: f64 = 2200.0;
    /// Bonus surfaces after [min, max] more correct hits
    pub const BONUS_EVERY: (u32, u32) = (8, 12);
    /// Alternating art slots for the bonus tile
    pub const BONUS_VARIANTS: u8 = 2;

    /// Hazard tap costs points on top of the time penalty
    pub const HAZARD_SCORE_PENALTY: u64 = 10;
    /// Extra seconds added to `miss_penalty` for a hazard tap
    pub const HAZARD_EXTRA_PENALTY: f64 = 1.0;

    /// Hit scoring
    pub const HIT_BASE_POINTS: u64 = 15;
    pub const SPEED_BONUS_REFERENCE_MS: f64 = 1200.0;
    pub const SPEED_BONUS_DIVISOR: f64 = 30.0;
    pub const SPEED_BONUS_FLOOR: i64 = 2;
    pub const STREAK_BONUS_PER_STEP: u64 = 4;
    /// Base of the time reward curve (seconds)
    pub const TIME_REWARD_BASE: f64 = 1.25;
}

/// Round a time value to hundredths of a second
#[inline]
pub fn round_centis(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}
