//! Run state and the types handed to renderers and collaborators
//!
//! `RunState` is written only by the session controller.

use serde::{Deserialize, Serialize};

use super::clock::RunClock;
use super::grid::GridSpec;
use super::scoring::RunStats;
use crate::tuning::{Difficulty, DifficultyProfile};

/// Outer run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Waiting for a start trigger, no timers armed
    #[default]
    Idle,
    /// 3, 2, 1, GO - input not accepted yet
    Countdown,
    Playing,
    Paused,
    /// Run ended, summary emitted
    Done,
}

impl RunStatus {
    /// Timeline advances in these states
    pub fn is_live(&self) -> bool {
        matches!(self, RunStatus::Countdown | RunStatus::Playing)
    }
}

/// Transient bonus tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusTile {
    pub cell: usize,
    /// Art slot, alternates between surfacings
    pub variant: u8,
}

/// Cells carrying a meaning this instant. Never more than one meaning per cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targets {
    pub active: Option<usize>,
    pub hazard: Option<usize>,
    pub bonus: Option<BonusTile>,
}

impl Targets {
    pub fn bonus_cell(&self) -> Option<usize> {
        self.bonus.map(|b| b.cell)
    }

    /// Occupied cells, for exclusion when picking
    pub fn occupied(&self) -> Vec<usize> {
        [self.active, self.hazard, self.bonus_cell()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// True when no two present targets share a cell
    pub fn are_distinct(&self) -> bool {
        let cells = self.occupied();
        cells
            .iter()
            .enumerate()
            .all(|(i, c)| !cells[i + 1..].contains(c))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Mutable state of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    pub difficulty: Difficulty,
    pub grid: GridSpec,
    pub clock: RunClock,
    pub score: u64,
    pub streak: u32,
    pub max_streak: u32,
    pub targets: Targets,
    pub stats: RunStats,
    /// Seconds the run started with, for the "banked time" bar
    pub start_time: f64,
}

impl RunState {
    pub fn new(difficulty: Difficulty, profile: &DifficultyProfile, grid: GridSpec) -> Self {
        Self {
            status: RunStatus::Idle,
            difficulty,
            grid,
            clock: RunClock::for_profile(profile),
            score: 0,
            streak: 0,
            max_streak: 0,
            targets: Targets::default(),
            stats: RunStats::default(),
            start_time: profile.start_time,
        }
    }

    pub fn time_left(&self) -> f64 {
        self.clock.time_left()
    }

    /// Time left exceeds what the run started with
    pub fn time_banked(&self) -> bool {
        self.clock.time_left() > self.start_time
    }

    pub fn add_points(&mut self, points: u64) {
        self.score = self.score.saturating_add(points);
    }

    pub fn deduct_points(&mut self, points: u64) {
        self.score = self.score.saturating_sub(points);
    }

    /// Extend the streak, returning the new length
    pub fn extend_streak(&mut self) -> u32 {
        self.streak += 1;
        self.max_streak = self.max_streak.max(self.streak);
        self.streak
    }

    pub fn break_streak(&mut self) {
        self.streak = 0;
    }
}

/// How a finished run compares to the player's personal best
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BestMark {
    #[default]
    NotBeaten,
    /// No previous best and a positive score
    FirstScore,
    NewBest,
}

impl BestMark {
    pub fn evaluate(score: u64, personal_best: u64) -> Self {
        if personal_best == 0 {
            if score > 0 { BestMark::FirstScore } else { BestMark::NotBeaten }
        } else if score > personal_best {
            BestMark::NewBest
        } else {
            BestMark::NotBeaten
        }
    }

    pub fn is_new_best(&self) -> bool {
        !matches!(self, BestMark::NotBeaten)
    }
}

/// End-of-run aggregate, emitted exactly once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub difficulty: Difficulty,
    pub score: u64,
    pub hits: u32,
    pub misses: u32,
    pub accuracy: Option<u32>,
    pub fastest_reaction_ms: Option<u32>,
    pub avg_reaction_ms: Option<u32>,
    pub max_streak: u32,
    pub bonus_tap_count: u32,
    pub best: BestMark,
}

impl RunSummary {
    pub fn from_state(state: &RunState, personal_best: u64) -> Self {
        Self {
            difficulty: state.difficulty,
            score: state.score,
            hits: state.stats.hits,
            misses: state.stats.misses,
            accuracy: state.stats.accuracy(),
            fastest_reaction_ms: state.stats.fastest_reaction_ms,
            avg_reaction_ms: state.stats.avg_reaction_ms(),
            max_streak: state.max_streak,
            bonus_tap_count: state.stats.bonus_taps,
            best: BestMark::evaluate(state.score, personal_best),
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    TimeUp,
    Forfeit,
}

/// Presentation events, drained by the front-end each frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    /// Start request without a bound player
    StartRefused,
    /// Countdown step (3, 2, 1)
    Countdown(u8),
    Go,
    TargetSpawned { active: usize, hazard: Option<usize>, window_ms: f64 },
    Hit { cell: usize, points: u64, time_gained: f64, reaction_ms: f64 },
    Combo { streak: u32, label: &'static str },
    /// Miss window ran out on `cell`
    Missed { cell: usize },
    WrongTap { cell: usize },
    HazardHit { cell: usize },
    BonusSpawned(BonusTile),
    BonusCollected { cell: usize, points: u64 },
    BonusExpired { cell: usize },
    /// New target landed on the bonus tile
    BonusEvicted { cell: usize },
    Paused,
    Resumed,
    Finished { reason: FinishReason, summary: RunSummary },
}
