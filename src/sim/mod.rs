//! Deterministic run engine
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Session timeline only (no wall clock)
//! - Seeded RNG only
//! - One writer: the session controller
//! - No rendering or platform dependencies

pub mod clock;
pub mod grid;
pub mod scheduler;
pub mod scoring;
pub mod session;
pub mod state;
pub mod timer;

pub use clock::RunClock;
pub use grid::{GridSpec, compute_grid, compute_grid_with, pick_cell};
pub use scheduler::{SpawnContext, SpawnReport, TargetScheduler};
pub use scoring::{COMBO_LABELS, HitOutcome, RunStats, combo_label, on_hit};
pub use session::{Intent, RunObserver, Session, SessionError};
pub use state::{
    BestMark, BonusTile, FinishReason, GameEvent, RunState, RunStatus, RunSummary, Targets,
};
pub use timer::Timer;
