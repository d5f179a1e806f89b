//! Personal best record
//!
//! Kept by the front-end (LocalStorage on web). The session only receives the
//! best score as a hint for marking new records.

use serde::{Deserialize, Serialize};

use crate::sim::RunSummary;
use crate::tuning::Difficulty;

/// Best run seen on this device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalBest {
    pub score: u64,
    pub difficulty: Option<Difficulty>,
    pub max_streak: u32,
    pub fastest_reaction_ms: Option<u32>,
    /// Total bonus tiles claimed across all runs
    pub bonus_taps_total: u32,
    /// Unix timestamp (ms) of the best run
    pub timestamp: f64,
}

impl PersonalBest {
    /// LocalStorage key (used only in wasm32)
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "reflex_tile_best";

    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished run in. Returns true if it set a new best score.
    pub fn record(&mut self, summary: &RunSummary, timestamp: f64) -> bool {
        self.bonus_taps_total += summary.bonus_tap_count;
        self.max_streak = self.max_streak.max(summary.max_streak);
        self.fastest_reaction_ms = match (self.fastest_reaction_ms, summary.fastest_reaction_ms) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        if summary.score > self.score {
            self.score = summary.score;
            self.difficulty = Some(summary.difficulty);
            self.timestamp = timestamp;
            true
        } else {
            false
        }
    }

    /// Load the record from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                if let Ok(best) = serde_json::from_str::<PersonalBest>(&json) {
                    log::info!("Loaded personal best {}", best.score);
                    return best;
                }
            }
        }

        log::info!("No personal best found, starting fresh");
        Self::new()
    }

    /// Save the record to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Personal best saved ({})", self.score);
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::new()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}
