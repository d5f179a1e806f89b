//! Target scheduler
//!
//! Owns the per-target timers: the miss window for the live target and the
//! bonus tile's time-to-live. Each target cycle is armed -> resolved -> armed;
//! the session decides what resolved means and asks for the next spawn.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::grid::pick_cell;
use super::state::{BonusTile, Targets};
use super::timer::Timer;
use crate::tuning::{DifficultyProfile, Tuning};

/// Inputs for one spawn
#[derive(Debug, Clone, Copy)]
pub struct SpawnContext<'a> {
    pub profile: &'a DifficultyProfile,
    pub cell_count: usize,
    /// Cells the new active target must avoid, on top of the previous one
    pub excluded: &'a [usize],
    pub score: u64,
    pub streak: u32,
    /// Correct hits so far, drives bonus surfacing
    pub hits: u32,
    pub now: f64,
}

/// What a spawn changed on the board
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpawnReport {
    pub active: usize,
    pub hazard: Option<usize>,
    /// Bonus removed because the new target landed on it
    pub evicted_bonus: Option<usize>,
    pub new_bonus: Option<BonusTile>,
    pub window_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetScheduler {
    tuning: Tuning,
    pub miss_window: Timer,
    pub bonus_ttl: Timer,
    /// Session time the live target was armed (reaction reference point)
    spawned_at: f64,
    /// Hit count at which the next bonus surfaces
    next_bonus_at: u32,
    bonus_variant: u8,
}

impl TargetScheduler {
    pub fn new<R: Rng>(tuning: Tuning, rng: &mut R) -> Self {
        let mut scheduler = Self {
            tuning,
            miss_window: Timer::default(),
            bonus_ttl: Timer::default(),
            spawned_at: 0.0,
            next_bonus_at: 0,
            bonus_variant: 0,
        };
        scheduler.reset(rng);
        scheduler
    }

    /// Cancel everything and draw a fresh bonus threshold
    pub fn reset<R: Rng>(&mut self, rng: &mut R) {
        self.stop();
        self.spawned_at = 0.0;
        self.bonus_variant = 0;
        self.next_bonus_at = self.draw_bonus_interval(rng);
    }

    pub fn stop(&mut self) {
        self.miss_window.cancel();
        self.bonus_ttl.cancel();
    }

    pub fn next_bonus_at(&self) -> u32 {
        self.next_bonus_at
    }

    pub fn spawned_at(&self) -> f64 {
        self.spawned_at
    }

    /// Milliseconds since the live target was armed
    pub fn reaction_ms(&self, now: f64) -> f64 {
        (now - self.spawned_at).max(0.0)
    }

    fn draw_bonus_interval<R: Rng>(&self, rng: &mut R) -> u32 {
        let (lo, hi) = self.tuning.bonus_interval();
        rng.random_range(lo..=hi)
    }

    /// Replace the live target, roll a hazard and maybe surface a bonus
    pub fn spawn<R: Rng>(
        &mut self,
        rng: &mut R,
        targets: &mut Targets,
        ctx: SpawnContext<'_>,
    ) -> SpawnReport {
        let mut report = SpawnReport::default();

        let active = pick_cell(rng, targets.active, ctx.excluded, ctx.cell_count).unwrap_or(0);
        targets.active = Some(active);
        report.active = active;

        // One meaning per cell: the new target wins over a lingering bonus
        if targets.bonus_cell() == Some(active) {
            targets.bonus = None;
            self.bonus_ttl.cancel();
            report.evicted_bonus = Some(active);
        }

        targets.hazard = None;
        if ctx.profile.hazard_chance > 0.0 && rng.random::<f64>() < ctx.profile.hazard_chance {
            let mut banned = vec![active];
            banned.extend(targets.bonus_cell());
            targets.hazard = pick_cell(rng, Some(active), &banned, ctx.cell_count)
                .filter(|cell| !banned.contains(cell));
        }
        report.hazard = targets.hazard;

        if ctx.hits >= self.next_bonus_at {
            report.new_bonus = self.surface_bonus(rng, targets, ctx);
        }

        report.window_ms = self.arm(ctx.profile, ctx.score, ctx.streak, ctx.now);
        log::trace!(
            "spawn active={} hazard={:?} window={:.0}ms",
            active,
            targets.hazard,
            report.window_ms
        );
        report
    }

    fn surface_bonus<R: Rng>(
        &mut self,
        rng: &mut R,
        targets: &mut Targets,
        ctx: SpawnContext<'_>,
    ) -> Option<BonusTile> {
        self.next_bonus_at = ctx.hits + self.draw_bonus_interval(rng);

        let banned: Vec<usize> = [targets.active, targets.hazard].into_iter().flatten().collect();
        let cell = pick_cell(rng, None, &banned, ctx.cell_count)?;
        let tile = BonusTile {
            cell,
            variant: self.bonus_variant,
        };
        self.bonus_variant = (self.bonus_variant + 1) % self.tuning.bonus_variants.max(1);
        targets.bonus = Some(tile);
        self.bonus_ttl.arm(ctx.now, self.tuning.bonus_ttl_ms);
        Some(tile)
    }

    /// (Re)start the miss window for the live target
    pub fn arm(&mut self, profile: &DifficultyProfile, score: u64, streak: u32, now: f64) -> f64 {
        let window = profile.miss_window_ms(score, streak);
        self.miss_window.arm(now, window);
        self.spawned_at = now;
        window
    }

    /// Pausing cancels the miss window; resuming re-arms it in full
    pub fn suspend(&mut self) {
        self.miss_window.cancel();
    }

    /// Claim the bonus tile, leaving the live target untouched
    pub fn collect_bonus(&mut self, targets: &mut Targets) -> Option<BonusTile> {
        self.bonus_ttl.cancel();
        targets.bonus.take()
    }

    /// Bonus TTL ran out: drop the tile, no penalty
    pub fn expire_bonus(&mut self, targets: &mut Targets) -> Option<BonusTile> {
        targets.bonus.take()
    }

    /// Earliest armed deadline among the scheduler's timers
    pub fn next_deadline(&self) -> Option<f64> {
        [self.miss_window.deadline(), self.bonus_ttl.deadline()]
            .into_iter()
            .flatten()
            .reduce(f64::min)
    }
}
