//! Session controller
//!
//! The only component allowed to change run status. Timers never touch the
//! run state directly: when a deadline passes it posts an [`Intent`], and
//! intents are applied one at a time. After every applied intent or tap a
//! separate pass checks whether the clock ran out, so termination never
//! happens inside the update that computed the new time.
//!
//! Status flow: `Idle -> Countdown -> Playing <-> Paused -> Done -> Countdown`.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use thiserror::Error;

use super::grid::{GridSpec, compute_grid_with};
use super::scheduler::{SpawnContext, SpawnReport, TargetScheduler};
use super::scoring::{combo_label, on_hit};
use super::state::{FinishReason, GameEvent, RunState, RunStatus, RunSummary};
use super::timer::Timer;
use crate::tuning::{Difficulty, DifficultyProfile, Tuning, resolve_profile};

/// Reported refusals. Everything else the controller ignores quietly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("cannot start a run without a bound player identity")]
    PlayerNotBound,
}

/// Work posted by a timer, applied serially
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    CountdownStep,
    ClockTick,
    MissWindowExpired,
    BonusExpired,
}

/// Receives the summary once per finished run
pub trait RunObserver {
    fn run_completed(&mut self, summary: &RunSummary);
}

impl<F: FnMut(&RunSummary)> RunObserver for F {
    fn run_completed(&mut self, summary: &RunSummary) {
        self(summary)
    }
}

pub struct Session {
    tuning: Tuning,
    seed: u64,
    rng: Pcg32,
    profile: DifficultyProfile,
    state: RunState,
    scheduler: TargetScheduler,
    /// Session timeline (ms); frozen unless countdown/playing
    now: f64,
    clock_tick: Timer,
    countdown: Timer,
    countdown_left: u8,
    intents: VecDeque<Intent>,
    events: Vec<GameEvent>,
    /// One-shot termination guard
    finished: bool,
    summary: Option<RunSummary>,
    personal_best: u64,
    /// Viewport/difficulty changes waiting for a safe boundary
    pending_grid: Option<GridSpec>,
    pending_difficulty: Option<Difficulty>,
    observer: Option<Box<dyn RunObserver>>,
}

impl Session {
    pub fn new(seed: u64, difficulty: Difficulty, tuning: Tuning) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let profile = resolve_profile(difficulty, 0);
        let scheduler = TargetScheduler::new(tuning.clone(), &mut rng);
        Self {
            tuning,
            seed,
            rng,
            profile,
            state: RunState::new(difficulty, &profile, GridSpec::default()),
            scheduler,
            now: 0.0,
            clock_tick: Timer::default(),
            countdown: Timer::default(),
            countdown_left: 0,
            intents: VecDeque::new(),
            events: Vec::new(),
            finished: false,
            summary: None,
            personal_best: 0,
            pending_grid: None,
            pending_difficulty: None,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: impl RunObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn set_observer(&mut self, observer: impl RunObserver + 'static) {
        self.observer = Some(Box::new(observer));
    }

    // === Read access ===

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn status(&self) -> RunStatus {
        self.state.status
    }

    pub fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn now_ms(&self) -> f64 {
        self.now
    }

    /// Summary of the last finished run
    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Countdown number currently showing (3, 2, 1)
    pub fn countdown_remaining(&self) -> Option<u8> {
        (self.state.status == RunStatus::Countdown).then_some(self.countdown_left)
    }

    /// Remaining miss window for the live target
    pub fn miss_window_remaining(&self) -> Option<f64> {
        self.scheduler.miss_window.remaining(self.now)
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // === Collaborator inputs ===

    /// Personal best from the collaborator; only used to mark the summary
    pub fn set_personal_best(&mut self, best: u64) {
        self.personal_best = best;
    }

    /// Viewport changed. Applied now between runs, otherwise at the next start.
    pub fn set_viewport_width(&mut self, width: f64) {
        let grid = compute_grid_with(width, self.tuning.compact_grid_max_width);
        if grid == self.state.grid {
            self.pending_grid = None;
            return;
        }
        match self.state.status {
            RunStatus::Idle | RunStatus::Done => {
                log::debug!("grid -> {}x{}", grid.cols, grid.rows);
                self.state.grid = grid;
                self.state.targets.clear();
                self.pending_grid = None;
            }
            _ => {
                log::debug!("grid change to {}x{} deferred until run ends", grid.cols, grid.rows);
                self.pending_grid = Some(grid);
            }
        }
    }

    /// Change tier. Between runs this resets to idle; mid-run it waits.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        match self.state.status {
            RunStatus::Idle | RunStatus::Done => {
                self.pending_difficulty = None;
                self.profile = resolve_profile(difficulty, 0);
                self.stop_timers();
                self.finished = false;
                self.summary = None;
                self.state = RunState::new(difficulty, &self.profile, self.state.grid);
                log::debug!("difficulty -> {}", difficulty.as_str());
            }
            _ => {
                log::debug!("difficulty change to {} deferred", difficulty.as_str());
                self.pending_difficulty = Some(difficulty);
            }
        }
    }

    // === Transition requests ===

    /// Start a run from `Idle` or `Done`.
    ///
    /// Refuses with [`SessionError::PlayerNotBound`] when no player is bound.
    /// Requests from other states are ignored.
    pub fn start(&mut self, player_bound: bool) -> Result<(), SessionError> {
        match self.state.status {
            RunStatus::Idle | RunStatus::Done => self.begin_run(player_bound),
            status => {
                log::debug!("start ignored while {status:?}");
                Ok(())
            }
        }
    }

    /// Like [`Session::start`], also accepted from `Paused`
    pub fn restart(&mut self, player_bound: bool) -> Result<(), SessionError> {
        match self.state.status {
            RunStatus::Idle | RunStatus::Done | RunStatus::Paused => self.begin_run(player_bound),
            status => {
                log::debug!("restart ignored while {status:?}");
                Ok(())
            }
        }
    }

    pub fn pause(&mut self) {
        if self.state.status != RunStatus::Playing {
            log::debug!("pause ignored while {:?}", self.state.status);
            return;
        }
        self.state.status = RunStatus::Paused;
        self.scheduler.suspend();
        self.events.push(GameEvent::Paused);
        log::debug!("paused at {:.2}s left", self.state.time_left());
    }

    /// Resume play; the miss window restarts in full
    pub fn resume(&mut self) {
        if self.state.status != RunStatus::Paused {
            log::debug!("resume ignored while {:?}", self.state.status);
            return;
        }
        self.state.status = RunStatus::Playing;
        self.scheduler
            .arm(&self.profile, self.state.score, self.state.streak, self.now);
        self.events.push(GameEvent::Resumed);
        log::debug!("resumed");
    }

    pub fn toggle_pause(&mut self) {
        match self.state.status {
            RunStatus::Playing => self.pause(),
            RunStatus::Paused => self.resume(),
            _ => {}
        }
    }

    /// Give up the current run
    pub fn forfeit(&mut self) {
        if matches!(self.state.status, RunStatus::Playing | RunStatus::Paused) {
            self.finish(FinishReason::Forfeit);
        }
    }

    // === Input ===

    /// Player tapped `cell`. Only meaningful while playing.
    pub fn tap(&mut self, cell: usize) {
        if self.state.status != RunStatus::Playing || !self.state.grid.contains(cell) {
            return;
        }
        let targets = self.state.targets;
        if targets.bonus_cell() == Some(cell) {
            self.collect_bonus();
        } else if targets.hazard == Some(cell) {
            self.hazard_hit(cell);
        } else if targets.active == Some(cell) {
            self.hit(cell);
        } else {
            self.wrong_tap(cell);
        }
        self.observe_clock();
    }

    // === Timeline ===

    /// Advance the session timeline by `dt_ms`, firing due timers in order
    pub fn advance(&mut self, dt_ms: f64) {
        if !self.state.status.is_live() || dt_ms <= 0.0 {
            return;
        }
        let target = self.now + dt_ms.min(self.tuning.max_frame_ms());

        while let Some(due) = self.next_deadline().filter(|&d| d <= target) {
            self.now = self.now.max(due);
            self.collect_due();
            self.drain_intents();
            if !self.state.status.is_live() {
                return;
            }
        }
        self.now = target;
    }

    fn next_deadline(&self) -> Option<f64> {
        [
            self.countdown.deadline(),
            self.clock_tick.deadline(),
            self.scheduler.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .reduce(f64::min)
    }

    /// Post an intent for every timer due now, in a fixed order
    fn collect_due(&mut self) {
        let now = self.now;
        if self.countdown.fire_if_due(now) {
            self.intents.push_back(Intent::CountdownStep);
        }
        if self.clock_tick.fire_if_due(now) {
            self.intents.push_back(Intent::ClockTick);
        }
        if self.scheduler.miss_window.fire_if_due(now) {
            self.intents.push_back(Intent::MissWindowExpired);
        }
        if self.scheduler.bonus_ttl.fire_if_due(now) {
            self.intents.push_back(Intent::BonusExpired);
        }
    }

    fn drain_intents(&mut self) {
        while let Some(intent) = self.intents.pop_front() {
            if self.finished {
                self.intents.clear();
                break;
            }
            log::trace!("{intent:?} at {:.0}ms", self.now);
            self.apply(intent);
            self.observe_clock();
        }
    }

    fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::CountdownStep => self.countdown_step(),
            Intent::ClockTick => {
                if self.state.status == RunStatus::Playing {
                    let interval = self.tuning.tick_interval_ms();
                    self.state.clock.tick(interval / 1000.0);
                    self.clock_tick.arm(self.now, interval);
                }
            }
            Intent::MissWindowExpired => {
                // Stale if a new target was armed since the timer fired
                if self.state.status == RunStatus::Playing && !self.scheduler.miss_window.is_armed()
                {
                    self.miss();
                }
            }
            Intent::BonusExpired => {
                if !self.scheduler.bonus_ttl.is_armed() {
                    if let Some(bonus) = self.scheduler.expire_bonus(&mut self.state.targets) {
                        self.events.push(GameEvent::BonusExpired { cell: bonus.cell });
                    }
                }
            }
        }
    }

    /// Termination observer, run after every state update
    fn observe_clock(&mut self) {
        if self.state.status == RunStatus::Playing && self.state.clock.is_expired() {
            self.finish(FinishReason::TimeUp);
        }
    }

    // === Run lifecycle ===

    fn begin_run(&mut self, player_bound: bool) -> Result<(), SessionError> {
        if !player_bound {
            log::warn!("start refused: no player identity bound");
            self.events.push(GameEvent::StartRefused);
            return Err(SessionError::PlayerNotBound);
        }

        let difficulty = self
            .pending_difficulty
            .take()
            .unwrap_or(self.state.difficulty);
        let grid = self.pending_grid.take().unwrap_or(self.state.grid);

        self.stop_timers();
        self.intents.clear();
        self.profile = resolve_profile(difficulty, 0);
        self.state = RunState::new(difficulty, &self.profile, grid);
        self.scheduler.reset(&mut self.rng);
        self.finished = false;
        self.summary = None;

        self.state.status = RunStatus::Countdown;
        self.countdown_left = self.tuning.countdown_steps;
        if self.countdown_left == 0 {
            self.go();
        } else {
            self.events.push(GameEvent::Countdown(self.countdown_left));
            self.countdown.arm(self.now, self.tuning.countdown_step_ms);
        }

        log::info!(
            "run started: difficulty={} grid={}x{} time={}s",
            difficulty.as_str(),
            grid.cols,
            grid.rows,
            self.profile.start_time
        );
        Ok(())
    }

    fn countdown_step(&mut self) {
        if self.state.status != RunStatus::Countdown {
            return;
        }
        self.countdown_left = self.countdown_left.saturating_sub(1);
        if self.countdown_left > 0 {
            self.events.push(GameEvent::Countdown(self.countdown_left));
            self.countdown.arm(self.now, self.tuning.countdown_step_ms);
        } else {
            self.go();
        }
    }

    /// GO: first target armed, reaction reference starts here
    fn go(&mut self) {
        self.countdown.cancel();
        self.state.status = RunStatus::Playing;
        self.events.push(GameEvent::Go);
        self.clock_tick.arm(self.now, self.tuning.tick_interval_ms());
        self.spawn();
        log::debug!("go");
    }

    fn finish(&mut self, reason: FinishReason) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.state.status = RunStatus::Done;
        self.stop_timers();
        self.intents.clear();

        let summary = RunSummary::from_state(&self.state, self.personal_best);
        log::info!(
            "run finished ({:?}): score={} hits={} misses={} max_streak={}",
            reason,
            summary.score,
            summary.hits,
            summary.misses,
            summary.max_streak
        );
        if let Some(observer) = self.observer.as_mut() {
            observer.run_completed(&summary);
        }
        self.events.push(GameEvent::Finished {
            reason,
            summary: summary.clone(),
        });
        self.summary = Some(summary);
    }

    fn stop_timers(&mut self) {
        self.clock_tick.cancel();
        self.countdown.cancel();
        self.scheduler.stop();
    }

    // === Resolution paths ===

    fn spawn(&mut self) -> SpawnReport {
        // Competition hazards ratchet with score, so resolve on every spawn
        self.profile = resolve_profile(self.state.difficulty, self.state.score);
        let report = self.scheduler.spawn(
            &mut self.rng,
            &mut self.state.targets,
            SpawnContext {
                profile: &self.profile,
                cell_count: self.state.grid.cell_count(),
                excluded: &[],
                score: self.state.score,
                streak: self.state.streak,
                hits: self.state.stats.hits,
                now: self.now,
            },
        );
        if let Some(cell) = report.evicted_bonus {
            self.events.push(GameEvent::BonusEvicted { cell });
        }
        self.events.push(GameEvent::TargetSpawned {
            active: report.active,
            hazard: report.hazard,
            window_ms: report.window_ms,
        });
        if let Some(bonus) = report.new_bonus {
            self.events.push(GameEvent::BonusSpawned(bonus));
        }
        report
    }

    fn collect_bonus(&mut self) {
        if let Some(bonus) = self.scheduler.collect_bonus(&mut self.state.targets) {
            let points = self.tuning.bonus_points;
            self.state.add_points(points);
            self.state.stats.record_bonus();
            self.events.push(GameEvent::BonusCollected {
                cell: bonus.cell,
                points,
            });
        }
    }

    fn hazard_hit(&mut self, cell: usize) {
        self.state.targets.hazard = None;
        self.state.break_streak();
        self.state.stats.record_miss();
        self.state.deduct_points(self.tuning.hazard_score_penalty);
        self.events.push(GameEvent::HazardHit { cell });

        let penalty = self.profile.miss_penalty + self.tuning.hazard_extra_penalty;
        if !self.state.clock.apply_delta(-penalty) {
            self.spawn();
        }
    }

    /// Miss window ran out on the live target
    fn miss(&mut self) {
        self.state.break_streak();
        self.state.stats.record_miss();
        if let Some(cell) = self.state.targets.active {
            self.events.push(GameEvent::Missed { cell });
        }
        if !self.state.clock.apply_delta(-self.profile.miss_penalty) {
            self.spawn();
        }
    }

    /// Tapped an empty cell. The live target stays put.
    fn wrong_tap(&mut self, cell: usize) {
        self.state.break_streak();
        self.state.stats.record_miss();
        self.events.push(GameEvent::WrongTap { cell });
        self.state.clock.apply_delta(-self.profile.wrong_click_penalty);
    }

    fn hit(&mut self, cell: usize) {
        let reaction_ms = self.scheduler.reaction_ms(self.now);
        let streak_before = self.state.streak;
        let outcome = on_hit(&self.profile, reaction_ms, streak_before);

        self.state.stats.record_hit(reaction_ms);
        self.state.add_points(outcome.points);
        let streak = self.state.extend_streak();
        self.state.clock.apply_delta(outcome.time_gained);

        self.events.push(GameEvent::Hit {
            cell,
            points: outcome.points,
            time_gained: outcome.time_gained,
            reaction_ms,
        });
        if let Some(label) = combo_label(streak) {
            self.events.push(GameEvent::Combo { streak, label });
        }
        self.spawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::BestMark;
    use crate::tuning::competition_hazard_chance;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn quick_tuning() -> Tuning {
        Tuning {
            countdown_steps: 0,
            ..Default::default()
        }
    }

    fn playing(seed: u64, difficulty: Difficulty) -> Session {
        let mut session = Session::new(seed, difficulty, quick_tuning());
        session.start(true).expect("player bound");
        assert_eq!(session.status(), RunStatus::Playing);
        session
    }

    /// Advance in frame-sized steps (single calls are capped)
    fn wait(session: &mut Session, ms: f64) {
        let mut left = ms;
        while left > 0.0 {
            let step = left.min(50.0);
            session.advance(step);
            left -= step;
        }
    }

    fn active(session: &Session) -> usize {
        session.state().targets.active.expect("live target")
    }

    /// A cell holding no target
    fn empty_cell(session: &Session) -> usize {
        let occupied = session.state().targets.occupied();
        (0..session.state().grid.cell_count())
            .find(|c| !occupied.contains(c))
            .expect("free cell")
    }

    /// Drive until the run ends by letting every target expire
    fn run_out(session: &mut Session) {
        for _ in 0..10_000 {
            if session.status() == RunStatus::Done {
                return;
            }
            session.advance(100.0);
        }
        panic!("run never finished");
    }

    fn summaries(session: &mut Session) -> Rc<RefCell<Vec<RunSummary>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session.set_observer(move |s: &RunSummary| sink.borrow_mut().push(s.clone()));
        seen
    }

    #[test]
    fn test_start_refused_without_player() {
        let mut session = Session::new(1, Difficulty::Normal, Tuning::default());
        assert_eq!(session.start(false), Err(SessionError::PlayerNotBound));
        assert_eq!(session.status(), RunStatus::Idle);
        assert!(session.drain_events().contains(&GameEvent::StartRefused));

        assert_eq!(session.restart(false), Err(SessionError::PlayerNotBound));
        assert_eq!(session.status(), RunStatus::Idle);
    }

    #[test]
    fn test_countdown_then_go() {
        let mut session = Session::new(1, Difficulty::Normal, Tuning::default());
        session.start(true).unwrap();
        assert_eq!(session.status(), RunStatus::Countdown);
        assert_eq!(session.countdown_remaining(), Some(3));
        assert_eq!(session.state().targets.active, None);

        // Taps before GO are ignored
        session.tap(0);
        assert_eq!(session.state().stats.attempts(), 0);

        wait(&mut session, 700.0);
        assert_eq!(session.countdown_remaining(), Some(2));
        wait(&mut session, 700.0);
        wait(&mut session, 700.0);
        assert_eq!(session.status(), RunStatus::Playing);
        assert!(session.state().targets.active.is_some());
        assert_eq!(session.state().time_left(), 30.0);

        let events = session.drain_events();
        let steps: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::Countdown(n) => Some(*n),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec![3, 2, 1]);
        assert!(events.contains(&GameEvent::Go));
    }

    #[test]
    fn test_start_ignored_while_playing() {
        let mut session = playing(2, Difficulty::Normal);
        wait(&mut session, 300.0);
        let before = session.state().clone();
        assert_eq!(session.start(true), Ok(()));
        assert_eq!(session.state(), &before);
    }

    #[test]
    fn test_hit_scores_and_rewards_time() {
        let mut session = playing(3, Difficulty::Normal);
        wait(&mut session, 400.0);
        let time_before = session.state().time_left();
        let cell = active(&session);
        session.tap(cell);

        let state = session.state();
        // 400ms reaction, no streak: 15 + 27 + 0
        assert_eq!(state.score, 42);
        assert_eq!(state.streak, 1);
        assert_eq!(state.stats.hits, 1);
        assert_eq!(state.stats.fastest_reaction_ms, Some(400));
        assert!(state.time_left() > time_before);
        assert_ne!(state.targets.active, Some(cell));
    }

    #[test]
    fn test_wrong_tap_keeps_target() {
        let mut session = playing(4, Difficulty::Normal);
        session.tap(active(&session));
        let target = active(&session);
        let time_before = session.state().time_left();

        session.tap(empty_cell(&session));
        let state = session.state();
        assert_eq!(state.streak, 0);
        assert_eq!(state.stats.misses, 1);
        assert_eq!(state.targets.active, Some(target));
        assert!((time_before - state.time_left() - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_miss_window_expiry_advances_target() {
        let mut session = playing(5, Difficulty::Normal);
        let first = active(&session);
        wait(&mut session, 1899.0);
        assert_eq!(session.state().stats.misses, 0);
        wait(&mut session, 1.0);

        let state = session.state();
        assert_eq!(state.stats.misses, 1);
        assert_ne!(state.targets.active, Some(first));
        // 19 ticks of 0.1s then the 4s miss penalty
        assert!((state.time_left() - (30.0 - 1.9 - 4.0)).abs() < 1e-9);
        assert!(session
            .drain_events()
            .contains(&GameEvent::Missed { cell: first }));
    }

    #[test]
    fn test_hazard_hit_penalizes() {
        let mut session = playing(6, Difficulty::Extreme);
        // Build some score first
        for _ in 0..3 {
            let cell = active(&session);
            session.tap(cell);
        }
        let mut found = false;
        for _ in 0..200 {
            if let Some(hazard) = session.state().targets.hazard {
                let score = session.state().score;
                let time = session.state().time_left();
                session.tap(hazard);
                let state = session.state();
                assert_eq!(state.score, score.saturating_sub(10));
                assert_eq!(state.streak, 0);
                assert!((time - state.time_left() - 6.0).abs() < 1e-9);
                found = true;
                break;
            }
            let cell = active(&session);
            session.tap(cell);
        }
        assert!(found, "no hazard appeared");
    }

    #[test]
    fn test_bonus_tap_keeps_target_and_streak() {
        let tuning = Tuning {
            countdown_steps: 0,
            bonus_every: (1, 1),
            ..Default::default()
        };
        let mut session = Session::new(7, Difficulty::Normal, tuning);
        session.start(true).unwrap();
        session.tap(active(&session));

        let bonus = session.state().targets.bonus.expect("bonus after first hit");
        let target = active(&session);
        let (score, streak) = (session.state().score, session.state().streak);
        session.tap(bonus.cell);

        let state = session.state();
        assert_eq!(state.score, score + 25);
        assert_eq!(state.streak, streak);
        assert_eq!(state.targets.active, Some(target));
        assert_eq!(state.targets.bonus, None);
        assert_eq!(state.stats.bonus_taps, 1);
    }

    #[test]
    fn test_bonus_expires_without_penalty() {
        let tuning = Tuning {
            countdown_steps: 0,
            bonus_every: (1, 1),
            bonus_ttl_ms: 300.0,
            ..Default::default()
        };
        let mut session = Session::new(8, Difficulty::Normal, tuning);
        session.start(true).unwrap();
        session.tap(active(&session));
        let bonus = session.state().targets.bonus.expect("bonus");
        let misses = session.state().stats.misses;

        wait(&mut session, 300.0);
        assert_eq!(session.state().targets.bonus, None);
        assert_eq!(session.state().stats.misses, misses);
        assert!(session
            .drain_events()
            .contains(&GameEvent::BonusExpired { cell: bonus.cell }));
    }

    #[test]
    fn test_pause_freezes_and_resume_restarts_window() {
        let mut session = playing(9, Difficulty::Normal);
        wait(&mut session, 1000.0);
        let time = session.state().time_left();
        session.pause();
        assert_eq!(session.status(), RunStatus::Paused);
        assert_eq!(session.miss_window_remaining(), None);

        wait(&mut session, 10_000.0);
        session.tap(0);
        assert_eq!(session.state().time_left(), time);
        assert_eq!(session.state().stats.attempts(), 0);

        session.resume();
        assert_eq!(session.status(), RunStatus::Playing);
        assert_eq!(session.miss_window_remaining(), Some(1900.0));
    }

    #[test]
    fn test_pause_keeps_bonus_alive() {
        let tuning = Tuning {
            countdown_steps: 0,
            bonus_every: (1, 1),
            ..Default::default()
        };
        let mut session = Session::new(10, Difficulty::Normal, tuning);
        session.start(true).unwrap();
        session.tap(active(&session));
        let bonus = session.state().targets.bonus;
        assert!(bonus.is_some());

        session.pause();
        wait(&mut session, 5_000.0);
        session.resume();
        assert_eq!(session.state().targets.bonus, bonus);
    }

    #[test]
    fn test_clock_runs_out_once() {
        let mut session = playing(11, Difficulty::Normal);
        let seen = summaries(&mut session);
        run_out(&mut session);
        assert_eq!(session.state().time_left(), 0.0);
        assert_eq!(seen.borrow().len(), 1);

        // Further timer traffic and requests cannot re-finish
        wait(&mut session, 1_000.0);
        session.forfeit();
        session.tap(0);
        assert_eq!(seen.borrow().len(), 1);
        let finished = session
            .drain_events()
            .iter()
            .filter(|e| matches!(e, GameEvent::Finished { .. }))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn test_simultaneous_expiry_finishes_once() {
        // Clock tick and miss window land on the same instant at zero time
        let mut session = playing(12, Difficulty::Normal);
        let seen = summaries(&mut session);
        session.state.clock = crate::sim::clock::RunClock::new(0.1, 50.0);
        session.scheduler.miss_window.arm(session.now, 100.0);
        wait(&mut session, 100.0);

        assert_eq!(session.status(), RunStatus::Done);
        assert_eq!(seen.borrow().len(), 1);
        // Miss penalty was not applied after the run ended
        assert_eq!(session.state().stats.misses, 0);
    }

    #[test]
    fn test_forfeit_from_pause() {
        let mut session = playing(13, Difficulty::Normal);
        let seen = summaries(&mut session);
        session.pause();
        session.forfeit();
        assert_eq!(session.status(), RunStatus::Done);
        assert_eq!(seen.borrow().len(), 1);
        session.forfeit();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn test_summary_contents() {
        let mut session = playing(14, Difficulty::Normal);
        session.set_personal_best(10);
        for _ in 0..7 {
            wait(&mut session, 250.0);
            session.tap(active(&session));
        }
        for _ in 0..3 {
            session.tap(empty_cell(&session));
        }
        session.forfeit();

        let summary = session.summary().expect("summary").clone();
        assert_eq!(summary.hits, 7);
        assert_eq!(summary.misses, 3);
        assert_eq!(summary.accuracy, Some(70));
        assert_eq!(summary.fastest_reaction_ms, Some(250));
        assert_eq!(summary.avg_reaction_ms, Some(250));
        assert_eq!(summary.max_streak, 7);
        assert_eq!(summary.best, BestMark::NewBest);
    }

    #[test]
    fn test_restart_resets_run() {
        let mut session = playing(15, Difficulty::Hard);
        for _ in 0..5 {
            session.tap(active(&session));
        }
        session.forfeit();
        assert!(session.state().score > 0);

        session.restart(true).unwrap();
        let state = session.state();
        assert_eq!(state.score, 0);
        assert_eq!(state.streak, 0);
        assert_eq!(state.max_streak, 0);
        assert_eq!(state.stats.hits, 0);
        assert_eq!(state.time_left(), DifficultyProfile::HARD.start_time);
        assert!(session.summary().is_none());
    }

    #[test]
    fn test_restart_from_pause() {
        let mut session = playing(16, Difficulty::Normal);
        session.tap(active(&session));
        session.pause();
        session.restart(true).unwrap();
        assert_eq!(session.status(), RunStatus::Playing);
        assert_eq!(session.state().score, 0);
    }

    #[test]
    fn test_grid_change_deferred_while_playing() {
        let mut session = playing(17, Difficulty::Normal);
        session.set_viewport_width(400.0);
        assert_eq!(session.state().grid.cell_count(), 25);
        session.forfeit();
        // Applied at the next start
        session.start(true).unwrap();
        assert_eq!(session.state().grid.cell_count(), 16);
        assert!(active(&session) < 16);
    }

    #[test]
    fn test_grid_change_immediate_when_idle() {
        let mut session = Session::new(18, Difficulty::Normal, quick_tuning());
        session.set_viewport_width(375.0);
        assert_eq!(session.state().grid.cell_count(), 16);
    }

    #[test]
    fn test_difficulty_change_between_runs() {
        let mut session = playing(19, Difficulty::Normal);
        session.set_difficulty(Difficulty::Extreme);
        assert_eq!(session.state().difficulty, Difficulty::Normal);
        session.forfeit();
        session.start(true).unwrap();
        assert_eq!(session.state().difficulty, Difficulty::Extreme);
        assert_eq!(session.state().time_left(), 20.0);

        session.forfeit();
        session.set_difficulty(Difficulty::Hard);
        assert_eq!(session.status(), RunStatus::Idle);
        assert_eq!(session.state().time_left(), 25.0);
    }

    #[test]
    fn test_combo_event_at_five() {
        let mut session = playing(20, Difficulty::Normal);
        for _ in 0..5 {
            session.tap(active(&session));
        }
        assert!(session.drain_events().contains(&GameEvent::Combo {
            streak: 5,
            label: "HOT"
        }));
    }

    #[test]
    fn test_zero_timer_tunables_do_not_stall() {
        let tuning = Tuning {
            countdown_steps: 0,
            tick_interval_ms: 0.0,
            max_frame_ms: 0.0,
            ..Default::default()
        };
        let mut session = Session::new(21, Difficulty::Normal, tuning);
        session.start(true).unwrap();
        for _ in 0..200 {
            session.advance(16.0);
        }
        // Frames clamp to 1ms, ticks to 10ms
        assert_eq!(session.now_ms(), 200.0);
        assert!((session.state().time_left() - 29.8).abs() < 1e-9);
        assert_eq!(session.status(), RunStatus::Playing);
    }

    #[test]
    fn test_competition_hazards_ratchet_mid_run() {
        let mut session = playing(22, Difficulty::Competition);
        let mut chances = vec![session.profile().hazard_chance];
        for _ in 0..200 {
            if session.state().score >= 500 {
                break;
            }
            session.tap(active(&session));
            let chance = session.profile().hazard_chance;
            assert_eq!(chance, competition_hazard_chance(session.state().score));
            if chances.last() != Some(&chance) {
                chances.push(chance);
            }
        }
        assert_eq!(session.status(), RunStatus::Playing);
        assert!(session.state().score >= 500);
        assert_eq!(chances, vec![0.0, 0.04, 0.08, 0.13]);
    }

    #[test]
    fn test_same_seed_same_run() {
        let script = |session: &mut Session| {
            for step in 0..40 {
                wait(session, 130.0);
                if step % 3 == 0 {
                    let cell = active(session);
                    session.tap(cell);
                } else if step % 7 == 0 {
                    let cell = empty_cell(session);
                    session.tap(cell);
                }
            }
        };
        let mut a = playing(77, Difficulty::Competition);
        let mut b = playing(77, Difficulty::Competition);
        script(&mut a);
        script(&mut b);
        assert_eq!(a.state(), b.state());
    }

    #[derive(Debug, Clone)]
    enum Action {
        Advance(u16),
        TapActive,
        TapHazard,
        TapBonus,
        TapCell(usize),
        TogglePause,
    }

    fn arb_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            (1u16..600).prop_map(Action::Advance),
            Just(Action::TapActive),
            Just(Action::TapHazard),
            Just(Action::TapBonus),
            (0usize..25).prop_map(Action::TapCell),
            Just(Action::TogglePause),
        ]
    }

    proptest! {
        #[test]
        fn prop_run_invariants_hold(
            seed in any::<u64>(),
            tier in prop_oneof![
                Just(Difficulty::Normal),
                Just(Difficulty::Hard),
                Just(Difficulty::Extreme),
                Just(Difficulty::Competition),
            ],
            actions in proptest::collection::vec(arb_action(), 1..300),
        ) {
            let tuning = Tuning { bonus_every: (1, 3), ..quick_tuning() };
            let mut session = Session::new(seed, tier, tuning);
            let finished = Rc::new(RefCell::new(0u32));
            let counter = Rc::clone(&finished);
            session.set_observer(move |_: &RunSummary| *counter.borrow_mut() += 1);
            session.start(true).unwrap();

            let mut last_max_streak = 0;
            for action in actions {
                let targets = session.state().targets;
                match action {
                    Action::Advance(ms) => session.advance(f64::from(ms)),
                    Action::TapActive => if let Some(c) = targets.active { session.tap(c) },
                    Action::TapHazard => if let Some(c) = targets.hazard { session.tap(c) },
                    Action::TapBonus => if let Some(c) = targets.bonus_cell() { session.tap(c) },
                    Action::TapCell(c) => session.tap(c),
                    Action::TogglePause => session.toggle_pause(),
                }

                let state = session.state();
                let profile = session.profile();
                prop_assert!(state.time_left() >= 0.0);
                prop_assert!(state.time_left() <= profile.time_reward_cap);
                prop_assert!(state.targets.are_distinct(), "overlap: {:?}", state.targets);
                prop_assert!(state.targets.occupied().iter().all(|&c| state.grid.contains(c)));
                prop_assert!(state.max_streak >= state.streak);
                prop_assert!(state.max_streak >= last_max_streak);
                last_max_streak = state.max_streak;
                if state.status == RunStatus::Playing {
                    prop_assert!(state.time_left() > 0.0);
                }
            }
            prop_assert!(*finished.borrow() <= 1);
            if session.status() == RunStatus::Done {
                prop_assert_eq!(*finished.borrow(), 1);
            }
        }
    }
}
