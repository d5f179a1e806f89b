//! Reflex Tile entry point
//!
//! Handles platform-specific initialization and runs the game loop.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use web_sys::{Document, Element, KeyboardEvent, PointerEvent, VisibilityState};

    use reflex_tile::sim::{GameEvent, RunStatus, RunSummary, Session};
    use reflex_tile::{PersonalBest, Settings, Tuning};

    /// Written by the registration screen once a player has picked a tag
    const PLAYER_KEY: &str = "reflex_tile_player";

    /// Game instance holding all state
    struct Game {
        session: Session,
        settings: Settings,
        best: Rc<RefCell<PersonalBest>>,
        document: Document,
        cells: Vec<Element>,
        last_time: f64,
        message: String,
    }

    impl Game {
        fn new(seed: u64, document: Document) -> Self {
            let settings = Settings::load();
            let best = Rc::new(RefCell::new(PersonalBest::load()));

            let mut session = Session::new(seed, settings.difficulty, Tuning::default());
            session.set_personal_best(best.borrow().score);

            // Run-completion collaborator: fold the run into the local record
            let record = Rc::clone(&best);
            session.set_observer(move |summary: &RunSummary| {
                let mut best = record.borrow_mut();
                if best.record(summary, js_sys::Date::now()) {
                    log::info!("New personal best: {}", summary.score);
                }
                best.save();
            });

            Self {
                session,
                settings,
                best,
                document,
                cells: Vec::new(),
                last_time: 0.0,
                message: String::new(),
            }
        }

        fn player_bound() -> bool {
            web_sys::window()
                .and_then(|w| w.local_storage().ok())
                .flatten()
                .and_then(|s| s.get_item(PLAYER_KEY).ok())
                .flatten()
                .is_some_and(|name| !name.trim().is_empty())
        }

        fn start(&mut self) {
            self.session.set_personal_best(self.best.borrow().score);
            let result = match self.session.status() {
                RunStatus::Paused => self.session.restart(Self::player_bound()),
                _ => self.session.start(Self::player_bound()),
            };
            if let Err(e) = result {
                self.message = "Pick a player tag first".to_string();
                log::warn!("{}", e);
            }
        }

        /// Rebuild the arena buttons when the grid size changed
        fn sync_cells(&mut self) {
            let count = self.session.state().grid.cell_count();
            if self.cells.len() == count {
                return;
            }
            let Some(arena) = self.document.get_element_by_id("arena") else {
                return;
            };
            arena.set_inner_html("");
            let _ = arena.set_attribute(
                "style",
                &format!(
                    "grid-template-columns: repeat({}, minmax(0, 1fr))",
                    self.session.state().grid.cols
                ),
            );
            self.cells.clear();
            for idx in 0..count {
                if let Ok(cell) = self.document.create_element("button") {
                    let _ = cell.set_attribute("type", "button");
                    let _ = cell.set_attribute("data-cell", &idx.to_string());
                    let _ = arena.append_child(&cell);
                    self.cells.push(cell);
                }
            }
        }

        /// Advance the session and turn events into HUD feedback
        fn update(&mut self, time: f64) {
            let dt = if self.last_time > 0.0 { time - self.last_time } else { 0.0 };
            self.last_time = time;
            self.session.advance(dt);

            for event in self.session.drain_events() {
                match event {
                    GameEvent::Countdown(n) => self.message = n.to_string(),
                    GameEvent::Go => self.message = "GO".to_string(),
                    GameEvent::Combo { label, .. } => self.message = label.to_string(),
                    GameEvent::StartRefused => self.message = "Pick a player tag first".to_string(),
                    GameEvent::Paused => self.message = "Paused".to_string(),
                    GameEvent::Resumed => self.message.clear(),
                    GameEvent::WrongTap { .. } | GameEvent::HazardHit { .. } => self.vibrate(70),
                    GameEvent::BonusCollected { .. } => self.vibrate(25),
                    GameEvent::Finished { summary, .. } => {
                        self.message = if summary.best.is_new_best() {
                            format!("NEW PERSONAL BEST {}", summary.score)
                        } else {
                            format!("Run complete: {}", summary.score)
                        };
                    }
                    _ => {}
                }
            }
        }

        fn vibrate(&self, ms: u32) {
            if !self.settings.effective_haptics() {
                return;
            }
            if let Some(window) = web_sys::window() {
                let _ = window.navigator().vibrate_with_duration(ms);
            }
        }

        fn render(&mut self) {
            self.sync_cells();
            let state = self.session.state();
            let targets = state.targets;
            for (idx, cell) in self.cells.iter().enumerate() {
                let mut class = String::from("cell");
                if targets.active == Some(idx) {
                    class.push_str(" cell--active");
                }
                if targets.hazard == Some(idx) {
                    class.push_str(" cell--hazard");
                }
                if let Some(bonus) = targets.bonus.filter(|b| b.cell == idx) {
                    class.push_str(&format!(" cell--bonus cell--bonus-{}", bonus.variant));
                }
                if cell.class_name() != class {
                    cell.set_class_name(&class);
                }
            }

            let set_text = |id: &str, text: &str| {
                if let Some(el) = self.document.get_element_by_id(id) {
                    el.set_text_content(Some(text));
                }
            };
            set_text("score", &state.score.to_string());
            set_text("time", &format!("{:.1}s", state.time_left()));
            set_text(
                "streak",
                &if state.streak >= 3 { format!("x{}", state.streak) } else { String::new() },
            );
            set_text("message", &self.message);
            set_text(
                "start",
                match state.status {
                    RunStatus::Idle => "Start",
                    RunStatus::Done => "Play again",
                    RunStatus::Paused => "Restart",
                    _ => "",
                },
            );

            if let Some(bar) = self.document.get_element_by_id("timebar") {
                let pct = (state.time_left() / state.start_time * 100.0).min(100.0);
                let _ = bar.set_attribute("style", &format!("width: {pct:.1}%"));
                let banked = if state.time_banked() { "timebar-fill timebar-fill--banked" } else { "timebar-fill" };
                bar.set_class_name(banked);
            }
        }
    }

    fn request_animation_frame(f: &Closure<dyn FnMut(f64)>) {
        if let Some(window) = web_sys::window() {
            let _ = window.request_animation_frame(f.as_ref().unchecked_ref());
        }
    }

    pub fn run() {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info).expect("Failed to init logger");

        log::info!("Reflex Tile starting...");

        let window = web_sys::window().expect("no window");
        let document = window.document().expect("no document");

        let seed = js_sys::Date::now() as u64;
        let game = Rc::new(RefCell::new(Game::new(seed, document.clone())));
        if let Some(width) = window.inner_width().ok().and_then(|w| w.as_f64()) {
            game.borrow_mut().session.set_viewport_width(width);
        }
        log::info!("Game initialized with seed: {}", seed);

        // Taps on arena cells
        if let Some(arena) = document.get_element_by_id("arena") {
            let g = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |e: PointerEvent| {
                e.prevent_default();
                let cell = e
                    .target()
                    .and_then(|t| t.dyn_into::<Element>().ok())
                    .and_then(|el| el.get_attribute("data-cell"))
                    .and_then(|v| v.parse::<usize>().ok());
                let mut g = g.borrow_mut();
                if matches!(g.session.status(), RunStatus::Idle | RunStatus::Done) {
                    // Touch players start by tapping the idle board
                    g.start();
                } else if let Some(cell) = cell {
                    g.session.tap(cell);
                }
            });
            let _ = arena.add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Start/restart button
        if let Some(button) = document.get_element_by_id("start") {
            let g = game.clone();
            let closure = Closure::<dyn FnMut()>::new(move || {
                let mut g = g.borrow_mut();
                if matches!(
                    g.session.status(),
                    RunStatus::Idle | RunStatus::Done | RunStatus::Paused
                ) {
                    g.start();
                }
            });
            let _ = button.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Keyboard shortcuts
        {
            let g = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |e: KeyboardEvent| {
                let mut g = g.borrow_mut();
                match e.code().as_str() {
                    "Space" => {
                        e.prevent_default();
                        if matches!(g.session.status(), RunStatus::Idle | RunStatus::Done) {
                            g.start();
                        }
                    }
                    "KeyP" | "Escape" => g.session.toggle_pause(),
                    "KeyR" if g.session.status() == RunStatus::Paused => g.start(),
                    "KeyM" => {
                        let on = g.settings.toggle_sound();
                        g.settings.save();
                        log::info!("Sound: {}", on);
                    }
                    _ => {}
                }
            });
            let _ = window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Grid follows the viewport between runs
        {
            let g = game.clone();
            let closure = Closure::<dyn FnMut()>::new(move || {
                if let Some(width) = web_sys::window()
                    .and_then(|w| w.inner_width().ok())
                    .and_then(|w| w.as_f64())
                {
                    g.borrow_mut().session.set_viewport_width(width);
                }
            });
            let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Auto-pause when the tab is hidden
        {
            let g = game.clone();
            let doc = document.clone();
            let closure = Closure::<dyn FnMut()>::new(move || {
                if doc.visibility_state() == VisibilityState::Hidden {
                    let mut g = g.borrow_mut();
                    if g.session.status() == RunStatus::Playing {
                        g.session.pause();
                        log::info!("Auto-paused (tab hidden)");
                    }
                }
            });
            let _ = document
                .add_event_listener_with_callback("visibilitychange", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Main loop
        let f: Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>> = Rc::new(RefCell::new(None));
        let g = f.clone();
        *g.borrow_mut() = Some(Closure::new(move |time: f64| {
            {
                let mut game = game.borrow_mut();
                game.update(time);
                game.render();
            }
            if let Some(cb) = f.borrow().as_ref() {
                request_animation_frame(cb);
            }
        }));
        if let Some(cb) = g.borrow().as_ref() {
            request_animation_frame(cb);
        }

        log::info!("Reflex Tile running!");
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    wasm_game::run();
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Reflex Tile (native) starting...");
    log::info!("Native mode plays a scripted demo run - run with `trunk serve` for the web version");

    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(42);
    let difficulty = std::env::args()
        .nth(2)
        .and_then(|s| reflex_tile::Difficulty::from_str(&s))
        .unwrap_or_default();

    let summary = demo::play(seed, difficulty);
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => log::error!("Could not encode summary: {}", e),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Demo player: taps the live target after a steady reaction time and
/// grabs bonus tiles when they appear
#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use reflex_tile::sim::{RunStatus, RunSummary, Session};
    use reflex_tile::{Difficulty, PersonalBest, Tuning};

    const FRAME_MS: f64 = 1000.0 / 60.0;
    const REACTION_MS: f64 = 380.0;
    const HESITATION_MS: f64 = 3000.0;
    const MAX_FRAMES: u32 = 60 * 60 * 10;

    pub fn play(seed: u64, difficulty: Difficulty) -> Option<RunSummary> {
        let best = PersonalBest::load();
        let mut session = Session::new(seed, difficulty, Tuning::default());
        session.set_personal_best(best.score);
        if let Err(e) = session.start(true) {
            log::error!("{}", e);
            return None;
        }

        let mut waited = 0.0;
        let mut patience = REACTION_MS;
        let mut seen_targets = 0u32;
        let mut last_target = None;
        for _ in 0..MAX_FRAMES {
            session.advance(FRAME_MS);
            if session.status() == RunStatus::Done {
                break;
            }
            let targets = session.state().targets;
            if let Some(bonus) = targets.bonus_cell() {
                session.tap(bonus);
            }
            if targets.active != last_target {
                last_target = targets.active;
                seen_targets += 1;
                waited = 0.0;
                // Every 7th target the bot zones out and lets it expire
                patience = if seen_targets % 7 == 0 {
                    HESITATION_MS
                } else {
                    REACTION_MS + f64::from(seen_targets % 5) * 40.0
                };
            }
            waited += FRAME_MS;
            if waited >= patience {
                if let Some(cell) = targets.active {
                    session.tap(cell);
                }
            }
        }

        if session.status() != RunStatus::Done {
            session.forfeit();
        }
        session.summary().cloned()
    }
}
