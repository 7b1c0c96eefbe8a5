//! App: terminal init, fixed-rate frame loop, menu and challenge flow.

use crate::challenge::{self, ChallengeToken, Verdict};
use crate::game::{GameSession, Gravity, Outcome};
use crate::input::{key_to_command, Command};
use crate::pieces::Rotation;
use crate::theme::Theme;
use crate::{ConfigError, GameConfig};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Without key-release reporting, soft drop stops when no press or repeat arrives for this long.
const SOFT_DROP_HOLD_MS: u64 = 550;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Menu,
    Playing,
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuTab {
    Name,
    Mode,
    Level,
    Start,
}

impl MenuTab {
    fn next(self) -> Self {
        match self {
            Self::Name => Self::Mode,
            Self::Mode => Self::Level,
            Self::Level => Self::Start,
            Self::Start => Self::Name,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Name => Self::Start,
            Self::Mode => Self::Name,
            Self::Level => Self::Mode,
            Self::Start => Self::Level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub current_tab: MenuTab,
    pub name: String,
    pub mode: crate::GameMode,
    pub level: u32,
    pub max_level: u32,
    /// A loaded challenge decides the mode.
    pub mode_locked: bool,
}

impl MenuState {
    fn from_config(config: &GameConfig) -> Self {
        Self {
            current_tab: MenuTab::Start,
            name: config.name.clone(),
            mode: config.mode,
            level: config.level,
            max_level: config.max_level(),
            mode_locked: config.challenge.is_some(),
        }
    }
}

/// What the last finished game left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedGame {
    pub outcome: Outcome,
    pub elapsed_secs: f64,
    pub lines_cleared: u32,
    pub code: Option<String>,
    pub verdict: Option<Verdict>,
    /// Outbox status line; delivery errors land here instead of ending the game.
    pub delivery: Option<String>,
}

impl FinishedGame {
    pub fn verdict_text(&self) -> Option<String> {
        self.verdict.map(|v| match v {
            Verdict::Beat { by } => format!("Challenge won by {by:.2}s"),
            Verdict::Lost { by } => format!("Challenge lost by {by:.2}s"),
            Verdict::Tied => "Challenge tied".to_string(),
        })
    }
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    session: GameSession,
    gravity: Gravity,
    screen: Screen,
    menu_state: MenuState,
    rng: StdRng,
    soft_drop: bool,
    soft_drop_seen: Option<Instant>,
    /// Terminal reports key releases, so soft drop ends on release only.
    release_events: bool,
    last_frame: Instant,
    finished: Option<FinishedGame>,
    /// TachyonFX fade over the board once a game ends.
    game_over_effect: Option<Effect>,
    game_over_effect_time: Option<Instant>,
}

fn gravity_for(config: &GameConfig) -> Result<Gravity, ConfigError> {
    Gravity::new(config.frame_rate, config.level).ok_or(ConfigError::GravityTooFast {
        frame_rate: config.frame_rate,
        level: config.level,
    })
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Result<Self> {
        let gravity = gravity_for(&config)?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let session = GameSession::new(
            config.width as usize,
            config.height as usize,
            config.quota,
            config.level,
            rng.random(),
        );
        let screen = if config.show_menu {
            Screen::Menu
        } else {
            Screen::Playing
        };
        Ok(Self {
            menu_state: MenuState::from_config(&config),
            config,
            theme,
            session,
            gravity,
            screen,
            rng,
            soft_drop: false,
            soft_drop_seen: None,
            release_events: false,
            last_frame: Instant::now(),
            finished: None,
            game_over_effect: None,
            game_over_effect_time: None,
        })
    }

    /// Starts a fresh session from the current config.
    fn new_game(&mut self) -> Result<(), ConfigError> {
        self.gravity = gravity_for(&self.config)?;
        self.session = GameSession::new(
            self.config.width as usize,
            self.config.height as usize,
            self.config.quota,
            self.config.level,
            self.rng.random(),
        );
        self.enter_play();
        Ok(())
    }

    /// Reset command: rebuild the session in place and play again.
    fn reset_game(&mut self) {
        self.session.reset();
        self.enter_play();
    }

    fn enter_play(&mut self) {
        self.screen = Screen::Playing;
        self.soft_drop = false;
        self.soft_drop_seen = None;
        self.finished = None;
        self.game_over_effect = None;
        self.game_over_effect_time = None;
        self.last_frame = Instant::now();
    }

    fn start_from_menu(&mut self) -> Result<(), ConfigError> {
        self.config.name = self.menu_state.name.clone();
        self.config.level = self.menu_state.level;
        if !self.menu_state.mode_locked {
            self.config.mode = self.menu_state.mode;
            self.config.quota = self.config.quota_for(self.config.mode);
        }
        self.new_game()
    }

    /// Applies one game command. Returns false when the player quits.
    fn apply_command(&mut self, command: Command, now: Instant) -> bool {
        match command {
            Command::Quit => return false,
            Command::Reset => self.reset_game(),
            Command::RotateLeft => self.session.rotate(Rotation::Left),
            Command::RotateRight => self.session.rotate(Rotation::Right),
            Command::Rotate180 => self.session.rotate(Rotation::Half),
            Command::MoveLeft => self.session.move_horizontal(-1),
            Command::MoveRight => self.session.move_horizontal(1),
            Command::SoftDropStart => {
                self.soft_drop = true;
                self.soft_drop_seen = Some(now);
            }
            Command::SoftDropStop => {
                self.soft_drop = false;
                self.soft_drop_seen = None;
            }
            Command::HardDrop => {
                self.session.hard_drop();
            }
            Command::None => {}
        }
        true
    }

    /// One gravity step if the cadence fires or soft drop is held.
    fn step_gravity(&mut self, now: Instant) {
        if self.soft_drop && !self.release_events {
            let held = self
                .soft_drop_seen
                .is_some_and(|t| now.duration_since(t) < Duration::from_millis(SOFT_DROP_HOLD_MS));
            if !held {
                self.soft_drop = false;
            }
        }
        let fired = self.gravity.advance();
        if fired || self.soft_drop {
            self.session.tick();
        }
    }

    /// Moves to the game-over screen once the session has ended.
    fn check_finished(&mut self) {
        if self.screen != Screen::Playing {
            return;
        }
        let Some(outcome) = self.session.outcome() else {
            return;
        };
        self.finished = Some(self.finish(outcome));
        self.screen = Screen::GameOver;
        self.soft_drop = false;
    }

    fn finish(&mut self, outcome: Outcome) -> FinishedGame {
        let elapsed_secs = self.session.elapsed_secs();
        let mut done = FinishedGame {
            outcome,
            elapsed_secs,
            lines_cleared: self.session.lines_cleared,
            code: None,
            verdict: None,
            delivery: None,
        };
        if outcome != Outcome::Cleared {
            return done;
        }
        done.verdict = self
            .config
            .challenge
            .as_ref()
            .map(|c| c.race(elapsed_secs));
        if !self.config.issues_codes() {
            return done;
        }
        let token = match ChallengeToken::new(&self.config.name, elapsed_secs, self.config.mode) {
            Ok(t) => t,
            Err(e) => {
                done.delivery = Some(format!("No challenge code: {e}"));
                return done;
            }
        };
        let code = token.encode(&mut self.rng);
        if let Some(outbox) = &self.config.outbox {
            done.delivery = Some(match challenge::deliver(outbox, &code) {
                Ok(()) => format!("Challenge code saved to {}", outbox.display()),
                Err(e) => format!("Could not send challenge: {e}"),
            });
        }
        done.code = Some(code);
        done
    }

    /// Menu keys. Returns false when the player quits.
    fn handle_menu_key(&mut self, key: KeyEvent) -> Result<bool> {
        if key.kind != KeyEventKind::Press {
            return Ok(true);
        }
        if self.menu_state.current_tab == MenuTab::Name {
            match key.code {
                KeyCode::Char(c)
                    if !c.is_ascii_digit()
                        && !c.is_control()
                        && !key.modifiers.contains(KeyModifiers::CONTROL) =>
                {
                    if self.menu_state.name.chars().count() < 16 {
                        self.menu_state.name.push(c);
                    }
                    return Ok(true);
                }
                KeyCode::Backspace => {
                    self.menu_state.name.pop();
                    return Ok(true);
                }
                _ => {}
            }
        }
        if key.code == KeyCode::Enter {
            if self.menu_state.current_tab == MenuTab::Start {
                self.start_from_menu()?;
            } else {
                self.menu_state.current_tab = MenuTab::Start;
            }
            return Ok(true);
        }
        let command = key_to_command(key);
        match command {
            Command::Quit => return Ok(false),
            Command::SoftDropStart => {
                self.menu_state.current_tab = self.menu_state.current_tab.next();
            }
            Command::RotateRight => {
                self.menu_state.current_tab = self.menu_state.current_tab.prev();
            }
            Command::MoveLeft | Command::MoveRight => {
                let right = command == Command::MoveRight;
                let menu = &mut self.menu_state;
                match menu.current_tab {
                    MenuTab::Mode if !menu.mode_locked => {
                        menu.mode = if right { menu.mode.next() } else { menu.mode.prev() };
                    }
                    MenuTab::Level => {
                        menu.level = if right {
                            (menu.level + 1).min(menu.max_level)
                        } else {
                            menu.level.saturating_sub(1).max(1)
                        };
                    }
                    _ => {}
                }
            }
            Command::HardDrop if self.menu_state.current_tab == MenuTab::Start => {
                self.start_from_menu()?;
            }
            _ => {}
        }
        Ok(true)
    }

    /// Game-over keys. Returns false when the player quits.
    fn handle_game_over_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return true;
        }
        if matches!(key.code, KeyCode::Char('m') | KeyCode::Char('M')) {
            self.menu_state = MenuState::from_config(&self.config);
            self.screen = Screen::Menu;
            return true;
        }
        match key_to_command(key) {
            Command::Quit => false,
            Command::Reset => {
                self.reset_game();
                true
            }
            _ => true,
        }
    }

    /// Runs until the player quits; returns the last finished game.
    pub fn run(&mut self) -> Result<Option<FinishedGame>> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen, LeaveAlternateScreen},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        // Release events let soft drop stop exactly when Down is let go
        self.release_events = supports_keyboard_enhancement().unwrap_or(false);
        if self.release_events {
            let _ = execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            );
        }

        let mut terminal = DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;
        self.last_frame = Instant::now();
        let result = self.run_loop(&mut terminal);

        if self.release_events {
            let _ = execute!(std::io::stdout(), PopKeyboardEnhancementFlags);
        }
        execute!(std::io::stdout(), LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result.map(|()| self.finished.take())
    }

    /// Frame order: gravity, queued input in arrival order, clock, draw, sleep.
    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / f64::from(self.config.frame_rate));
        loop {
            let now = Instant::now();

            if self.screen == Screen::Playing {
                self.step_gravity(now);
            }

            while event::poll(Duration::ZERO)? {
                let Event::Key(key) = event::read()? else {
                    continue;
                };
                let keep_running = match self.screen {
                    Screen::Menu => self.handle_menu_key(key)?,
                    Screen::Playing => self.apply_command(key_to_command(key), now),
                    Screen::GameOver => self.handle_game_over_key(key),
                };
                if !keep_running {
                    return Ok(());
                }
            }

            if self.screen == Screen::Playing {
                self.session.advance_clock(now.duration_since(self.last_frame));
                self.check_finished();
            }
            self.last_frame = now;

            let hud = crate::ui::Hud {
                mode: self.config.mode,
                custom_quota: !self.config.issues_codes(),
                name: &self.config.name,
                challenge: self.config.challenge.as_ref(),
                finished: self.finished.as_ref(),
            };
            terminal.draw(|f| {
                crate::ui::draw(
                    f,
                    self.screen,
                    &self.session.snapshot(),
                    &hud,
                    &self.menu_state,
                    &self.theme,
                    &mut self.game_over_effect,
                    &mut self.game_over_effect_time,
                    now,
                )
            })?;

            let spent = now.elapsed();
            if spent < frame_duration {
                std::thread::sleep(frame_duration - spent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::pieces::PieceType;
    use crate::{Args, GameMode};
    use clap::Parser;

    fn app(argv: &[&str]) -> App {
        let args = Args::try_parse_from(
            ["quotris", "--seed", "5", "--no-menu"]
                .into_iter()
                .chain(argv.iter().copied()),
        )
        .expect("valid arguments");
        let config = GameConfig::from_args(&args).expect("valid config");
        App::new(config, Theme::default()).expect("app")
    }

    fn win_next_drop(app: &mut App) {
        let quota = app.session.lines_remaining as usize;
        let board: &mut Board = &mut app.session.board;
        for row in (board.height - quota)..board.height {
            for col in 0..board.width {
                if col != 4 {
                    board.set(row, col, 2);
                }
            }
        }
        app.session.spawn_kind(PieceType::Line);
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, crossterm::event::KeyModifiers::NONE)
    }

    #[test]
    fn commands_drive_the_session() {
        let mut app = app(&[]);
        app.session.spawn_kind(PieceType::T);
        let now = Instant::now();
        assert!(app.apply_command(Command::MoveLeft, now));
        assert_eq!(app.session.active.map(|p| p.col), Some(2));
        app.apply_command(Command::RotateRight, now);
        assert_eq!(app.session.active.map(|p| p.rotation), Some(3));
        app.apply_command(Command::Rotate180, now);
        assert_eq!(app.session.active.map(|p| p.rotation), Some(1));
        assert!(!app.apply_command(Command::Quit, now));
    }

    #[test]
    fn soft_drop_ticks_every_frame_while_held() {
        let mut app = app(&[]);
        app.release_events = true;
        app.session.spawn_kind(PieceType::Square);
        let now = Instant::now();
        app.apply_command(Command::SoftDropStart, now);
        for _ in 0..3 {
            app.step_gravity(now);
        }
        assert_eq!(app.session.active.map(|p| p.row), Some(3));
        app.apply_command(Command::SoftDropStop, now);
        app.step_gravity(now);
        assert_eq!(app.session.active.map(|p| p.row), Some(3));
    }

    #[test]
    fn soft_drop_expires_without_release_events() {
        let mut app = app(&[]);
        app.session.spawn_kind(PieceType::Square);
        let start = Instant::now();
        app.apply_command(Command::SoftDropStart, start);
        app.step_gravity(start + Duration::from_millis(SOFT_DROP_HOLD_MS + 1));
        assert!(!app.soft_drop);
        assert_eq!(app.session.active.map(|p| p.row), Some(0));
    }

    #[test]
    fn gravity_follows_frame_cadence() {
        let mut app = app(&[]);
        app.session.spawn_kind(PieceType::Square);
        let now = Instant::now();
        for _ in 0..11 {
            app.step_gravity(now);
        }
        assert_eq!(app.session.active.map(|p| p.row), Some(0));
        app.step_gravity(now);
        assert_eq!(app.session.active.map(|p| p.row), Some(1));
    }

    #[test]
    fn winning_issues_a_decodable_code() {
        let mut app = app(&["--mode", "10", "--name", "Ana"]);
        app.session.lines_remaining = 1;
        win_next_drop(&mut app);
        app.apply_command(Command::HardDrop, Instant::now());
        app.check_finished();
        assert_eq!(app.screen, Screen::GameOver);
        let done = app.finished.clone().expect("finished");
        assert_eq!(done.outcome, Outcome::Cleared);
        let code = done.code.expect("code");
        let token = ChallengeToken::decode(&code).expect("decodes");
        assert_eq!(token.name, "Ana");
        assert_eq!(token.mode, GameMode::Sprint10);
        assert_eq!(done.verdict, None);
    }

    #[test]
    fn topping_out_issues_no_code() {
        let mut app = app(&[]);
        for row in 0..2 {
            for col in 0..10 {
                app.session.board.set(row, col, 1);
            }
        }
        app.session.spawn_next();
        app.check_finished();
        let done = app.finished.clone().expect("finished");
        assert_eq!(done.outcome, Outcome::ToppedOut);
        assert!(done.code.is_none());
        assert!(done.verdict_text().is_none());
    }

    #[test]
    fn racing_a_challenge_reports_verdict() {
        let code = format!("Bo{}99.00{}1", "3".repeat(25), "8".repeat(26));
        let mut app = app(&["--challenge", code.as_str()]);
        assert_eq!(app.config.quota, 10);
        app.session.lines_remaining = 1;
        app.session.advance_clock(Duration::from_secs(42));
        win_next_drop(&mut app);
        app.session.hard_drop();
        app.check_finished();
        let done = app.finished.clone().expect("finished");
        assert_eq!(done.verdict, Some(Verdict::Beat { by: 57.0 }));
        assert_eq!(done.verdict_text().as_deref(), Some("Challenge won by 57.00s"));
    }

    #[test]
    fn practice_quota_issues_no_code() {
        let mut app = app(&["--lines", "1"]);
        win_next_drop(&mut app);
        app.session.hard_drop();
        app.check_finished();
        let done = app.finished.clone().expect("finished");
        assert_eq!(done.outcome, Outcome::Cleared);
        assert!(done.code.is_none());
    }

    #[test]
    fn delivery_failure_is_reported_not_fatal() {
        let dir = std::env::temp_dir().join(format!("quotris-app-outbox-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let outbox = dir.to_string_lossy().to_string();
        let mut app = app(&["--mode", "10", "--outbox", outbox.as_str()]);
        app.session.lines_remaining = 1;
        win_next_drop(&mut app);
        app.session.hard_drop();
        app.check_finished();
        let done = app.finished.clone().expect("finished");
        assert!(done.code.is_some());
        assert!(done
            .delivery
            .as_deref()
            .is_some_and(|s| s.starts_with("Could not send challenge")));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn reset_after_game_over_starts_again() {
        let mut app = app(&[]);
        for col in 0..10 {
            app.session.board.set(0, col, 1);
            app.session.board.set(1, col, 1);
        }
        app.session.spawn_next();
        app.check_finished();
        assert_eq!(app.screen, Screen::GameOver);
        assert!(app.handle_game_over_key(key(KeyCode::Char('r'))));
        assert_eq!(app.screen, Screen::Playing);
        assert!(app.session.is_playing());
        assert!(app.finished.is_none());
    }

    #[test]
    fn menu_edits_name_and_starts_game() {
        let mut app = app(&[]);
        app.screen = Screen::Menu;
        app.menu_state.current_tab = MenuTab::Name;
        app.menu_state.name.clear();
        for c in ['Z', 'o', '7', 'e'] {
            app.handle_menu_key(key(KeyCode::Char(c))).unwrap();
        }
        assert_eq!(app.menu_state.name, "Zoe");
        app.handle_menu_key(key(KeyCode::Down)).unwrap();
        assert_eq!(app.menu_state.current_tab, MenuTab::Mode);
        app.handle_menu_key(key(KeyCode::Right)).unwrap();
        assert_eq!(app.menu_state.mode, GameMode::Sprint10);
        app.handle_menu_key(key(KeyCode::Down)).unwrap();
        app.handle_menu_key(key(KeyCode::Left)).unwrap();
        app.handle_menu_key(key(KeyCode::Left)).unwrap();
        assert_eq!(app.menu_state.level, 1);
        app.handle_menu_key(key(KeyCode::Enter)).unwrap();
        assert_eq!(app.menu_state.current_tab, MenuTab::Start);
        app.handle_menu_key(key(KeyCode::Enter)).unwrap();
        assert_eq!(app.screen, Screen::Playing);
        assert_eq!(app.config.name, "Zoe");
        assert_eq!(app.config.quota, 10);
        assert_eq!(app.session.level, 1);
    }

    #[test]
    fn menu_start_keeps_practice_quota() {
        let mut app = app(&["--lines", "3"]);
        app.screen = Screen::Menu;
        app.menu_state.current_tab = MenuTab::Mode;
        app.handle_menu_key(key(KeyCode::Right)).unwrap();
        app.handle_menu_key(key(KeyCode::Enter)).unwrap();
        app.handle_menu_key(key(KeyCode::Enter)).unwrap();
        assert_eq!(app.screen, Screen::Playing);
        assert_eq!(app.config.mode, GameMode::Sprint10);
        assert_eq!(app.session.quota, 3);
        assert_eq!(app.session.lines_remaining, 3);
        assert!(!app.config.issues_codes());
    }

    #[test]
    fn menu_keeps_challenge_mode() {
        let code = format!("Bo{}99.00{}2", "3".repeat(25), "8".repeat(26));
        let mut app = app(&["--challenge", code.as_str()]);
        app.screen = Screen::Menu;
        app.menu_state.current_tab = MenuTab::Mode;
        app.handle_menu_key(key(KeyCode::Right)).unwrap();
        assert_eq!(app.menu_state.mode, GameMode::Sprint20);
        assert!(!app.handle_menu_key(key(KeyCode::Char('q'))).unwrap());
    }
}
