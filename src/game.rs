//! Game engine: spawn, gravity, movement, lock, line clear, win/lose.

use crate::board::Board;
use crate::pieces::{ActivePiece, PieceType, Rotation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Frame counter wrap point, in half steps (100_000 whole counter units).
const COUNTER_WRAP_HALF_STEPS: u32 = 200_000;

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Line quota met.
    Cleared,
    /// A freshly spawned piece overlapped the stack.
    ToppedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Start,
    GameOver(Outcome),
}

impl GameState {
    pub fn outcome(self) -> Option<Outcome> {
        match self {
            Self::Start => None,
            Self::GameOver(outcome) => Some(outcome),
        }
    }
}

/// Gravity cadence: one step every `frame_rate / level / 2` counter units.
///
/// The counter moves half a unit per frame, so a step fires every
/// `2 * interval` frames, and a held soft drop fires every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gravity {
    interval: u32,
    half_steps: u32,
}

impl Gravity {
    /// `None` when the integer interval would be zero.
    pub fn new(frame_rate: u32, level: u32) -> Option<Self> {
        let interval = Self::interval(frame_rate, level)?;
        Some(Self {
            interval,
            half_steps: 0,
        })
    }

    pub fn interval(frame_rate: u32, level: u32) -> Option<u32> {
        frame_rate
            .checked_div(level)
            .map(|per_level| per_level / 2)
            .filter(|&interval| interval > 0)
    }

    /// Advances one frame and reports whether gravity fires on it.
    pub fn advance(&mut self) -> bool {
        self.half_steps += 1;
        if self.half_steps > COUNTER_WRAP_HALF_STEPS {
            self.half_steps = 0;
        }
        self.half_steps % (2 * self.interval) == 0
    }
}

/// Read-only view handed to the renderer each frame.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub board: &'a Board,
    pub active: Option<ActivePiece>,
    pub quota: u32,
    pub lines_remaining: i32,
    pub lines_cleared: u32,
    pub level: u32,
    pub elapsed: Duration,
    pub state: GameState,
}

impl Snapshot<'_> {
    pub fn outcome(&self) -> Option<Outcome> {
        self.state.outcome()
    }
}

/// One game: board, falling piece, quota and clock.
#[derive(Debug)]
pub struct GameSession {
    pub board: Board,
    pub active: Option<ActivePiece>,
    pub quota: u32,
    pub lines_remaining: i32,
    pub lines_cleared: u32,
    pub level: u32,
    pub elapsed: Duration,
    pub state: GameState,
    rng: StdRng,
}

impl GameSession {
    /// Empty board with the first piece already spawned.
    /// Quotas beyond `i32::MAX` saturate; `GameConfig` rejects them up front.
    pub fn new(width: usize, height: usize, quota: u32, level: u32, seed: u64) -> Self {
        let mut session = Self {
            board: Board::new(width, height),
            active: None,
            quota,
            lines_remaining: i32::try_from(quota).unwrap_or(i32::MAX),
            lines_cleared: 0,
            level,
            elapsed: Duration::ZERO,
            state: GameState::Start,
            rng: StdRng::seed_from_u64(seed),
        };
        session.spawn_next();
        session
    }

    /// Rebuilds the session from scratch with the same dimensions, quota and level.
    pub fn reset(&mut self) {
        let seed = self.rng.random();
        *self = Self::new(
            self.board.width,
            self.board.height,
            self.quota,
            self.level,
            seed,
        );
    }

    pub fn is_playing(&self) -> bool {
        self.state == GameState::Start
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.state.outcome()
    }

    /// Top-row spawn column that centres the 4x4 window.
    pub fn spawn_col(&self) -> i32 {
        (self.board.width as i32 - 4) / 2
    }

    pub fn spawn_next(&mut self) {
        if !self.is_playing() {
            return;
        }
        let kind = PieceType::ALL[self.rng.random_range(0..PieceType::ALL.len())];
        self.spawn_kind(kind);
    }

    /// Replaces the active piece; a spawn that overlaps the stack ends the game.
    /// Ignored once the game is over.
    pub fn spawn_kind(&mut self, kind: PieceType) {
        if !self.is_playing() {
            return;
        }
        let piece = ActivePiece::spawn(kind, 0, self.spawn_col());
        self.active = Some(piece);
        if self.board.intersects(&piece) {
            self.state = GameState::GameOver(Outcome::ToppedOut);
        }
    }

    fn playing_piece(&self) -> Option<ActivePiece> {
        if self.is_playing() { self.active } else { None }
    }

    /// Gravity step: down one row, or lock if blocked.
    pub fn tick(&mut self) {
        let Some(mut piece) = self.playing_piece() else {
            return;
        };
        piece.row += 1;
        if self.board.intersects(&piece) {
            self.lock_and_advance();
        } else {
            self.active = Some(piece);
        }
    }

    /// Freezes the piece, clears lines, then ends the game or spawns the next piece.
    /// Returns the number of lines cleared.
    pub fn lock_and_advance(&mut self) -> u32 {
        let Some(piece) = self.playing_piece() else {
            return 0;
        };
        self.active = None;
        self.board.freeze(&piece);
        let cleared = self.board.clear_completed_lines();
        self.lines_cleared += cleared;
        self.lines_remaining -= cleared as i32;
        if self.lines_remaining <= 0 {
            self.state = GameState::GameOver(Outcome::Cleared);
        } else {
            self.spawn_next();
        }
        cleared
    }

    /// Shifts the piece one column; `delta` is -1 (left) or +1 (right).
    pub fn move_horizontal(&mut self, delta: i32) {
        let Some(mut piece) = self.playing_piece() else {
            return;
        };
        piece.col += delta.signum();
        if !self.board.intersects(&piece) {
            self.active = Some(piece);
        }
    }

    /// Rotates in place; a rotation that would overlap is rejected.
    pub fn rotate(&mut self, rotation: Rotation) {
        let Some(mut piece) = self.playing_piece() else {
            return;
        };
        piece.rotate(rotation);
        if !self.board.intersects(&piece) {
            self.active = Some(piece);
        }
    }

    /// Drops straight down to the last free row and locks immediately.
    pub fn hard_drop(&mut self) -> u32 {
        let Some(mut piece) = self.playing_piece() else {
            return 0;
        };
        loop {
            let mut below = piece;
            below.row += 1;
            if self.board.intersects(&below) {
                break;
            }
            piece = below;
        }
        self.active = Some(piece);
        self.lock_and_advance()
    }

    /// Adds frame time to the clock while the game is running.
    pub fn advance_clock(&mut self, dt: Duration) {
        if self.is_playing() {
            self.elapsed += dt;
        }
    }

    /// Elapsed seconds rounded to hundredths.
    pub fn elapsed_secs(&self) -> f64 {
        (self.elapsed.as_secs_f64() * 100.0).round() / 100.0
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            board: &self.board,
            active: self.active,
            quota: self.quota,
            lines_remaining: self.lines_remaining,
            lines_cleared: self.lines_cleared,
            level: self.level,
            elapsed: self.elapsed,
            state: self.state,
        }
    }
}
