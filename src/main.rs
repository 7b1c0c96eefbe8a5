//! Quotris: clear a quota of lines against the clock, then challenge a friend to beat your time.

mod app;
mod board;
mod challenge;
mod game;
mod input;
mod pieces;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use challenge::{ChallengeToken, DecodeError};
use clap::{Parser, ValueEnum};
use game::{Gravity, Outcome};
use std::path::PathBuf;
use thiserror::Error;

/// Validated settings for a run; built once from [`Args`] before the terminal is touched.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub mode: GameMode,
    pub quota: u32,
    /// Practice quota from `--lines`; survives mode changes in the menu.
    pub practice_quota: Option<u32>,
    pub level: u32,
    pub frame_rate: u32,
    pub width: u16,
    pub height: u16,
    pub name: String,
    pub challenge: Option<ChallengeToken>,
    pub outbox: Option<PathBuf>,
    pub seed: Option<u64>,
    pub show_menu: bool,
}

/// Largest playfield accepted on either axis.
pub const MAX_BOARD_SIDE: u16 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("frame rate must be greater than zero")]
    ZeroFrameRate,
    #[error("level must be greater than zero")]
    ZeroLevel,
    #[error("frame rate {frame_rate} is too low for level {level} (frame rate / level / 2 must be at least 1)")]
    GravityTooFast { frame_rate: u32, level: u32 },
    #[error("board must be at least 4x4 cells, got {width}x{height}")]
    BoardTooSmall { width: u16, height: u16 },
    #[error("board must be at most {max}x{max} cells, got {width}x{height}", max = MAX_BOARD_SIDE)]
    BoardTooLarge { width: u16, height: u16 },
    #[error("line quota must be at least 1")]
    ZeroQuota,
    #[error("line quota {0} is too large (at most {max})", max = i32::MAX)]
    QuotaTooLarge(u32),
    #[error("player name {0:?} must not contain digits")]
    NameContainsDigit(String),
    #[error("invalid challenge code")]
    Challenge(#[from] DecodeError),
}

impl GameConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if args.frame_rate == 0 {
            return Err(ConfigError::ZeroFrameRate);
        }
        if args.level == 0 {
            return Err(ConfigError::ZeroLevel);
        }
        if Gravity::interval(args.frame_rate, args.level).is_none() {
            return Err(ConfigError::GravityTooFast {
                frame_rate: args.frame_rate,
                level: args.level,
            });
        }
        if args.width < 4 || args.height < 4 {
            return Err(ConfigError::BoardTooSmall {
                width: args.width,
                height: args.height,
            });
        }
        if args.width > MAX_BOARD_SIDE || args.height > MAX_BOARD_SIDE {
            return Err(ConfigError::BoardTooLarge {
                width: args.width,
                height: args.height,
            });
        }
        if args.name.chars().any(|c| c.is_ascii_digit()) {
            return Err(ConfigError::NameContainsDigit(args.name.clone()));
        }

        let challenge = args
            .challenge
            .as_deref()
            .map(ChallengeToken::decode)
            .transpose()?;
        // a challenge fixes the mode and its quota
        let mode = challenge.as_ref().map_or(args.mode, |c| c.mode);
        let practice_quota = if challenge.is_none() { args.lines } else { None };
        let quota = practice_quota.unwrap_or(mode.quota());
        if quota == 0 {
            return Err(ConfigError::ZeroQuota);
        }
        if i32::try_from(quota).is_err() {
            return Err(ConfigError::QuotaTooLarge(quota));
        }

        Ok(Self {
            mode,
            quota,
            practice_quota,
            level: args.level,
            frame_rate: args.frame_rate,
            width: args.width,
            height: args.height,
            name: args.name.clone(),
            challenge,
            outbox: args.outbox.clone(),
            seed: args.seed,
            show_menu: !args.no_menu,
        })
    }

    /// Highest level whose gravity interval is still at least one frame pair.
    pub fn max_level(&self) -> u32 {
        (self.frame_rate / 2).max(1)
    }

    /// Only standard quotas produce a challenge code.
    pub fn issues_codes(&self) -> bool {
        self.practice_quota.is_none()
    }

    /// Quota for the selected mode unless a practice quota was given.
    pub fn quota_for(&self, mode: GameMode) -> u32 {
        self.practice_quota.unwrap_or(mode.quota())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(code) = args.decode.as_deref() {
        let token = ChallengeToken::decode(code).context("decoding challenge code")?;
        println!("Challenger: {}", token.name);
        println!("Mode:       {} ({} lines)", token.mode.label(), token.mode.quota());
        println!("Time:       {}s", token.elapsed_text());
        return Ok(());
    }

    let config = GameConfig::from_args(&args).context("invalid configuration")?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let mut app = App::new(config, theme)?;
    let finished = app.run()?;

    if let Some(done) = finished {
        match done.outcome {
            Outcome::Cleared => println!(
                "Cleared {} lines in {:.2}s",
                done.lines_cleared, done.elapsed_secs
            ),
            Outcome::ToppedOut => println!("Game over after {:.2}s", done.elapsed_secs),
        }
        if let Some(verdict) = done.verdict_text() {
            println!("{verdict}");
        }
        if let Some(code) = &done.code {
            println!("Challenge code: {code}");
        }
        if let Some(status) = &done.delivery {
            println!("{status}");
        }
    }
    Ok(())
}

/// Falling-block sprint: clear the line quota as fast as you can.
#[derive(Debug, Parser)]
#[command(
    name = "quotris",
    version,
    about = "Falling-block sprint in the terminal. Clear the line quota as fast as you can, then challenge a friend.",
    long_about = "Quotris is a terminal falling-block sprint.\n\n\
        Clear the mode's line quota (10, 20 or 40 lines) before the stack reaches the top. \
        Finishing a sprint prints a challenge code; a friend can race your time with --challenge.\n\n\
        CONTROLS:\n  Left/Right  Move      Up   Rotate right   z  Rotate left   a  Rotate 180\n  \
        Down        Soft drop Space Hard drop     Esc / r  Reset   q  Quit"
)]
pub struct Args {
    /// Sprint length: sprint10, sprint20 or sprint40.
    #[arg(short, long, default_value = "sprint40")]
    pub mode: GameMode,

    /// Practice quota overriding the mode's line count (no challenge code is issued).
    #[arg(long, value_name = "N")]
    pub lines: Option<u32>,

    /// Gravity divisor: higher is faster.
    #[arg(short, long, default_value = "2", value_name = "N")]
    pub level: u32,

    /// Frames per second; gravity fires every frame_rate / level / 2 counter steps.
    #[arg(long, default_value = "25", value_name = "FPS")]
    pub frame_rate: u32,

    /// Playfield width in cells.
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub width: u16,

    /// Playfield height in cells.
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub height: u16,

    /// Player name written into challenge codes (no digits).
    #[arg(short, long, default_value = "Player")]
    pub name: String,

    /// Race a friend's challenge code; its mode decides the quota.
    #[arg(short, long, value_name = "CODE")]
    pub challenge: Option<String>,

    /// Append the challenge code of every finished sprint to this file.
    #[arg(long, value_name = "FILE")]
    pub outbox: Option<PathBuf>,

    /// Seed for a reproducible piece sequence.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip the menu and start immediately.
    #[arg(long)]
    pub no_menu: bool,

    /// Path to theme file (btop-style theme[key]="value").
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Print the contents of a challenge code and exit.
    #[arg(long, value_name = "CODE")]
    pub decode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

/// Sprint length; the digit is what challenge codes carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GameMode {
    #[value(name = "sprint10", alias = "10")]
    Sprint10,
    #[value(name = "sprint20", alias = "20")]
    Sprint20,
    #[default]
    #[value(name = "sprint40", alias = "40")]
    Sprint40,
}

impl GameMode {
    pub const ALL: [Self; 3] = [Self::Sprint10, Self::Sprint20, Self::Sprint40];

    pub fn digit(self) -> u8 {
        match self {
            Self::Sprint10 => 1,
            Self::Sprint20 => 2,
            Self::Sprint40 => 3,
        }
    }

    pub fn from_digit(digit: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.digit() == digit)
    }

    pub fn quota(self) -> u32 {
        match self {
            Self::Sprint10 => 10,
            Self::Sprint20 => 20,
            Self::Sprint40 => 40,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sprint10 => "Sprint 10",
            Self::Sprint20 => "Sprint 20",
            Self::Sprint40 => "Sprint 40",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Sprint10 => Self::Sprint20,
            Self::Sprint20 => Self::Sprint40,
            Self::Sprint40 => Self::Sprint10,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Sprint10 => Self::Sprint40,
            Self::Sprint20 => Self::Sprint10,
            Self::Sprint40 => Self::Sprint20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("quotris").chain(argv.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn defaults_match_classic_setup() {
        let config = GameConfig::from_args(&parse(&[])).unwrap();
        assert_eq!((config.width, config.height), (10, 20));
        assert_eq!((config.frame_rate, config.level), (25, 2));
        assert_eq!(config.mode, GameMode::Sprint40);
        assert_eq!(config.quota, 40);
        assert!(config.issues_codes());
        assert!(config.show_menu);
    }

    #[test]
    fn mode_digits_round_trip() {
        for mode in GameMode::ALL {
            assert_eq!(GameMode::from_digit(mode.digit()), Some(mode));
            assert_eq!(mode.next().prev(), mode);
        }
        assert_eq!(GameMode::from_digit(0), None);
        assert_eq!(GameMode::from_digit(4), None);
    }

    #[test]
    fn mode_aliases_parse() {
        assert_eq!(parse(&["--mode", "10"]).mode, GameMode::Sprint10);
        assert_eq!(parse(&["-m", "sprint20"]).mode, GameMode::Sprint20);
    }

    #[test]
    fn zero_frame_rate_is_fatal() {
        let err = GameConfig::from_args(&parse(&["--frame-rate", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroFrameRate));
    }

    #[test]
    fn zero_level_is_fatal() {
        let err = GameConfig::from_args(&parse(&["--level", "0"])).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroLevel));
    }

    #[test]
    fn zero_gravity_interval_is_fatal() {
        let err = GameConfig::from_args(&parse(&["--frame-rate", "25", "--level", "13"])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::GravityTooFast { frame_rate: 25, level: 13 }
        ));
        assert!(GameConfig::from_args(&parse(&["--level", "12"])).is_ok());
    }

    #[test]
    fn tiny_board_and_bad_name_are_rejected() {
        assert!(matches!(
            GameConfig::from_args(&parse(&["--width", "3"])),
            Err(ConfigError::BoardTooSmall { width: 3, height: 20 })
        ));
        assert!(matches!(
            GameConfig::from_args(&parse(&["--name", "Ace1"])),
            Err(ConfigError::NameContainsDigit(_))
        ));
        assert!(matches!(
            GameConfig::from_args(&parse(&["--lines", "0"])),
            Err(ConfigError::ZeroQuota)
        ));
    }

    #[test]
    fn oversized_board_is_rejected() {
        assert!(matches!(
            GameConfig::from_args(&parse(&["--width", "40000", "--height", "4"])),
            Err(ConfigError::BoardTooLarge { width: 40000, height: 4 })
        ));
        assert!(matches!(
            GameConfig::from_args(&parse(&["--height", "101"])),
            Err(ConfigError::BoardTooLarge { width: 10, height: 101 })
        ));
        assert!(GameConfig::from_args(&parse(&["--width", "100", "--height", "100"])).is_ok());
    }

    #[test]
    fn quota_beyond_i32_is_rejected() {
        assert!(matches!(
            GameConfig::from_args(&parse(&["--lines", "3000000000"])),
            Err(ConfigError::QuotaTooLarge(3_000_000_000))
        ));
        let config = GameConfig::from_args(&parse(&["--lines", "2147483647"])).unwrap();
        assert_eq!(config.quota, 2_147_483_647);
    }

    #[test]
    fn practice_quota_issues_no_codes() {
        let config = GameConfig::from_args(&parse(&["--lines", "3"])).unwrap();
        assert_eq!(config.quota, 3);
        assert_eq!(config.practice_quota, Some(3));
        assert_eq!(config.quota_for(GameMode::Sprint10), 3);
        assert!(!config.issues_codes());
    }

    #[test]
    fn challenge_code_fixes_mode_and_quota() {
        let code = format!("Ana{}83.25{}1", "4".repeat(25), "2".repeat(26));
        let config =
            GameConfig::from_args(&parse(&["--challenge", code.as_str(), "--lines", "3"])).unwrap();
        assert_eq!(config.mode, GameMode::Sprint10);
        assert_eq!(config.quota, 10);
        assert_eq!(config.practice_quota, None);
        assert_eq!(config.challenge.map(|c| c.name), Some("Ana".to_string()));
    }

    #[test]
    fn bad_challenge_code_is_fatal() {
        let err = GameConfig::from_args(&parse(&["--challenge", "Ana123"])).unwrap_err();
        assert!(matches!(err, ConfigError::Challenge(DecodeError::TooShort(3))));
    }

    #[test]
    fn max_level_keeps_gravity_valid() {
        let config = GameConfig::from_args(&parse(&[])).unwrap();
        assert_eq!(config.max_level(), 12);
        assert!(Gravity::interval(config.frame_rate, config.max_level()).is_some());
    }
}
