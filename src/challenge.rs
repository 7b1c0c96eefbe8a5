//! Challenge codes: name, finishing time and mode hidden in a run of random digits.
//!
//! Layout: `name | 25 filler digits | time (2 decimals) | 26 filler digits | mode digit`.
//! The name is recovered as everything before the first ASCII digit, so names may not
//! contain digits. This is obfuscation, not encryption.

use crate::GameMode;
use rand::Rng;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Random digits surrounding the time.
pub const FILLER_LEN: usize = 51;
/// Filler digits before the time.
const TIME_OFFSET: usize = 25;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("name {0:?} contains a digit")]
    NameContainsDigit(String),
    #[error("time must be a finite, non-negative number of seconds")]
    InvalidTime,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("challenge code is empty")]
    Empty,
    #[error("challenge code has no digits after the name")]
    MissingDigits,
    #[error("challenge code contains non-ASCII characters after the name")]
    NonAscii,
    #[error("challenge code is too short ({0} characters after the name)")]
    TooShort(usize),
    #[error("challenge code filler is not all digits")]
    BadFiller,
    #[error("invalid time {0:?} in challenge code")]
    InvalidTime(String),
    #[error("invalid game mode {0:?} in challenge code")]
    InvalidMode(char),
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not write challenge to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of racing a challenger's time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Beat { by: f64 },
    Lost { by: f64 },
    Tied,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeToken {
    pub mode: GameMode,
    pub name: String,
    pub elapsed_secs: f64,
}

impl ChallengeToken {
    pub fn new(name: &str, elapsed_secs: f64, mode: GameMode) -> Result<Self, EncodeError> {
        if name.chars().any(|c| c.is_ascii_digit()) {
            return Err(EncodeError::NameContainsDigit(name.to_string()));
        }
        if !elapsed_secs.is_finite() || elapsed_secs < 0.0 {
            return Err(EncodeError::InvalidTime);
        }
        Ok(Self {
            mode,
            name: name.to_string(),
            elapsed_secs,
        })
    }

    /// Time as written into the code.
    pub fn elapsed_text(&self) -> String {
        format!("{:.2}", self.elapsed_secs)
    }

    fn elapsed_centis(&self) -> i64 {
        (self.elapsed_secs * 100.0).round() as i64
    }

    pub fn encode<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let filler: String = (0..FILLER_LEN)
            .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
            .collect();
        let time = self.elapsed_text();
        let mut out = String::with_capacity(self.name.len() + FILLER_LEN + time.len() + 1);
        out.push_str(&self.name);
        out.push_str(&filler[..TIME_OFFSET]);
        out.push_str(&time);
        out.push_str(&filler[TIME_OFFSET..]);
        out.push(char::from(b'0' + self.mode.digit()));
        out
    }

    /// Trailing whitespace (a pasted newline) is ignored; leading whitespace belongs to the name.
    pub fn decode(token: &str) -> Result<Self, DecodeError> {
        let token = token.trim_end();
        if token.is_empty() {
            return Err(DecodeError::Empty);
        }
        let name_end = token
            .find(|c: char| c.is_ascii_digit())
            .ok_or(DecodeError::MissingDigits)?;
        let (name, rest) = token.split_at(name_end);
        if !rest.is_ascii() {
            return Err(DecodeError::NonAscii);
        }
        // filler plus at least one time character plus the mode digit
        if rest.len() < FILLER_LEN + 2 {
            return Err(DecodeError::TooShort(rest.len()));
        }
        let time_len = rest.len() - FILLER_LEN - 1;
        let head = &rest[..TIME_OFFSET];
        let time = &rest[TIME_OFFSET..TIME_OFFSET + time_len];
        let tail = &rest[TIME_OFFSET + time_len..rest.len() - 1];
        let mode_char = rest[rest.len() - 1..].chars().next().unwrap_or('?');

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(head) || !all_digits(tail) {
            return Err(DecodeError::BadFiller);
        }
        if !time.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return Err(DecodeError::InvalidTime(time.to_string()));
        }
        let elapsed_secs: f64 = time
            .parse()
            .map_err(|_| DecodeError::InvalidTime(time.to_string()))?;
        let mode = mode_char
            .to_digit(10)
            .and_then(|d| GameMode::from_digit(d as u8))
            .ok_or(DecodeError::InvalidMode(mode_char))?;

        Ok(Self {
            mode,
            name: name.to_string(),
            elapsed_secs,
        })
    }

    /// Compares a finishing time against this challenger at centisecond precision.
    pub fn race(&self, elapsed_secs: f64) -> Verdict {
        let mine = (elapsed_secs * 100.0).round() as i64;
        let theirs = self.elapsed_centis();
        let by = (mine - theirs).abs() as f64 / 100.0;
        match mine.cmp(&theirs) {
            std::cmp::Ordering::Less => Verdict::Beat { by },
            std::cmp::Ordering::Greater => Verdict::Lost { by },
            std::cmp::Ordering::Equal => Verdict::Tied,
        }
    }
}

/// Appends one code per line to the outbox file, creating its directory if needed.
pub fn deliver(outbox: &Path, token: &str) -> Result<(), DeliveryError> {
    let io_err = |source: std::io::Error| DeliveryError::Io {
        path: outbox.to_path_buf(),
        source,
    };
    if let Some(parent) = outbox.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(outbox)
        .map_err(io_err)?;
    writeln!(f, "{}", token).map_err(io_err)?;
    Ok(())
}
