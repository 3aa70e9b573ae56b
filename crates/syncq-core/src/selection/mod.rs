//! Quality-based choice among remote search candidates.
//!
//! `best` and `good` pick the highest score `(format_bonus, bitrate, size)`,
//! first candidate winning ties. `any` takes the first audio file in input
//! order without comparing scores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::job::UnknownVariant;

/// Lossy audio extensions accepted for selection.
pub const LOSSY_EXTENSIONS: &[&str] = &["mp3", "ogg", "opus", "m4a", "aac", "wma"];

/// Lossless audio extensions; these earn the format bonus.
pub const LOSSLESS_EXTENSIONS: &[&str] = &["flac", "wav", "alac", "ape", "aiff", "aif", "wv"];

const LOSSLESS_BONUS: u32 = 1000;

/// Minimum bitrate (kbps) a lossy file needs to count as `good`.
const GOOD_MIN_BITRATE: u32 = 256;

/// One file offered by a remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Peer that shares the file.
    #[serde(default)]
    pub username: String,
    #[serde(alias = "name")]
    pub filename: String,
    /// Bytes.
    #[serde(default)]
    pub size: u64,
    /// kbps; 0 when unknown.
    #[serde(default)]
    pub bitrate: u32,
}

impl Candidate {
    pub fn new(filename: impl Into<String>, bitrate: u32, size: u64) -> Self {
        Self {
            username: String::new(),
            filename: filename.into(),
            size,
            bitrate,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    fn is_lossless(&self) -> bool {
        matches!(extension(&self.filename), Some(ext) if LOSSLESS_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Lexicographic quality score.
    pub fn score(&self) -> (u32, u32, u64) {
        let bonus = if self.is_lossless() { LOSSLESS_BONUS } else { 0 };
        (bonus, self.bitrate, self.size)
    }
}

/// How picky the download handler is about quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreference {
    #[default]
    Best,
    Good,
    Any,
}

impl QualityPreference {
    pub fn as_str(self) -> &'static str {
        match self {
            QualityPreference::Best => "best",
            QualityPreference::Good => "good",
            QualityPreference::Any => "any",
        }
    }
}

impl fmt::Display for QualityPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for QualityPreference {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(QualityPreference::Best),
            "good" => Ok(QualityPreference::Good),
            "any" => Ok(QualityPreference::Any),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Lowercased extension of a remote filename. Handles both `/` and `\`
/// separators since peers report Windows paths.
fn extension(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the filename has a recognised audio extension.
pub fn is_audio_filename(filename: &str) -> bool {
    match extension(filename) {
        Some(ext) => {
            LOSSY_EXTENSIONS.contains(&ext.as_str()) || LOSSLESS_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Highest score; the earliest candidate wins ties.
fn max_by_score<'a>(candidates: impl IntoIterator<Item = &'a Candidate>) -> Option<&'a Candidate> {
    let mut best: Option<&Candidate> = None;
    for c in candidates {
        match best {
            Some(b) if c.score() <= b.score() => {}
            _ => best = Some(c),
        }
    }
    best
}

/// Pick a candidate for the given preference, or `None` when nothing fits.
pub fn select_candidate(
    candidates: &[Candidate],
    preference: QualityPreference,
) -> Option<&Candidate> {
    let mut audio = candidates
        .iter()
        .filter(|c| is_audio_filename(&c.filename))
        .peekable();
    audio.peek()?;

    match preference {
        QualityPreference::Best => max_by_score(audio),
        QualityPreference::Good => {
            max_by_score(audio.filter(|c| c.bitrate >= GOOD_MIN_BITRATE || c.is_lossless()))
        }
        QualityPreference::Any => audio.next(),
    }
}
