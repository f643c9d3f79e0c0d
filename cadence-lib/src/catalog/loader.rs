//! Builds a [`Catalog`] from a directory of audio files.
//!
//! Each file name carries a numeric token (`Session 030.mp3` -> 30). Tokens
//! decide the playback order and the playback speed: tokens 30 and 59 play at
//! 1.5x, everything else at 2.0x. A `speeds.json` file in the directory can
//! replace those rules.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;

use super::{Catalog, TrackDescriptor};
use crate::error::{PlaybackError, Result};
use crate::probe;

pub const DEFAULT_SPEED: f32 = 2.0;
const SLOW_SPEED: f32 = 1.5;
const SLOW_TOKENS: [u32; 2] = [30, 59];
const SPEEDS_FILE: &str = "speeds.json";
const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "m4a", "aac", "flac", "wav", "ogg", "opus"];

/// Token-to-speed mapping applied while loading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeedRules {
    #[serde(default = "default_speed")]
    pub default: f32,
    #[serde(default)]
    pub overrides: BTreeMap<u32, f32>,
}

fn default_speed() -> f32 {
    DEFAULT_SPEED
}

impl Default for SpeedRules {
    fn default() -> Self {
        Self {
            default: DEFAULT_SPEED,
            overrides: SLOW_TOKENS
                .iter()
                .map(|token| (*token, SLOW_SPEED))
                .collect(),
        }
    }
}

impl SpeedRules {
    pub fn speed_for(&self, token: Option<u32>) -> f32 {
        token
            .and_then(|token| self.overrides.get(&token).copied())
            .unwrap_or(self.default)
    }

    /// Read `speeds.json` from `dir`, falling back to the built-in rules.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(SPEEDS_FILE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        let rules: Self = serde_json::from_str(&raw).map_err(|err| {
            PlaybackError::Library(format!("invalid {}: {}", path.display(), err))
        })?;
        if rules.default <= 0.0 || rules.overrides.values().any(|speed| *speed <= 0.0) {
            return Err(PlaybackError::Library(format!(
                "{} contains a non-positive speed",
                path.display()
            )));
        }
        info!("using speed rules from {}", path.display());
        Ok(rules)
    }
}

/// Built-in speed for a token.
pub fn speed_for_token(token: u32) -> f32 {
    SpeedRules::default().speed_for(Some(token))
}

/// First run of ASCII digits in `name`, e.g. `"Part 059 - end"` -> `59`.
///
/// A run too large for `u32` saturates, so the file still sorts after every
/// smaller token.
pub fn parse_token(name: &str) -> Option<u32> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    match digits.parse() {
        Ok(token) => Some(token),
        Err(_) => {
            warn!("token {} in {:?} is out of range; using {}", digits, name, u32::MAX);
            Some(u32::MAX)
        }
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            AUDIO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

struct Discovered {
    path: PathBuf,
    file_name: String,
    stem: String,
    token: Option<u32>,
}

fn discover(dir: &Path) -> Result<Vec<Discovered>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() || !is_audio_file(&path) {
            continue;
        }
        let (Some(file_name), Some(stem)) = (
            path.file_name().and_then(|name| name.to_str()),
            path.file_stem().and_then(|stem| stem.to_str()),
        ) else {
            warn!("skipping non-utf8 file name {}", path.display());
            continue;
        };
        found.push(Discovered {
            file_name: file_name.to_string(),
            stem: stem.to_string(),
            token: parse_token(stem),
            path,
        });
    }

    // Tokenized files first by token, then the rest; ties by name.
    found.sort_by(|a, b| {
        let key = |d: &Discovered| (d.token.is_none(), d.token.unwrap_or(0));
        key(a).cmp(&key(b)).then_with(|| a.file_name.cmp(&b.file_name))
    });

    Ok(found)
}

/// Build the catalog for `dir`.
pub fn load_catalog(dir: &Path) -> Result<Catalog> {
    if !dir.is_dir() {
        return Err(PlaybackError::Library(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let rules = SpeedRules::from_dir(dir)?;
    let tracks: Vec<TrackDescriptor> = discover(dir)?
        .into_iter()
        .map(|found| {
            let display_name = probe::read_title(&found.path).unwrap_or(found.stem);
            let speed = rules.speed_for(found.token);
            debug!(
                "track {} token={:?} speed={} title={}",
                found.file_name, found.token, speed, display_name
            );
            let mut track = TrackDescriptor::new(
                found.file_name,
                display_name,
                found.path.to_string_lossy().into_owned(),
                speed,
            );
            track.token = found.token;
            track
        })
        .collect();

    info!("loaded {} track(s) from {}", tracks.len(), dir.display());
    Catalog::new(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TrackId;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"not really audio").expect("write");
    }

    #[test]
    fn slow_tokens_play_at_one_and_a_half() {
        for token in 0..=120 {
            let expected = if token == 30 || token == 59 { 1.5 } else { 2.0 };
            assert_eq!(speed_for_token(token), expected, "token {}", token);
        }
    }

    #[test]
    fn untokenized_tracks_use_default_speed() {
        assert_eq!(SpeedRules::default().speed_for(None), DEFAULT_SPEED);
    }

    #[test]
    fn parses_first_digit_run() {
        assert_eq!(parse_token("Recitation 030"), Some(30));
        assert_eq!(parse_token("59-final-12"), Some(59));
        assert_eq!(parse_token("intro"), None);
    }

    #[test]
    fn oversized_token_saturates() {
        assert_eq!(parse_token("Part 99999999999"), Some(u32::MAX));
        assert_eq!(parse_token("Part 0004294967295"), Some(u32::MAX));
    }

    #[test]
    fn orders_by_token_then_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "part 59.mp3");
        touch(dir.path(), "part 1.mp3");
        touch(dir.path(), "bonus.mp3");
        touch(dir.path(), "part 030.flac");
        touch(dir.path(), "cover.jpg");

        let catalog = load_catalog(dir.path()).expect("catalog");
        let ids: Vec<&str> = catalog.tracks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["part 1.mp3", "part 030.flac", "part 59.mp3", "bonus.mp3"]
        );

        let speeds: Vec<f32> = catalog.tracks().iter().map(|t| t.speed).collect();
        assert_eq!(speeds, vec![2.0, 1.5, 1.5, 2.0]);
    }

    #[test]
    fn falls_back_to_stem_for_title() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "07 Evening.mp3");
        let catalog = load_catalog(dir.path()).expect("catalog");
        let track = catalog.get(&TrackId::from("07 Evening.mp3")).unwrap();
        assert_eq!(track.display_name, "07 Evening");
        assert_eq!(track.token, Some(7));
    }

    #[test]
    fn speeds_file_replaces_rules() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "1.mp3");
        touch(dir.path(), "30.mp3");
        fs::write(
            dir.path().join(SPEEDS_FILE),
            r#"{ "default": 1.0, "overrides": { "1": 1.25 } }"#,
        )
        .expect("write");

        let catalog = load_catalog(dir.path()).expect("catalog");
        let speeds: Vec<f32> = catalog.tracks().iter().map(|t| t.speed).collect();
        assert_eq!(speeds, vec![1.25, 1.0]);
    }

    #[test]
    fn missing_directory_is_a_library_error() {
        let result = load_catalog(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(PlaybackError::Library(_))));
    }
}
