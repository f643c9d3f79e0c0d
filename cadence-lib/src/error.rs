//! Error taxonomy shared by the catalog, engine, and playback layers.
//!
//! None of these are fatal. The session records the most recent one in its
//! status and keeps running; recovery is a human reselecting a track.

use std::fmt::{Display, Formatter};

use crate::catalog::TrackId;

#[derive(Debug)]
pub enum PlaybackError {
    /// The source key does not resolve to a playable resource.
    Resolution { source_key: String, reason: String },
    /// The resource exists but the engine could not decode it.
    Decode { source_key: String, reason: String },
    /// The engine failed while a handle was playing.
    Engine(String),
    /// No audio output device could be opened.
    OutputUnavailable(String),
    /// The catalog has no tracks.
    EmptyCatalog,
    /// The requested track id is not in the catalog.
    UnknownTrack(TrackId),
    /// The library directory could not be turned into a catalog.
    Library(String),
    Io(std::io::Error),
}

impl Display for PlaybackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolution { source_key, reason } => {
                write!(f, "cannot resolve {}: {}", source_key, reason)
            }
            Self::Decode { source_key, reason } => {
                write!(f, "cannot decode {}: {}", source_key, reason)
            }
            Self::Engine(reason) => write!(f, "engine error: {}", reason),
            Self::OutputUnavailable(reason) => write!(f, "audio output unavailable: {}", reason),
            Self::EmptyCatalog => write!(f, "the catalog is empty"),
            Self::UnknownTrack(id) => write!(f, "unknown track: {}", id),
            Self::Library(reason) => write!(f, "library error: {}", reason),
            Self::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for PlaybackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlaybackError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl PlaybackError {
    /// True for failures that happen before any handle is touched.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
