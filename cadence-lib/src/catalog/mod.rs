//! Ordered, immutable track catalog and the loader that builds it.

mod loader;
mod track;

use std::collections::HashSet;

pub use loader::{load_catalog, parse_token, speed_for_token, SpeedRules, DEFAULT_SPEED};
pub use track::{TrackDescriptor, TrackId};

use crate::error::{PlaybackError, Result};

/// Playback order is insertion order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<TrackDescriptor>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids and non-positive speeds.
    pub fn new(tracks: Vec<TrackDescriptor>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(tracks.len());
        for track in &tracks {
            if !seen.insert(track.id.clone()) {
                return Err(PlaybackError::Library(format!(
                    "duplicate track id {}",
                    track.id
                )));
            }
            if !(track.speed > 0.0 && track.speed.is_finite()) {
                return Err(PlaybackError::Library(format!(
                    "track {} has invalid speed {}",
                    track.id, track.speed
                )));
            }
        }
        Ok(Self { tracks })
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn first(&self) -> Option<&TrackDescriptor> {
        self.tracks.first()
    }

    pub fn at(&self, index: usize) -> Option<&TrackDescriptor> {
        self.tracks.get(index)
    }

    pub fn index_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|track| &track.id == id)
    }

    pub fn get(&self, id: &TrackId) -> Option<&TrackDescriptor> {
        self.index_of(id).map(|index| &self.tracks[index])
    }

    /// The track after `id`, wrapping from the last track to the first.
    ///
    /// A single-track catalog returns the same track.
    pub fn next_after(&self, id: &TrackId) -> Option<&TrackDescriptor> {
        let index = self.index_of(id)?;
        self.at((index + 1) % self.len())
    }

    /// The track before `id`, wrapping from the first track to the last.
    pub fn previous_before(&self, id: &TrackId) -> Option<&TrackDescriptor> {
        let index = self.index_of(id)?;
        self.at((index + self.len() - 1) % self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(ids: &[&str]) -> Catalog {
        Catalog::new(
            ids.iter()
                .map(|id| TrackDescriptor::new(*id, *id, format!("{}.mp3", id), 2.0))
                .collect(),
        )
        .expect("catalog")
    }

    #[test]
    fn next_after_wraps_to_first() {
        let catalog = catalog(&["a", "b", "c"]);
        let next = |id: &str| catalog.next_after(&TrackId::from(id)).unwrap().id.clone();
        assert_eq!(next("a"), TrackId::from("b"));
        assert_eq!(next("b"), TrackId::from("c"));
        assert_eq!(next("c"), TrackId::from("a"));
    }

    #[test]
    fn previous_before_wraps_to_last() {
        let catalog = catalog(&["a", "b", "c"]);
        let previous = catalog.previous_before(&TrackId::from("a")).unwrap();
        assert_eq!(previous.id, TrackId::from("c"));
    }

    #[test]
    fn single_track_is_its_own_neighbour() {
        let catalog = catalog(&["only"]);
        let id = TrackId::from("only");
        assert_eq!(catalog.next_after(&id).unwrap().id, id);
        assert_eq!(catalog.previous_before(&id).unwrap().id, id);
    }

    #[test]
    fn unknown_id_has_no_neighbour() {
        let catalog = catalog(&["a"]);
        assert!(catalog.next_after(&TrackId::from("zzz")).is_none());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let tracks = vec![
            TrackDescriptor::new("a", "A", "a.mp3", 2.0),
            TrackDescriptor::new("a", "A again", "a2.mp3", 2.0),
        ];
        assert!(matches!(
            Catalog::new(tracks),
            Err(PlaybackError::Library(_))
        ));
    }

    #[test]
    fn rejects_non_positive_speed() {
        let tracks = vec![TrackDescriptor::new("a", "A", "a.mp3", 0.0)];
        assert!(Catalog::new(tracks).is_err());
    }
}
