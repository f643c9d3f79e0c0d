//! Track descriptors.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Opaque, catalog-unique track identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TrackId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One playable entry of the catalog. Immutable once the catalog is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: TrackId,
    pub display_name: String,
    /// Key handed to the engine to resolve the playable resource.
    pub source_key: String,
    /// Playback rate multiplier, always positive.
    pub speed: f32,
    /// Ordering token parsed from the resource name, if any.
    pub token: Option<u32>,
}

impl TrackDescriptor {
    pub fn new(
        id: impl Into<TrackId>,
        display_name: impl Into<String>,
        source_key: impl Into<String>,
        speed: f32,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            source_key: source_key.into(),
            speed,
            token: None,
        }
    }

    pub fn with_token(mut self, token: u32) -> Self {
        self.token = Some(token);
        self
    }
}
