/// Track domain type
use serde::{Deserialize, Serialize};

/// A playable (or not) track as produced by the chart fetchers and the chat layer
///
/// Tracks are immutable values. Two tracks with the same playable preview URI are
/// treated as the same sound for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Short audio preview (the only thing the player can sound)
    pub preview_uri: Option<String>,

    /// Cover artwork
    pub artwork_uri: Option<String>,

    /// Link to the full track on the upstream service
    pub external_uri: Option<String>,
}

impl Track {
    /// Create a new track without artwork or external link
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        preview_uri: Option<impl Into<String>>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            preview_uri: preview_uri.map(Into::into),
            artwork_uri: None,
            external_uri: None,
        }
    }

    /// Attach artwork
    #[must_use]
    pub fn with_artwork(mut self, uri: impl Into<String>) -> Self {
        self.artwork_uri = Some(uri.into());
        self
    }

    /// Preview URI, if present and non-blank
    pub fn playable_uri(&self) -> Option<&str> {
        self.preview_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
    }

    /// Whether the player can sound this track at all
    pub fn is_playable(&self) -> bool {
        self.playable_uri().is_some()
    }

    /// Same-sound identity (preview URI equality)
    ///
    /// Unplayable tracks never match anything, including each other.
    pub fn same_sound(&self, other: &Track) -> bool {
        match (self.playable_uri(), other.playable_uri()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}
