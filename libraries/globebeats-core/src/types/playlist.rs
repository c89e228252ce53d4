/// Playlist domain types
use crate::types::Track;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ordered list of tracks assembled by the application layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    /// Unique playlist identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Tracks in play order
    pub tracks: Vec<Track>,
}

impl Playlist {
    /// Create a new playlist
    pub fn new(id: impl Into<String>, name: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tracks,
        }
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the playlist has no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// First index strictly after `index` whose track has a playable preview
    pub fn next_playable_after(&self, index: usize) -> Option<usize> {
        self.tracks
            .iter()
            .enumerate()
            .skip(index + 1)
            .find(|(_, track)| track.is_playable())
            .map(|(i, _)| i)
    }

    /// First playable index at or after `index`
    pub fn first_playable_from(&self, index: usize) -> Option<usize> {
        self.tracks
            .iter()
            .enumerate()
            .skip(index)
            .find(|(_, track)| track.is_playable())
            .map(|(i, _)| i)
    }
}

/// Position inside a playlist snapshot
///
/// The playlist is held behind an `Arc`: the controller keeps a read-only snapshot and
/// never mutates it, and a playlist deleted upstream stays readable for as long as a
/// reference to it is alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRef {
    /// Snapshot of the playlist at request time
    pub playlist: Arc<Playlist>,

    /// Index of the referenced track
    pub index: usize,
}

impl PlaylistRef {
    /// Reference `index` inside `playlist`
    pub fn new(playlist: impl Into<Arc<Playlist>>, index: usize) -> Self {
        Self {
            playlist: playlist.into(),
            index,
        }
    }

    /// The referenced track, `None` if the index is out of range
    pub fn track(&self) -> Option<&Track> {
        self.playlist.tracks.get(self.index)
    }

    /// Whether `index` points inside the playlist
    pub fn is_in_bounds(&self) -> bool {
        self.index < self.playlist.len()
    }

    /// Whether a further track exists after this one (playable or not)
    pub fn has_next(&self) -> bool {
        self.index + 1 < self.playlist.len()
    }

    /// Reference to the next track with a playable preview, skipping unplayable ones
    pub fn next_playable(&self) -> Option<PlaylistRef> {
        self.playlist
            .next_playable_after(self.index)
            .map(|index| PlaylistRef {
                playlist: Arc::clone(&self.playlist),
                index,
            })
    }
}
