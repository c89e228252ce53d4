/// Why a track is playing
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason a track is playing
///
/// Only the continuation policy branches on this; device control never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackContext {
    /// Picked from a country's trending chart
    Trending,

    /// Part of a playlist the chat layer assembled
    Playlist,

    /// A single search result
    Search,
}

impl PlaybackContext {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackContext::Trending => "trending",
            PlaybackContext::Playlist => "playlist",
            PlaybackContext::Search => "search",
        }
    }
}

impl fmt::Display for PlaybackContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
