/// Per-country trending charts
use crate::types::Track;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upstream service a chart was fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartSource {
    /// Spotify featured playlists
    Spotify,
    /// Last.fm geo charts
    Lastfm,
    /// iTunes RSS top songs
    Itunes,
}

/// Trending chart for one country
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingEntry {
    /// ISO 3166-1 alpha-2 code
    pub country_code: String,

    /// Display name
    pub country_name: String,

    /// Flag emoji
    pub flag: Option<String>,

    /// Chart tracks in rank order
    pub tracks: Vec<Track>,

    /// Where the chart came from
    pub source: ChartSource,

    /// When the chart was last refreshed
    pub updated_at: DateTime<Utc>,
}

impl TrendingEntry {
    /// Create an entry stamped with the current time
    pub fn new(
        country_code: impl Into<String>,
        country_name: impl Into<String>,
        source: ChartSource,
        tracks: Vec<Track>,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            country_name: country_name.into(),
            flag: None,
            tracks,
            source,
            updated_at: Utc::now(),
        }
    }

    /// Tracks the player can actually sound
    pub fn playable_tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter(|track| track.is_playable())
    }

    /// Whether at least one track has a preview
    pub fn has_playable(&self) -> bool {
        self.tracks.iter().any(Track::is_playable)
    }
}
