/// Core traits for GlobeBeats
use crate::types::TrendingEntry;

/// Read side of the trending-chart data the fetchers keep refreshed
///
/// The playback core only reads this when it needs a random fallback track, so
/// implementations return a snapshot and are free to refresh on their own cadence.
pub trait TrendingSource: Send + Sync {
    /// Current charts, one entry per country
    fn entries(&self) -> Vec<TrendingEntry>;
}
