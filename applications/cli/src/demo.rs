//! Built-in charts and playlist for offline sessions
//!
//! Preview URIs use the `sim://` scheme understood by the simulated backend. A real
//! chart snapshot can be loaded from JSON instead with [`load_catalog`].

use crate::error::{CliError, Result};
use globebeats_core::{ChartSource, Playlist, Track, TrendingCatalog, TrendingEntry};
use std::path::Path;

const COUNTRIES: &[(&str, &str, &str)] = &[
    ("US", "United States", "🇺🇸"),
    ("GB", "United Kingdom", "🇬🇧"),
    ("FR", "France", "🇫🇷"),
    ("BR", "Brazil", "🇧🇷"),
    ("JP", "Japan", "🇯🇵"),
    ("ZA", "South Africa", "🇿🇦"),
];

const CHART_LENGTH: usize = 5;

fn chart_track(code: &str, rank: usize) -> Track {
    let lower = code.to_lowercase();
    let track = Track::new(
        format!("{code} Chart #{rank}"),
        format!("{code} Artist {rank}"),
        Some(format!("sim://charts/{lower}/{rank}")),
    )
    .with_artwork(format!("sim://art/{lower}/{rank}.jpg"));

    // Every chart carries one track without a preview, as real feeds do
    if rank == CHART_LENGTH {
        Track {
            preview_uri: None,
            ..track
        }
    } else {
        track
    }
}

/// Trending charts for a handful of countries
pub fn catalog() -> TrendingCatalog {
    let entries = COUNTRIES
        .iter()
        .map(|(code, name, flag)| {
            let tracks = (1..=CHART_LENGTH).map(|rank| chart_track(code, rank)).collect();
            TrendingEntry {
                flag: Some((*flag).to_string()),
                ..TrendingEntry::new(*code, *name, ChartSource::Itunes, tracks)
            }
        })
        .collect();
    TrendingCatalog::new(entries)
}

/// A small mixed playlist, as the chat layer would produce
pub fn playlist() -> Playlist {
    Playlist::new(
        "demo-around-the-world",
        "Around the World",
        vec![
            chart_track("BR", 1),
            chart_track("JP", 2),
            Track::new("Unreleased Demo", "Unknown", None::<String>),
            chart_track("FR", 1),
            chart_track("ZA", 3),
        ],
    )
}

/// Load a chart snapshot (a JSON array of trending entries)
pub fn load_catalog(path: &Path) -> Result<TrendingCatalog> {
    let contents = std::fs::read_to_string(path)?;
    let entries: Vec<TrendingEntry> = serde_json::from_str(&contents)?;
    if entries.is_empty() {
        return Err(CliError::Catalog(format!(
            "{} contains no trending entries",
            path.display()
        )));
    }
    Ok(TrendingCatalog::new(entries))
}
