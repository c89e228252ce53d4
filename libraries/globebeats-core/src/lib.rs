//! GlobeBeats Core
//!
//! Platform-agnostic domain values used by the playback core and by the
//! collaborators that produce tracks and playlists (chat layer, chart fetchers).
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `Playlist`, `PlaylistRef`, `PlaybackContext`, `TrendingEntry`
//! - **Core Traits**: `TrendingSource`, read by the random-fallback branch of continuation
//! - **Catalog**: `TrendingCatalog`, an in-memory `TrendingSource` refreshed from outside
//!
//! # Example
//!
//! ```rust
//! use globebeats_core::{Playlist, PlaylistRef, Track};
//!
//! let playlist = Playlist::new(
//!     "pl-1",
//!     "Road trip",
//!     vec![
//!         Track::new("Song A", "Artist", Some("https://cdn.example/a.m4a")),
//!         Track::new("Song B", "Artist", None::<String>),
//!     ],
//! );
//!
//! let at_start = PlaylistRef::new(playlist, 0);
//! assert!(at_start.next_playable().is_none());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod traits;
pub mod types;

pub use catalog::TrendingCatalog;
pub use traits::TrendingSource;
pub use types::{ChartSource, PlaybackContext, Playlist, PlaylistRef, Track, TrendingEntry};
