mod context;
mod playlist;
mod track;
mod trending;

pub use context::PlaybackContext;
pub use playlist::{Playlist, PlaylistRef};
pub use track::Track;
pub use trending::{ChartSource, TrendingEntry};
