//! Error types for playback orchestration

use std::time::Duration;
use thiserror::Error;

/// Playback errors
///
/// Controller operations never surface these as `Err`; they come back inside
/// [`PlayOutcome::Failed`](crate::PlayOutcome::Failed) and as
/// [`PlayerEvent::Error`](crate::PlayerEvent::Error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    /// Autoplay/gesture policy prevented start
    #[error("Playback blocked until the user interacts with the page")]
    PolicyBlocked,

    /// The media resource failed to load or decode
    #[error("Resource error: {0}")]
    Resource(String),

    /// Missing or empty playable URI, or a playlist position out of range
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The device neither started nor failed in time
    #[error("Start did not resolve within {0:?}")]
    StartTimeout(Duration),

    /// The load was cancelled by `stop()` or a superseding request before it resolved
    #[error("Load cancelled")]
    Cancelled,
}

impl PlaybackError {
    /// Create a resource error
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Expected outcomes that are not logged as failures
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::PolicyBlocked | Self::Cancelled)
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
