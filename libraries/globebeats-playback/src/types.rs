//! Core types for playback orchestration

use crate::error::{PlaybackError, Result};
use globebeats_core::{PlaybackContext, PlaylistRef, Track};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Point-in-time copy of the controller's state
///
/// Returned by value from `get_state()`; mutating it has no effect on the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerState {
    /// The silent unlock cycle has succeeded this session
    pub is_unlocked: bool,

    /// A play request is in flight (the single-flight lock is held)
    pub is_loading: bool,

    /// A live device reports non-paused playback
    pub is_playing: bool,

    /// Track most recently requested (cleared by `stop()` and by failed plays)
    pub current_track: Option<Track>,

    /// Why `current_track` is playing
    pub context: Option<PlaybackContext>,

    /// Playlist position of `current_track`, if it came from a playlist
    pub playlist_ref: Option<PlaylistRef>,
}

impl ControllerState {
    /// Coarse phase, as drawn in the controller state machine
    pub fn phase(&self) -> PlaybackPhase {
        if self.is_loading {
            PlaybackPhase::Loading
        } else if self.is_playing {
            PlaybackPhase::Playing
        } else if self.current_track.is_some() {
            PlaybackPhase::Paused
        } else {
            PlaybackPhase::Idle
        }
    }
}

/// Controller phase
///
/// `Paused` also covers a track that ended naturally and is still displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackPhase {
    /// Nothing loaded
    Idle,

    /// Single-flight lock held
    Loading,

    /// Sounding
    Playing,

    /// Track loaded but silent
    Paused,
}

/// Options for a play request
#[derive(Debug, Clone, PartialEq)]
pub struct PlayOptions {
    /// Why the track is being played
    pub context: PlaybackContext,

    /// Playlist position, when playing from a playlist
    pub playlist_ref: Option<PlaylistRef>,
}

impl PlayOptions {
    /// Options with no playlist attached
    pub fn new(context: PlaybackContext) -> Self {
        Self {
            context,
            playlist_ref: None,
        }
    }

    /// Options for playing `playlist_ref` in the playlist context
    pub fn playlist(playlist_ref: PlaylistRef) -> Self {
        Self {
            context: PlaybackContext::Playlist,
            playlist_ref: Some(playlist_ref),
        }
    }
}

/// Result of a play request
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum PlayOutcome {
    /// A new device was attached and started
    Started,

    /// The same sound was already playing; nothing was touched
    AlreadyPlaying,

    /// Another request holds the single-flight lock
    Busy,

    /// Rejected or failed; the controller is idle with no current track
    Failed(PlaybackError),
}

impl PlayOutcome {
    /// The boolean a caller would show to the user: did we end up playing this sound
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Started | Self::AlreadyPlaying)
    }

    /// Error, if the request failed
    pub fn error(&self) -> Option<&PlaybackError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Configuration for the playback controller and continuation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Give up on a device start after this many milliseconds (default: 15000)
    ///
    /// `None` waits forever, leaving the controller in `Loading` if the device never
    /// resolves.
    pub start_timeout_ms: Option<u64>,

    /// Initial session auto-play flag (default: true)
    pub auto_play: bool,

    /// Candidates tried when an auto-advance fails (default: 3)
    pub max_advance_attempts: u32,

    /// Broadcast buffer for async event consumers (default: 64)
    pub event_capacity: usize,

    /// Step for skip-forward / skip-back actions, in seconds (default: 10)
    pub skip_seconds: f64,

    /// What a play request does when another one is still loading (default: reject)
    pub in_flight: InFlightPolicy,
}

/// Resolution of two overlapping play requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InFlightPolicy {
    /// The request that took the lock first wins; later ones get `Busy`
    #[default]
    RejectNew,

    /// The newest request wins; the loading one resolves `Failed(Cancelled)`
    Supersede,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            start_timeout_ms: Some(15_000),
            auto_play: true,
            max_advance_attempts: 3,
            event_capacity: 64,
            skip_seconds: 10.0,
            in_flight: InFlightPolicy::RejectNew,
        }
    }
}

impl PlayerConfig {
    /// Start timeout as a `Duration`
    pub fn start_timeout(&self) -> Option<Duration> {
        self.start_timeout_ms.map(Duration::from_millis)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.start_timeout_ms == Some(0) {
            return Err(PlaybackError::invalid_request(
                "start_timeout_ms must be positive (omit it to disable the timeout)",
            ));
        }
        if self.max_advance_attempts == 0 {
            return Err(PlaybackError::invalid_request(
                "max_advance_attempts must be at least 1",
            ));
        }
        if self.event_capacity == 0 {
            return Err(PlaybackError::invalid_request("event_capacity must be positive"));
        }
        if !self.skip_seconds.is_finite() || self.skip_seconds <= 0.0 {
            return Err(PlaybackError::invalid_request(
                "skip_seconds must be a positive number",
            ));
        }
        Ok(())
    }
}
