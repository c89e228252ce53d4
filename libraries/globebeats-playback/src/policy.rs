//! Session playback policy
//!
//! The one place the session's auto-play flag lives. The continuation layer reads it,
//! every play entry point writes it through [`PlaybackPolicy::note_request`], and
//! nothing mirrors it elsewhere.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Who asked for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// A user action (click, chat command)
    Manual,

    /// The continuation policy picking what plays next
    AutoPlay,
}

/// Session-level auto-play flag with a one-way manual latch
///
/// Any manual request clears auto-play for the rest of the session. Only
/// [`reset`](Self::reset), meaning a new session, turns it back on. Stopping playback
/// does not.
#[derive(Debug)]
pub struct PlaybackPolicy {
    auto_play: AtomicBool,
}

impl Default for PlaybackPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PlaybackPolicy {
    /// Create a policy with the given initial auto-play flag
    pub fn new(auto_play: bool) -> Self {
        Self {
            auto_play: AtomicBool::new(auto_play),
        }
    }

    /// Whether the random fallback may run
    pub fn auto_play_enabled(&self) -> bool {
        self.auto_play.load(Ordering::SeqCst)
    }

    /// Record a request before it is dispatched
    ///
    /// Must run before the controller sees the request, so an `ended` handled in
    /// between cannot observe auto-play still enabled.
    pub fn note_request(&self, origin: RequestOrigin) {
        if origin == RequestOrigin::Manual && self.auto_play.swap(false, Ordering::SeqCst) {
            info!("Manual play requested; auto-play disabled for this session");
        }
    }

    /// Start a new session
    pub fn reset(&self, auto_play: bool) {
        self.auto_play.store(auto_play, Ordering::SeqCst);
    }
}
