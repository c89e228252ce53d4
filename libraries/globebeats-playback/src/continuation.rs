//! Continuation policy
//!
//! Decides what plays after a track ends: the next playable track of its playlist,
//! a random trending track while the session still allows auto-play, or nothing.
//! Runs entirely through the controller's public API.

use crate::{
    controller::PlaybackController,
    error::PlaybackError,
    events::{EndedInfo, PlayerEvent},
    policy::{PlaybackPolicy, RequestOrigin},
    types::{PlayOptions, PlayOutcome},
};
use globebeats_core::{PlaybackContext, PlaylistRef, Track, TrendingSource};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What to do after a track ended
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Continue the playlist at `playlist.index`
    Advance { track: Track, playlist: PlaylistRef },

    /// Auto-play a random trending track
    Random { track: Track },

    /// Go idle
    Stop,
}

/// Result of handling one `ended` event
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// The event no longer describes what the controller is showing
    Ignored,

    /// A follow-up track is playing
    Playing {
        track: Track,
        context: PlaybackContext,
    },

    /// Another request won the single-flight lock; nothing more to do
    Yielded,

    /// Nothing to continue with; the controller was stopped
    Stopped,
}

/// Application-level driver of "what plays next"
pub struct ContinuationPolicy {
    controller: Arc<PlaybackController>,
    policy: Arc<PlaybackPolicy>,
    trending: Arc<dyn TrendingSource>,
    rng: Mutex<StdRng>,
    max_attempts: u32,
}

impl ContinuationPolicy {
    /// Create a policy over `controller`, reading fallback tracks from `trending`
    pub fn new(
        controller: Arc<PlaybackController>,
        policy: Arc<PlaybackPolicy>,
        trending: Arc<dyn TrendingSource>,
    ) -> Self {
        let max_attempts = controller.config().max_advance_attempts.max(1);
        Self {
            controller,
            policy,
            trending,
            rng: Mutex::new(StdRng::from_entropy()),
            max_attempts,
        }
    }

    /// Use a fixed seed for random picks
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// The session policy this driver reads
    pub fn policy(&self) -> &Arc<PlaybackPolicy> {
        &self.policy
    }

    /// Dispatch a play request, applying the manual latch first
    pub async fn request_play(
        &self,
        track: Track,
        options: PlayOptions,
        origin: RequestOrigin,
    ) -> PlayOutcome {
        self.policy.note_request(origin);
        self.controller.play(track, options).await
    }

    /// Pure decision step for `ended`
    pub fn decide(&self, ended: &EndedInfo) -> Decision {
        if let Some(next) = ended
            .playlist
            .as_ref()
            .filter(|playlist| playlist.has_next())
            .and_then(PlaylistRef::next_playable)
        {
            if let Some(track) = next.track().cloned() {
                return Decision::Advance {
                    track,
                    playlist: next,
                };
            }
        }

        if self.policy.auto_play_enabled() && ended.context != Some(PlaybackContext::Playlist) {
            if let Some(track) = self.pick_random() {
                return Decision::Random { track };
            }
        }

        Decision::Stop
    }

    /// Uniform country (among those with a playable track), then uniform playable track
    fn pick_random(&self) -> Option<Track> {
        let entries = self.trending.entries();
        let candidates: Vec<_> = entries.iter().filter(|e| e.has_playable()).collect();

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = candidates.choose(&mut *rng)?;
        let tracks: Vec<&Track> = entry.playable_tracks().collect();
        let track = tracks.choose(&mut *rng).map(|t| (*t).clone());

        if let Some(track) = &track {
            debug!(country = %entry.country_code, title = %track.title, "Random pick");
        }
        track
    }

    /// Act on a natural `ended`
    ///
    /// Ignored when the controller has moved on (loading, playing, or showing another
    /// track). Failed auto-advances move to the next candidate, up to
    /// `max_advance_attempts`; `Busy`/`Cancelled` mean someone else took over.
    pub async fn handle_ended(&self, ended: &EndedInfo) -> Continuation {
        let state = self.controller.get_state();
        let still_current = state.current_track.as_ref() == Some(&ended.track);
        if state.is_loading || state.is_playing || !still_current {
            debug!(title = %ended.track.title, "Ignoring stale ended event");
            return Continuation::Ignored;
        }

        let mut decision = self.decide(ended);
        let mut failures = 0;

        loop {
            let (track, options, retry) = match decision {
                Decision::Stop => {
                    info!("Nothing to continue with; stopping");
                    self.controller.stop();
                    return Continuation::Stopped;
                }
                Decision::Advance { track, playlist } => {
                    let retry = playlist.next_playable();
                    (track, PlayOptions::playlist(playlist), Retry::Playlist(retry))
                }
                Decision::Random { track } => {
                    (track, PlayOptions::new(PlaybackContext::Trending), Retry::Random)
                }
            };
            let context = options.context;

            let outcome = self
                .request_play(track.clone(), options, RequestOrigin::AutoPlay)
                .await;

            match outcome {
                PlayOutcome::Started | PlayOutcome::AlreadyPlaying => {
                    info!(title = %track.title, %context, "Continuing");
                    return Continuation::Playing { track, context };
                }
                PlayOutcome::Busy | PlayOutcome::Failed(PlaybackError::Cancelled) => {
                    return Continuation::Yielded;
                }
                PlayOutcome::Failed(error) => {
                    failures += 1;
                    warn!(%error, title = %track.title, failures, "Auto-advance failed");

                    decision = if failures >= self.max_attempts {
                        Decision::Stop
                    } else {
                        match retry {
                            Retry::Playlist(Some(next)) => match next.track().cloned() {
                                Some(track) => Decision::Advance {
                                    track,
                                    playlist: next,
                                },
                                None => Decision::Stop,
                            },
                            Retry::Playlist(None) => Decision::Stop,
                            Retry::Random => self
                                .pick_random()
                                .map_or(Decision::Stop, |track| Decision::Random { track }),
                        }
                    };
                }
            }
        }
    }

    /// Drive continuation from the controller's event stream on a tokio task
    ///
    /// The returned handle should be aborted when the session ends.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut events = self.controller.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(PlayerEvent::Ended(info)) => {
                        self.handle_ended(&info).await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Continuation driver lagged behind the event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

enum Retry {
    Playlist(Option<PlaylistRef>),
    Random,
}
