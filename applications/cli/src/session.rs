//! Scripted listening session over the simulated backend
//!
//! Wires the full playback stack the way a UI host would: one controller, one session
//! policy, the continuation driver on its own task, and a mounted binding. Then it
//! plays until continuation runs out or the track limit is reached.

use crate::config::CliConfig;
use crate::error::{CliError, Result};
use crate::sim::SimulatedBackend;
use globebeats_core::{
    PlaybackContext, Playlist, PlaylistRef, Track, TrendingCatalog, TrendingSource,
};
use globebeats_playback::{
    BindingSnapshot, ContinuationPolicy, ControllerState, EndedHandler, EndedInfo,
    PlayOptions, PlaybackController, PlaybackError, PlaybackPolicy, PlayerBinding,
    PlayerEvent, RequestOrigin,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How the session begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStart {
    /// The user clicks the first playable track of the playlist
    Playlist,

    /// The app auto-starts the top of the charts; random picks continue from there
    Charts,

    /// The user clicks the top track of one country's chart
    Country(String),
}

#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub start: SessionStart,

    /// Stop after this many tracks have finished
    pub max_tracks: usize,
}

/// What happened during a session
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Tracks that became audible, in order
    pub played: Vec<Track>,

    /// Tracks that ran to their end
    pub finished: usize,

    pub errors: Vec<PlaybackError>,
    pub final_state: ControllerState,
    pub final_snapshot: BindingSnapshot,

    /// Session auto-play flag at the end (false once a manual request was made)
    pub auto_play_enabled: bool,
    pub timed_out: bool,
}

/// Run one session to completion
pub async fn run(
    config: &CliConfig,
    catalog: Arc<TrendingCatalog>,
    playlist: Arc<Playlist>,
    plan: SessionPlan,
) -> Result<SessionReport> {
    let (track, options, origin) = first_request(&plan.start, &catalog, &playlist)?;

    let backend = Arc::new(SimulatedBackend::new(config.simulation.clone()));
    let controller = PlaybackController::new(backend, config.player.clone());
    let policy = Arc::new(PlaybackPolicy::new(config.player.auto_play));
    let continuation = Arc::new(ContinuationPolicy::new(
        Arc::clone(&controller),
        Arc::clone(&policy),
        catalog,
    ));

    let mut events = controller.subscribe();
    let driver = Arc::clone(&continuation).spawn();

    let binding = PlayerBinding::mount(&controller, Arc::clone(&policy));
    let on_ended: EndedHandler = Arc::new(|ended: &EndedInfo| {
        debug!(title = %ended.track.title, "Binding saw track end");
    });
    binding.render(Some(on_ended));

    let mut played = Vec::new();
    let mut finished = 0;
    let mut errors = Vec::new();
    let mut timed_out = false;

    info!(title = %track.title, context = %options.context, ?origin, "Starting session");
    let outcome = continuation.request_play(track, options, origin).await;

    if outcome.is_success() {
        let deadline = Instant::now() + session_budget(config, plan.max_tracks);
        loop {
            let event = match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Ok(event)) => event,
                Ok(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "Session lagged behind the event stream");
                    continue;
                }
                Ok(Err(RecvError::Closed)) => break,
                Err(_) => {
                    warn!("Session exceeded its time budget; stopping");
                    timed_out = true;
                    driver.abort();
                    controller.stop();
                    break;
                }
            };

            match event {
                PlayerEvent::Play { track } => {
                    info!(title = %track.title, artist = %track.artist, "Now playing");
                    played.push(track);
                }
                PlayerEvent::Ended(ended) => {
                    finished += 1;
                    if finished >= plan.max_tracks {
                        info!(finished, "Track limit reached");
                        driver.abort();
                        controller.stop();
                        break;
                    }
                    debug!(title = %ended.track.title, "Continuing");
                }
                PlayerEvent::Error { error } => {
                    warn!(%error, "Playback error");
                    errors.push(error);
                }
                PlayerEvent::Stop => break,
                _ => {}
            }
        }
    } else {
        // The rejection was published before `play()` returned
        loop {
            match events.try_recv() {
                Ok(PlayerEvent::Error { error }) => errors.push(error),
                Ok(_) | Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        warn!(?outcome, "Session could not start");
    }

    driver.abort();
    let final_state = controller.get_state();
    info!(phase = ?final_state.phase(), finished, "Session over");
    let report = SessionReport {
        played,
        finished,
        errors,
        final_state,
        final_snapshot: binding.snapshot(),
        auto_play_enabled: policy.auto_play_enabled(),
        timed_out,
    };
    binding.unmount();
    Ok(report)
}

/// Upper bound on wall time for `max_tracks` previews plus buffering and retries
fn session_budget(config: &CliConfig, max_tracks: usize) -> Duration {
    let sim = &config.simulation;
    let per_track = sim.track_seconds / sim.speed + (sim.start_delay_ms as f64 / 1000.0);
    let attempts = f64::from(config.player.max_advance_attempts.max(1));
    let tracks = max_tracks.max(1) as f64 + 1.0;
    Duration::from_secs_f64(per_track * tracks * attempts + 5.0)
}

fn first_request(
    start: &SessionStart,
    catalog: &TrendingCatalog,
    playlist: &Arc<Playlist>,
) -> Result<(Track, PlayOptions, RequestOrigin)> {
    match start {
        SessionStart::Playlist => {
            let index = playlist.first_playable_from(0).ok_or_else(|| {
                CliError::Catalog(format!("playlist '{}' has no playable tracks", playlist.name))
            })?;
            let playlist_ref = PlaylistRef::new(Arc::clone(playlist), index);
            let track = playlist.tracks[index].clone();
            Ok((track, PlayOptions::playlist(playlist_ref), RequestOrigin::Manual))
        }
        SessionStart::Charts => {
            let track = catalog
                .entries()
                .iter()
                .find_map(|entry| entry.playable_tracks().next().cloned())
                .ok_or_else(|| CliError::Catalog("no chart has a playable track".to_string()))?;
            Ok((
                track,
                PlayOptions::new(PlaybackContext::Trending),
                RequestOrigin::AutoPlay,
            ))
        }
        SessionStart::Country(code) => {
            let entries = catalog.entries();
            let entry = entries
                .iter()
                .find(|entry| entry.country_code.eq_ignore_ascii_case(code))
                .ok_or_else(|| CliError::UnknownCountry(code.clone()))?;
            let track = entry.playable_tracks().next().cloned().ok_or_else(|| {
                CliError::Catalog(format!("{} has no playable tracks", entry.country_name))
            })?;
            Ok((
                track,
                PlayOptions::new(PlaybackContext::Trending),
                RequestOrigin::Manual,
            ))
        }
    }
}
