//! Integration tests for the continuation policy
//!
//! Covers what plays after a natural end: playlist advance, random trending
//! fallback, the manual latch, and the boundary back to idle.

mod common;

use common::*;
use globebeats_core::{PlaybackContext, Track, TrendingEntry};
use globebeats_playback::{
    Continuation, ContinuationPolicy, Decision, EndedInfo, EventKind, PlayOptions, PlayOutcome,
    PlaybackController, PlaybackError, PlaybackPhase, PlaybackPolicy, PlayerConfig,
    RequestOrigin,
};
use std::sync::Arc;

struct Session {
    backend: Arc<MockBackend>,
    controller: Arc<PlaybackController>,
    continuation: Arc<ContinuationPolicy>,
    log: EventLog,
}

impl Session {
    fn new(charts: Vec<TrendingEntry>) -> Self {
        Self::with_config(PlayerConfig::default(), charts)
    }

    fn with_config(config: PlayerConfig, charts: Vec<TrendingEntry>) -> Self {
        let policy = Arc::new(PlaybackPolicy::new(config.auto_play));
        let (backend, controller) = setup_with(config);
        let continuation = Arc::new(
            ContinuationPolicy::new(Arc::clone(&controller), policy, catalog(charts))
                .with_seed(7),
        );
        let log = EventLog::attach(&controller);
        Self {
            backend,
            controller,
            continuation,
            log,
        }
    }

    async fn play(&self, track: Track, options: PlayOptions, origin: RequestOrigin) {
        let outcome = self.continuation.request_play(track, options, origin).await;
        assert_eq!(outcome, PlayOutcome::Started);
    }

    /// End the live track and run one continuation step
    async fn finish(&self) -> Continuation {
        self.backend.last_device().finish();
        let ended = self.log.ended().pop().expect("no ended event");
        self.continuation.handle_ended(&ended).await
    }
}

fn ended_in(context: PlaybackContext) -> EndedInfo {
    EndedInfo {
        track: track("done"),
        context: Some(context),
        playlist: None,
    }
}

// ===== Playlist =====

#[tokio::test]
async fn test_playlist_advances_past_unplayable_tracks() {
    let session = Session::new(vec![]);
    let mix = playlist(vec![track("a"), unplayable("silent"), track("c")]);
    session
        .play(track("a"), PlayOptions::playlist(at(&mix, 0)), RequestOrigin::Manual)
        .await;

    let next = session.finish().await;

    assert_eq!(
        next,
        Continuation::Playing {
            track: track("c"),
            context: PlaybackContext::Playlist
        }
    );
    let state = session.controller.get_state();
    assert_eq!(state.playlist_ref, Some(at(&mix, 2)));
    assert!(state.is_playing);
    assert_eq!(session.backend.attached_uris(), vec![uri("a"), uri("c")]);
}

#[tokio::test]
async fn test_last_playlist_track_goes_idle() {
    // Auto-play is on and the catalog is non-empty: playlists still never fall back
    let session = Session::new(vec![chart("US", vec![track("hit")])]);
    let mix = playlist(vec![track("a"), track("b")]);
    session
        .play(track("b"), PlayOptions::playlist(at(&mix, 1)), RequestOrigin::AutoPlay)
        .await;

    let next = session.finish().await;

    assert_eq!(next, Continuation::Stopped);
    let state = session.controller.get_state();
    assert_eq!(state.current_track, None);
    assert_eq!(state.phase(), PlaybackPhase::Idle);
    assert_eq!(session.backend.live_count(), 0);
    assert_eq!(session.log.count(EventKind::Stop), 1);
}

#[tokio::test]
async fn test_trailing_unplayable_tracks_end_the_playlist() {
    let session = Session::new(vec![]);
    let mix = playlist(vec![track("a"), unplayable("x"), unplayable("y")]);
    session
        .play(track("a"), PlayOptions::playlist(at(&mix, 0)), RequestOrigin::Manual)
        .await;

    assert_eq!(session.finish().await, Continuation::Stopped);
    assert_eq!(session.backend.attached_uris(), vec![uri("a")]);
}

#[tokio::test]
async fn test_failed_advance_moves_to_next_candidate() {
    let session = Session::new(vec![]);
    session
        .backend
        .set_mode(&uri("b"), StartMode::Fail(PlaybackError::resource("gone")));
    let mix = playlist(vec![track("a"), track("b"), track("c")]);
    session
        .play(track("a"), PlayOptions::playlist(at(&mix, 0)), RequestOrigin::Manual)
        .await;

    let next = session.finish().await;

    assert_eq!(
        next,
        Continuation::Playing {
            track: track("c"),
            context: PlaybackContext::Playlist
        }
    );
    assert_eq!(
        session.backend.attached_uris(),
        vec![uri("a"), uri("b"), uri("c")]
    );
    assert_eq!(session.backend.live_count(), 1);
}

// ===== Random fallback =====

#[tokio::test]
async fn test_random_fallback_plays_a_trending_track() {
    let session = Session::new(vec![
        chart("FR", vec![unplayable("muet")]),
        chart("US", vec![track("hit")]),
    ]);
    session
        .play(track("a"), PlayOptions::new(TRENDING), RequestOrigin::AutoPlay)
        .await;

    let next = session.finish().await;

    assert_eq!(
        next,
        Continuation::Playing {
            track: track("hit"),
            context: PlaybackContext::Trending
        }
    );
    assert!(session.continuation.policy().auto_play_enabled());
}

#[tokio::test]
async fn test_manual_request_latches_auto_play_off() {
    let session = Session::new(vec![chart("US", vec![track("hit")])]);
    session
        .play(track("a"), PlayOptions::new(TRENDING), RequestOrigin::Manual)
        .await;

    assert!(!session.continuation.policy().auto_play_enabled());
    assert_eq!(session.finish().await, Continuation::Stopped);
    assert_eq!(session.backend.attached_uris(), vec![uri("a")]);
}

#[tokio::test]
async fn test_latch_survives_later_auto_plays() {
    let session = Session::new(vec![chart("US", vec![track("hit")])]);
    session
        .play(track("a"), PlayOptions::new(TRENDING), RequestOrigin::Manual)
        .await;
    session
        .play(track("b"), PlayOptions::new(TRENDING), RequestOrigin::AutoPlay)
        .await;

    assert!(!session.continuation.policy().auto_play_enabled());
    assert_eq!(session.finish().await, Continuation::Stopped);
}

#[tokio::test]
async fn test_auto_play_disabled_by_config() {
    let config = PlayerConfig {
        auto_play: false,
        ..PlayerConfig::default()
    };
    let session = Session::with_config(config, vec![chart("US", vec![track("hit")])]);
    session
        .play(track("a"), PlayOptions::new(TRENDING), RequestOrigin::AutoPlay)
        .await;

    assert_eq!(session.finish().await, Continuation::Stopped);
}

#[tokio::test]
async fn test_failed_random_picks_give_up_after_max_attempts() {
    let config = PlayerConfig {
        max_advance_attempts: 3,
        ..PlayerConfig::default()
    };
    let session = Session::with_config(config, vec![chart("US", vec![track("hit")])]);
    session
        .backend
        .set_mode(&uri("hit"), StartMode::Fail(PlaybackError::resource("gone")));
    session
        .play(track("a"), PlayOptions::new(TRENDING), RequestOrigin::AutoPlay)
        .await;

    let next = session.finish().await;

    assert_eq!(next, Continuation::Stopped);
    assert_eq!(
        session.backend.attached_uris(),
        vec![uri("a"), uri("hit"), uri("hit"), uri("hit")]
    );
    assert_eq!(session.backend.live_count(), 0);
    assert_eq!(session.controller.get_state().current_track, None);
}

// ===== Decisions =====

#[tokio::test]
async fn test_random_picks_only_playable_tracks() {
    let session = Session::new(vec![
        chart("US", vec![track("x"), unplayable("dud"), track("y")]),
        chart("JP", vec![unplayable("silent")]),
        chart("BR", vec![]),
    ]);

    for _ in 0..50 {
        match session.continuation.decide(&ended_in(TRENDING)) {
            Decision::Random { track: picked } => {
                assert!(picked == track("x") || picked == track("y"), "{picked:?}");
            }
            other => panic!("expected a random pick, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_empty_catalog_decides_stop() {
    let session = Session::new(vec![chart("JP", vec![unplayable("silent")])]);

    assert_eq!(
        session.continuation.decide(&ended_in(TRENDING)),
        Decision::Stop
    );
}

#[tokio::test]
async fn test_search_context_falls_back_to_random() {
    let session = Session::new(vec![chart("US", vec![track("hit")])]);

    assert_eq!(
        session
            .continuation
            .decide(&ended_in(PlaybackContext::Search)),
        Decision::Random { track: track("hit") }
    );
}

#[tokio::test]
async fn test_playlist_takes_precedence_over_random() {
    let session = Session::new(vec![chart("US", vec![track("hit")])]);
    let mix = playlist(vec![track("a"), track("b")]);
    let ended = EndedInfo {
        track: track("a"),
        context: Some(PlaybackContext::Playlist),
        playlist: Some(at(&mix, 0)),
    };

    assert_eq!(
        session.continuation.decide(&ended),
        Decision::Advance {
            track: track("b"),
            playlist: at(&mix, 1)
        }
    );
}

// ===== Staleness =====

#[tokio::test]
async fn test_stale_ended_event_is_ignored() {
    let session = Session::new(vec![chart("US", vec![track("hit")])]);
    session
        .play(track("a"), PlayOptions::new(TRENDING), RequestOrigin::AutoPlay)
        .await;
    session.backend.last_device().finish();
    let ended = session.log.ended().pop().unwrap();

    // The user picked something else before the driver got to the event
    session
        .play(track("b"), PlayOptions::new(TRENDING), RequestOrigin::Manual)
        .await;

    assert_eq!(
        session.continuation.handle_ended(&ended).await,
        Continuation::Ignored
    );
    assert_eq!(
        session.controller.get_state().current_track,
        Some(track("b"))
    );
    assert_eq!(session.backend.attached_uris(), vec![uri("a"), uri("b")]);
}

// ===== Driver =====

#[tokio::test]
async fn test_spawned_driver_continues_from_event_stream() {
    let session = Session::new(vec![]);
    let driver = Arc::clone(&session.continuation).spawn();
    let mix = playlist(vec![track("a"), track("b")]);
    session
        .play(track("a"), PlayOptions::playlist(at(&mix, 0)), RequestOrigin::Manual)
        .await;

    session.backend.last_device().finish();
    wait_until(|| {
        let state = session.controller.get_state();
        state.is_playing && state.current_track == Some(track("b"))
    })
    .await;

    session.backend.last_device().finish();
    wait_until(|| session.controller.get_state().phase() == PlaybackPhase::Idle).await;

    assert_eq!(session.backend.attached_uris(), vec![uri("a"), uri("b")]);
    driver.abort();
}
