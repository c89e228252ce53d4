//! Reactive binding
//!
//! Bridges the controller's push events into a pull/observe model for UI code:
//! `mount()` subscribes, dropping the binding unsubscribes, and the mirrored state is
//! published on a `tokio::sync::watch` channel. The controller announces every state
//! change with an event (including `Loading` when a request is accepted), so the
//! snapshot never shows a released device as playing.
//!
//! # Latest-handler cells
//!
//! Subscriptions are created once per mount, but the callbacks a UI passes in (for
//! example "a track ended") change on every render. Capturing them at subscribe time
//! would call a stale closure forever. Instead the subscription reads the callback
//! through a [`LatestHandler`] cell at call time, and [`PlayerBinding::render`]
//! replaces the cell's contents on every render. Any new callback passed into a
//! binding must follow this pattern.

use crate::{
    controller::PlaybackController,
    error::PlaybackError,
    events::{EndedInfo, EventKind, PlayerEvent, Subscription},
    policy::{PlaybackPolicy, RequestOrigin},
    types::{ControllerState, PlayOptions, PlayOutcome},
};
use globebeats_core::Track;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::watch;

/// Callback run when a track ends naturally
pub type EndedHandler = Arc<dyn Fn(&EndedInfo) + Send + Sync>;

/// What a UI renders from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingSnapshot {
    /// Mirror of the controller's state after the last event
    pub state: ControllerState,

    /// Last reported position (seconds)
    pub current_time: f64,

    /// Last reported duration (seconds, 0 until known)
    pub duration: f64,

    /// Most recent failure, cleared when playback starts again
    pub last_error: Option<PlaybackError>,
}

/// Mutable indirection holding the most recent version of a callback
pub struct LatestHandler<T: ?Sized> {
    slot: Arc<RwLock<Option<Arc<T>>>>,
}

impl<T: ?Sized> LatestHandler<T> {
    /// Empty cell
    pub fn new() -> Self {
        Self {
            slot: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the callback
    pub fn set(&self, handler: Option<Arc<T>>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = handler;
    }

    /// Callback as of right now
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T: ?Sized> Clone for LatestHandler<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: ?Sized> Default for LatestHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A mounted UI scope observing the controller
///
/// Holds only derived display state (position, duration, last error); everything
/// else is read from the controller on each event. Plays issued through a binding are
/// user actions and always go through the session policy's manual latch.
pub struct PlayerBinding {
    controller: Arc<PlaybackController>,
    policy: Arc<PlaybackPolicy>,
    snapshot: Arc<watch::Sender<BindingSnapshot>>,
    on_ended: LatestHandler<dyn Fn(&EndedInfo) + Send + Sync>,
    subscriptions: Vec<Subscription>,
}

impl PlayerBinding {
    /// Subscribe to every controller event on behalf of the session owning `policy`
    pub fn mount(controller: &Arc<PlaybackController>, policy: Arc<PlaybackPolicy>) -> Self {
        let (tx, _) = watch::channel(BindingSnapshot {
            state: controller.get_state(),
            ..BindingSnapshot::default()
        });
        let snapshot = Arc::new(tx);
        let on_ended: LatestHandler<dyn Fn(&EndedInfo) + Send + Sync> = LatestHandler::new();

        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                // Weak: the controller's bus owns this closure
                let weak = Arc::downgrade(controller);
                let snapshot = Arc::clone(&snapshot);
                let on_ended = on_ended.clone();
                controller.on(kind, move |event| {
                    apply_event(&weak, &snapshot, &on_ended, event);
                })
            })
            .collect();

        Self {
            controller: Arc::clone(controller),
            policy,
            snapshot,
            on_ended,
            subscriptions,
        }
    }

    /// Called on every render with the current callbacks
    pub fn render(&self, on_ended: Option<EndedHandler>) {
        self.on_ended.set(on_ended);
    }

    /// Current mirrored state
    pub fn snapshot(&self) -> BindingSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Observe snapshot changes
    pub fn watch(&self) -> watch::Receiver<BindingSnapshot> {
        self.snapshot.subscribe()
    }

    /// Number of live subscriptions held by this scope
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Release every subscription (same as dropping)
    pub fn unmount(self) {}

    // ===== Actions =====

    /// Manual play; trips the auto-play latch before dispatching
    pub async fn play(&self, track: Track, options: PlayOptions) -> PlayOutcome {
        self.policy.note_request(RequestOrigin::Manual);
        self.controller.play(track, options).await
    }

    pub fn pause(&self) {
        self.controller.pause();
    }

    pub async fn resume(&self) -> bool {
        self.controller.resume().await
    }

    pub async fn toggle_play_pause(&self) -> bool {
        self.controller.toggle_play_pause().await
    }

    pub fn stop(&self) {
        self.controller.stop();
    }

    pub fn seek(&self, time: f64) {
        self.controller.seek(time);
    }

    pub fn skip(&self, delta_seconds: f64) -> Option<f64> {
        self.controller.skip(delta_seconds)
    }

    pub fn skip_forward(&self) -> Option<f64> {
        self.controller.skip(self.controller.config().skip_seconds)
    }

    pub fn skip_back(&self) -> Option<f64> {
        self.controller.skip(-self.controller.config().skip_seconds)
    }

    pub async fn unlock(&self) -> bool {
        self.controller.unlock().await
    }
}

fn apply_event(
    controller: &Weak<PlaybackController>,
    snapshot: &watch::Sender<BindingSnapshot>,
    on_ended: &LatestHandler<dyn Fn(&EndedInfo) + Send + Sync>,
    event: &PlayerEvent,
) {
    let Some(controller) = controller.upgrade() else {
        return;
    };
    let state = controller.get_state();

    snapshot.send_modify(|snap| {
        if snap.state.current_track != state.current_track {
            snap.current_time = 0.0;
            snap.duration = 0.0;
        }
        snap.state = state;

        match event {
            PlayerEvent::TimeUpdate {
                current_time,
                duration,
            } => {
                snap.current_time = *current_time;
                snap.duration = *duration;
            }
            PlayerEvent::Loading { .. } => {
                snap.current_time = 0.0;
                snap.duration = 0.0;
            }
            PlayerEvent::LoadedMetadata { duration } => snap.duration = *duration,
            PlayerEvent::Play { .. } => snap.last_error = None,
            PlayerEvent::Error { error } => snap.last_error = Some(error.clone()),
            _ => {}
        }
    });

    if let PlayerEvent::Ended(info) = event {
        if let Some(handler) = on_ended.get() {
            handler(info);
        }
    }
}
