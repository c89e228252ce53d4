//! Player Events
//!
//! Push-based event fan-out from the controller to any number of observers.
//! Two consumption styles share one emit call:
//! - `on(kind, handler)` - synchronous handlers, released by dropping the returned
//!   [`Subscription`]
//! - `subscribe()` - a `tokio::sync::broadcast` receiver for async consumers

use crate::error::PlaybackError;
use globebeats_core::{PlaybackContext, PlaylistRef, Track};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// What was playing when a track ended naturally
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndedInfo {
    /// The finished track
    pub track: Track,

    /// Context it was playing in
    pub context: Option<PlaybackContext>,

    /// Playlist position it was playing at
    pub playlist: Option<PlaylistRef>,
}

/// Events emitted by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The silent unlock cycle succeeded (at most once per session)
    Unlocked,

    /// A play request was accepted; the previous device is gone and `track` is loading
    Loading {
        /// Track being loaded
        track: Track,
    },

    /// Playback became audible
    Play {
        /// Track now sounding
        track: Track,
    },

    /// Playback paused
    Pause,

    /// Full teardown; all fields cleared (also sent when a loading request is abandoned)
    Stop,

    /// Track reached its end
    Ended(EndedInfo),

    /// Position update (seconds)
    TimeUpdate {
        /// Playback position
        current_time: f64,
        /// Track duration
        duration: f64,
    },

    /// Duration became known (seconds)
    LoadedMetadata {
        /// Track duration
        duration: f64,
    },

    /// A play, resume or unlock failed, or the live resource errored
    Error {
        /// What went wrong
        error: PlaybackError,
    },
}

/// Event names for filtering subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Unlocked,
    Loading,
    Play,
    Pause,
    Stop,
    Ended,
    TimeUpdate,
    LoadedMetadata,
    Error,
}

impl EventKind {
    /// Every kind, in declaration order
    pub const ALL: [EventKind; 9] = [
        EventKind::Unlocked,
        EventKind::Loading,
        EventKind::Play,
        EventKind::Pause,
        EventKind::Stop,
        EventKind::Ended,
        EventKind::TimeUpdate,
        EventKind::LoadedMetadata,
        EventKind::Error,
    ];
}

impl PlayerEvent {
    /// Name of this event
    pub fn kind(&self) -> EventKind {
        match self {
            PlayerEvent::Unlocked => EventKind::Unlocked,
            PlayerEvent::Loading { .. } => EventKind::Loading,
            PlayerEvent::Play { .. } => EventKind::Play,
            PlayerEvent::Pause => EventKind::Pause,
            PlayerEvent::Stop => EventKind::Stop,
            PlayerEvent::Ended(_) => EventKind::Ended,
            PlayerEvent::TimeUpdate { .. } => EventKind::TimeUpdate,
            PlayerEvent::LoadedMetadata { .. } => EventKind::LoadedMetadata,
            PlayerEvent::Error { .. } => EventKind::Error,
        }
    }
}

type Handler = Arc<dyn Fn(&PlayerEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, EventKind, Handler)>,
}

/// Fan-out hub owned by the controller
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
    tx: broadcast::Sender<PlayerEvent>,
}

impl EventBus {
    /// Create a bus whose async receivers buffer up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            tx,
        }
    }

    /// Register `handler` for events of `kind`
    ///
    /// The handler stays registered until the returned [`Subscription`] is dropped.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, kind, Arc::new(handler)));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            id,
        }
    }

    /// Async receiver of every event emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Number of registered synchronous handlers
    pub fn handler_count(&self) -> usize {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }

    /// Deliver `event` to every matching handler, then to async receivers
    pub fn emit(&self, event: PlayerEvent) {
        self.notify(&event);
        self.broadcast(&event);
    }

    /// Queue `event` for async receivers
    ///
    /// Never blocks and never runs user code, so the controller calls it while still
    /// holding its state lock: the broadcast stream is in mutation order.
    pub(crate) fn broadcast(&self, event: &PlayerEvent) {
        // No receivers is fine
        let _ = self.tx.send(event.clone());
    }

    /// Run every handler registered for `event`'s kind
    ///
    /// Handlers run on a snapshot of the registry taken before the first call, with
    /// no lock held, so a handler may subscribe, unsubscribe or call back into the
    /// controller. A panicking handler is logged and does not stop the others.
    pub(crate) fn notify(&self, event: &PlayerEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
            registry
                .handlers
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, h)| Arc::clone(h))
                .collect()
        };

        trace!(?kind, handlers = handlers.len(), "emit");

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(?kind, "event handler panicked; continuing with remaining handlers");
            }
        }
    }
}

/// Scoped handle to one registered handler
///
/// Dropping it unregisters the handler. Outliving the bus is harmless.
#[must_use = "dropping a Subscription immediately unregisters its handler"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    id: u64,
}

impl Subscription {
    /// Unregister now (same as dropping)
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .handlers
                .retain(|(id, _, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
