//! Playback controller - core orchestration
//!
//! Owns the single live device and the one `ControllerState`, and serialises every
//! play request through a single-flight lock.
//!
//! Locking discipline: the state mutex is never held across an `.await`, never held
//! while calling into a device, and never held while running event handlers. Devices
//! may therefore report signals synchronously from any method, and event handlers may
//! call straight back into the controller. Every state change is published: the
//! broadcast half of an event is queued before the lock is released, so async
//! receivers see events in the order the state changed.

use crate::{
    device::{clamp_seek, DeviceBackend, DeviceSignal, PlaybackDevice, SignalListener},
    error::{PlaybackError, Result},
    events::{EndedInfo, EventBus, EventKind, PlayerEvent, Subscription},
    types::{ControllerState, InFlightPolicy, PlayOptions, PlayOutcome, PlayerConfig},
};
use globebeats_core::Track;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// The device currently bound to the controller
struct LiveDevice {
    generation: u64,
    device: Arc<dyn PlaybackDevice>,
}

struct Inner {
    state: ControllerState,
    live: Option<LiveDevice>,

    /// Generation of the in-flight load; `Some` is the single-flight lock
    loading: Option<u64>,
    next_generation: u64,
}

impl Inner {
    fn is_live(&self, generation: u64) -> bool {
        self.live.as_ref().is_some_and(|l| l.generation == generation)
    }

    /// Detach the live device if it belongs to `generation`
    fn take_live_if(&mut self, generation: u64) -> Option<LiveDevice> {
        if self.is_live(generation) {
            self.live.take()
        } else {
            None
        }
    }

    fn clear_track(&mut self) {
        self.state.is_playing = false;
        self.state.current_track = None;
        self.state.context = None;
        self.state.playlist_ref = None;
    }
}

/// Central playback controller
///
/// Guarantees:
/// - At most one device is live (attached, listeners bound) at any instant; the
///   previous one is detached and released before a new one is attached.
/// - At most one play request is loading. A concurrent request is rejected with
///   [`PlayOutcome::Busy`] or, under [`InFlightPolicy::Supersede`], takes over the
///   lock and the older request resolves `Failed(Cancelled)`. Nothing is queued.
/// - `is_playing` drops to false the moment a new load is accepted.
///
/// Construct one per session with [`PlaybackController::new`] and hand out clones
/// of the `Arc`. Hosts that need an ambient instance can use [`shared_controller`].
pub struct PlaybackController {
    me: Weak<PlaybackController>,
    backend: Arc<dyn DeviceBackend>,
    config: PlayerConfig,
    events: EventBus,
    inner: Mutex<Inner>,
    unlock_gate: tokio::sync::Mutex<()>,
}

impl PlaybackController {
    /// Create a controller driving devices from `backend`
    pub fn new(backend: Arc<dyn DeviceBackend>, config: PlayerConfig) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            backend,
            events: EventBus::new(config.event_capacity),
            config,
            inner: Mutex::new(Inner {
                state: ControllerState::default(),
                live: None,
                loading: None,
                next_generation: 0,
            }),
            unlock_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Configuration this controller was built with
    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Queries and subscriptions =====

    /// Point-in-time copy of the state
    pub fn get_state(&self) -> ControllerState {
        self.lock().state.clone()
    }

    /// Number of live devices (always 0 or 1)
    pub fn live_device_count(&self) -> usize {
        usize::from(self.lock().live.is_some())
    }

    /// Current position of the live device, in seconds
    pub fn current_time(&self) -> Option<f64> {
        self.live_device().map(|device| device.current_time())
    }

    /// Register a synchronous handler; dropping the result unsubscribes
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&PlayerEvent) + Send + Sync + 'static,
    {
        self.events.on(kind, handler)
    }

    /// Async stream of every subsequent event
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// The underlying event bus
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Queue `event` for async receivers while `inner` is held, then run handlers
    fn emit_locked(&self, inner: MutexGuard<'_, Inner>, event: PlayerEvent) {
        self.events.broadcast(&event);
        drop(inner);
        self.events.notify(&event);
    }

    fn live_device(&self) -> Option<Arc<dyn PlaybackDevice>> {
        let inner = self.lock();
        if inner.loading.is_some() {
            return None;
        }
        inner.live.as_ref().map(|l| Arc::clone(&l.device))
    }

    // ===== Unlock =====

    /// Satisfy the platform's gesture-gated autoplay policy
    ///
    /// Idempotent: once unlocked, returns `true` without touching the backend.
    /// `PlayerEvent::Unlocked` fires exactly once per controller.
    pub async fn unlock(&self) -> bool {
        match self.ensure_unlocked().await {
            Ok(()) => true,
            Err(error) => {
                self.report(&error);
                false
            }
        }
    }

    async fn ensure_unlocked(&self) -> Result<()> {
        if self.lock().state.is_unlocked {
            return Ok(());
        }

        let _gate = self.unlock_gate.lock().await;
        if self.lock().state.is_unlocked {
            return Ok(());
        }

        self.backend.unlock().await?;

        let mut inner = self.lock();
        inner.state.is_unlocked = true;
        info!("Audio unlocked");
        self.emit_locked(inner, PlayerEvent::Unlocked);
        Ok(())
    }

    // ===== Play =====

    /// Play `track`, replacing whatever is loaded
    ///
    /// - Same sound already playing: [`PlayOutcome::AlreadyPlaying`], device untouched.
    /// - Another request loading: [`PlayOutcome::Busy`] (or supersede it, see
    ///   [`InFlightPolicy`]).
    /// - Otherwise the live device is torn down, state is updated to reflect the new
    ///   intent (published as [`PlayerEvent::Loading`]), and a fresh device is attached
    ///   and started. On failure the new device is torn down and the current track
    ///   cleared. The controller never retries.
    pub async fn play(&self, track: Track, options: PlayOptions) -> PlayOutcome {
        let Some(uri) = track.playable_uri().map(str::to_owned) else {
            return self.reject(PlaybackError::invalid_request(format!(
                "'{}' has no playable preview",
                track.title
            )));
        };
        if let Some(playlist_ref) = &options.playlist_ref {
            if !playlist_ref.is_in_bounds() {
                return self.reject(PlaybackError::invalid_request(format!(
                    "index {} is outside playlist '{}' ({} tracks)",
                    playlist_ref.index,
                    playlist_ref.playlist.name,
                    playlist_ref.playlist.len()
                )));
            }
        }

        let (generation, superseded, loading) = {
            let mut inner = self.lock();

            let duplicate = inner.state.is_playing
                && inner
                    .state
                    .current_track
                    .as_ref()
                    .is_some_and(|current| current.same_sound(&track));
            if duplicate {
                debug!(title = %track.title, "Already playing; ignoring duplicate request");
                return PlayOutcome::AlreadyPlaying;
            }

            if let Some(in_flight) = inner.loading {
                match self.config.in_flight {
                    InFlightPolicy::RejectNew => {
                        debug!(title = %track.title, "Play rejected: another request is loading");
                        return PlayOutcome::Busy;
                    }
                    InFlightPolicy::Supersede => {
                        debug!(
                            superseded = in_flight,
                            title = %track.title,
                            "Superseding in-flight load"
                        );
                    }
                }
            }

            let generation = inner.next_generation;
            inner.next_generation += 1;
            inner.loading = Some(generation);

            let superseded = inner.live.take();
            inner.state.is_loading = true;
            inner.state.is_playing = false;
            inner.state.current_track = Some(track.clone());
            inner.state.context = Some(options.context);
            inner.state.playlist_ref = options.playlist_ref;

            let loading = PlayerEvent::Loading {
                track: track.clone(),
            };
            self.events.broadcast(&loading);
            (generation, superseded, loading)
        };

        if let Some(old) = superseded {
            old.device.release();
        }
        self.events.notify(&loading);

        debug!(generation, title = %track.title, context = %options.context, "Loading");
        let guard = LoadGuard {
            controller: self,
            generation,
            armed: true,
        };

        if let Err(error) = self.ensure_unlocked().await {
            return guard.finish(&track, Err(error));
        }

        let device = self.backend.attach(&uri, self.listener(generation));
        {
            let mut inner = self.lock();
            if inner.loading != Some(generation) {
                drop(inner);
                device.release();
                return guard.finish(&track, Err(PlaybackError::Cancelled));
            }
            inner.live = Some(LiveDevice {
                generation,
                device: Arc::clone(&device),
            });
        }

        let started = self.start_with_timeout(device.as_ref()).await;
        guard.finish(&track, started)
    }

    async fn start_with_timeout(&self, device: &dyn PlaybackDevice) -> Result<()> {
        match self.config.start_timeout() {
            Some(limit) => tokio::time::timeout(limit, device.start())
                .await
                .unwrap_or(Err(PlaybackError::StartTimeout(limit))),
            None => device.start().await,
        }
    }

    fn finish_load(&self, generation: u64, track: &Track, started: Result<()>) -> PlayOutcome {
        let mut inner = self.lock();
        if inner.loading != Some(generation) {
            // stop() or a superseding play() already tore this load down
            return PlayOutcome::Failed(PlaybackError::Cancelled);
        }
        inner.loading = None;
        inner.state.is_loading = false;

        match started {
            Ok(()) => {
                inner.state.is_playing = true;
                info!(title = %track.title, artist = %track.artist, "Playing");
                self.emit_locked(
                    inner,
                    PlayerEvent::Play {
                        track: track.clone(),
                    },
                );
                PlayOutcome::Started
            }
            Err(error) => {
                let dead = inner.take_live_if(generation);
                inner.clear_track();
                let event = Self::failure(&error);
                self.events.broadcast(&event);
                drop(inner);

                if let Some(dead) = dead {
                    dead.device.release();
                }
                self.events.notify(&event);
                PlayOutcome::Failed(error)
            }
        }
    }

    /// Tear down a load whose `play()` future was dropped before it resolved
    ///
    /// Observers see the same teardown as `stop()`.
    fn abandon_load(&self, generation: u64) {
        let dead = {
            let mut inner = self.lock();
            if inner.loading != Some(generation) {
                return;
            }
            inner.loading = None;
            inner.state.is_loading = false;
            inner.clear_track();
            self.events.broadcast(&PlayerEvent::Stop);
            inner.take_live_if(generation)
        };
        if let Some(dead) = dead {
            dead.device.release();
        }
        debug!(generation, "Play request dropped while loading; released its device");
        self.events.notify(&PlayerEvent::Stop);
    }

    fn reject(&self, error: PlaybackError) -> PlayOutcome {
        self.report(&error);
        PlayOutcome::Failed(error)
    }

    fn report(&self, error: &PlaybackError) {
        self.events.emit(Self::failure(error));
    }

    /// Log `error` at its level and build the event announcing it
    fn failure(error: &PlaybackError) -> PlayerEvent {
        if error.is_expected() {
            debug!(%error, "Playback did not start");
        } else {
            warn!(%error, "Playback failed");
        }
        PlayerEvent::Error {
            error: error.clone(),
        }
    }

    // ===== Transport =====

    /// Pause the live device; no-op when nothing is live or a load is in flight
    pub fn pause(&self) {
        let Some(device) = self.live_device() else {
            return;
        };
        device.pause();

        let mut inner = self.lock();
        if inner.state.is_playing && inner.loading.is_none() {
            inner.state.is_playing = false;
            debug!("Paused");
            self.emit_locked(inner, PlayerEvent::Pause);
        }
    }

    /// Resume the live device
    ///
    /// Returns `false` when nothing is live, a load is in flight, the device refuses
    /// to start, or a new play replaced the device while resuming. A device that is
    /// already sounding (resumed from native controls before its `Started` signal
    /// arrived) is adopted without a second `start()`.
    pub async fn resume(&self) -> bool {
        let (generation, device) = {
            let inner = self.lock();
            if inner.loading.is_some() {
                return false;
            }
            let Some(live) = inner.live.as_ref() else {
                return false;
            };
            if inner.state.is_playing {
                return true;
            }
            (live.generation, Arc::clone(&live.device))
        };

        if !device.is_paused() {
            debug!(generation, "Device already sounding; adopting it");
            return self.mark_playing(generation);
        }

        match self.start_with_timeout(device.as_ref()).await {
            Ok(()) => self.mark_playing(generation),
            Err(error) => {
                let current = {
                    let inner = self.lock();
                    inner.is_live(generation) && inner.loading.is_none()
                };
                if current {
                    self.report(&error);
                }
                false
            }
        }
    }

    /// Record that the device of `generation` is sounding; `false` if it was replaced
    fn mark_playing(&self, generation: u64) -> bool {
        let mut inner = self.lock();
        if !inner.is_live(generation) || inner.loading.is_some() {
            return false;
        }
        if inner.state.is_playing {
            return true;
        }
        inner.state.is_playing = true;
        let track = inner.state.current_track.clone();
        if let Some(track) = track {
            debug!(title = %track.title, "Resumed");
            self.emit_locked(inner, PlayerEvent::Play { track });
        }
        true
    }

    /// Pause if playing, otherwise resume
    pub async fn toggle_play_pause(&self) -> bool {
        if self.lock().state.is_playing {
            self.pause();
            true
        } else {
            self.resume().await
        }
    }

    /// Full teardown; clears track, context and playlist and cancels any load
    ///
    /// The unlock flag survives: it belongs to the page session, not to a track.
    pub fn stop(&self) {
        let dead = {
            let mut inner = self.lock();
            inner.loading = None;
            inner.state.is_loading = false;
            inner.clear_track();
            self.events.broadcast(&PlayerEvent::Stop);
            inner.live.take()
        };
        if let Some(dead) = dead {
            dead.device.release();
        }
        debug!("Stopped");
        self.events.notify(&PlayerEvent::Stop);
    }

    /// Seek the live device (the device clamps to `[0, duration]`)
    pub fn seek(&self, time: f64) {
        if let Some(device) = self.live_device() {
            device.seek(time);
        }
    }

    /// Move by `delta_seconds` relative to the current position
    ///
    /// Returns the clamped target that was sent to the device.
    pub fn skip(&self, delta_seconds: f64) -> Option<f64> {
        let device = self.live_device()?;
        let target = clamp_seek(device.current_time() + delta_seconds, device.duration());
        device.seek(target);
        Some(target)
    }

    // ===== Device signals =====

    fn listener(&self, generation: u64) -> SignalListener {
        let me = self.me.clone();
        Arc::new(move |signal: DeviceSignal| {
            if let Some(controller) = me.upgrade() {
                controller.handle_signal(generation, signal);
            }
        })
    }

    fn handle_signal(&self, generation: u64, signal: DeviceSignal) {
        let mut inner = self.lock();
        let event = {
            let loading_this = inner.loading == Some(generation);
            if !inner.is_live(generation) && !loading_this {
                // Listener of a torn-down device
                return;
            }

            match signal {
                DeviceSignal::TimeUpdated {
                    current_time,
                    duration,
                } => Some(PlayerEvent::TimeUpdate {
                    current_time,
                    duration,
                }),
                DeviceSignal::DurationKnown(duration) => {
                    Some(PlayerEvent::LoadedMetadata { duration })
                }
                // While loading, the outcome of start() is authoritative
                _ if loading_this => None,
                DeviceSignal::Started => {
                    if inner.state.is_playing {
                        None
                    } else {
                        inner.state.is_playing = true;
                        inner
                            .state
                            .current_track
                            .clone()
                            .map(|track| PlayerEvent::Play { track })
                    }
                }
                DeviceSignal::Paused => {
                    if inner.state.is_playing {
                        inner.state.is_playing = false;
                        Some(PlayerEvent::Pause)
                    } else {
                        None
                    }
                }
                DeviceSignal::Ended => {
                    inner.state.is_playing = false;
                    inner.state.current_track.clone().map(|track| {
                        PlayerEvent::Ended(EndedInfo {
                            track,
                            context: inner.state.context,
                            playlist: inner.state.playlist_ref.clone(),
                        })
                    })
                }
                DeviceSignal::Failed(error) => {
                    inner.state.is_playing = false;
                    Some(PlayerEvent::Error { error })
                }
            }
        };

        if let Some(event) = event {
            match &event {
                PlayerEvent::Ended(info) => info!(title = %info.track.title, "Track ended"),
                PlayerEvent::Error { error } => warn!(%error, "Live device failed"),
                _ => {}
            }
            self.emit_locked(inner, event);
        }
    }
}

/// Clears the single-flight lock if a `play()` future is dropped mid-load
struct LoadGuard<'a> {
    controller: &'a PlaybackController,
    generation: u64,
    armed: bool,
}

impl LoadGuard<'_> {
    fn finish(mut self, track: &Track, started: Result<()>) -> PlayOutcome {
        self.armed = false;
        self.controller.finish_load(self.generation, track, started)
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.controller.abandon_load(self.generation);
        }
    }
}

static SHARED: OnceLock<Arc<PlaybackController>> = OnceLock::new();

/// Process-wide controller for hosts that cannot pass one down explicitly
///
/// `init` runs at most once; later calls return the same instance and ignore their
/// argument.
pub fn shared_controller<F>(init: F) -> Arc<PlaybackController>
where
    F: FnOnce() -> Arc<PlaybackController>,
{
    Arc::clone(SHARED.get_or_init(init))
}
