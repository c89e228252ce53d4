//! Shared test helpers: a scripted device backend
//!
//! Devices either resolve `start()` immediately (success or a configured error) or
//! wait until the test resolves them by hand, which is how overlapping play
//! requests are staged.

#![allow(dead_code)]

use async_trait::async_trait;
use globebeats_core::{
    ChartSource, PlaybackContext, Playlist, PlaylistRef, Track, TrendingCatalog, TrendingEntry,
};
use globebeats_playback::{
    clamp_seek, DeviceBackend, DeviceSignal, EventKind, PlaybackController, PlaybackDevice,
    PlaybackError, PlayerConfig, PlayerEvent, Result, SignalListener, Subscription,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ===== Devices =====

/// How a device answers `start()`
#[derive(Debug, Clone)]
pub enum StartMode {
    Succeed,
    Fail(PlaybackError),
    /// Wait for `MockDevice::resolve`
    Manual,
}

#[derive(Debug, Default)]
struct DeviceState {
    released: bool,
    paused: bool,
    current_time: f64,
    duration: Option<f64>,
    seeks: Vec<f64>,
    start_calls: usize,
    pending: Option<Result<()>>,
}

pub struct MockDevice {
    pub uri: String,
    mode: StartMode,
    listener: SignalListener,
    state: Mutex<DeviceState>,
    notify: Notify,
}

impl MockDevice {
    /// Resolve a `Manual` start
    pub fn resolve(&self, result: Result<()>) {
        self.state.lock().unwrap().pending = Some(result);
        self.notify.notify_one();
    }

    /// Fire a signal as the platform would (even after release)
    pub fn emit(&self, signal: DeviceSignal) {
        (self.listener)(signal);
    }

    /// Reach the end of the resource
    pub fn finish(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.paused = true;
            if let Some(duration) = state.duration {
                state.current_time = duration;
            }
        }
        self.emit(DeviceSignal::Ended);
    }

    pub fn set_position(&self, current_time: f64, duration: f64) {
        let mut state = self.state.lock().unwrap();
        state.current_time = current_time;
        state.duration = Some(duration);
    }

    /// Change the paused flag without signalling (the platform event is still queued)
    pub fn set_paused(&self, paused: bool) {
        self.state.lock().unwrap().paused = paused;
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().unwrap().released
    }

    pub fn seeks(&self) -> Vec<f64> {
        self.state.lock().unwrap().seeks.clone()
    }

    pub fn start_calls(&self) -> usize {
        self.state.lock().unwrap().start_calls
    }
}

#[async_trait]
impl PlaybackDevice for MockDevice {
    async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock().unwrap();
            if state.released {
                return Err(PlaybackError::Cancelled);
            }
            state.start_calls += 1;
        }

        let result = match &self.mode {
            StartMode::Succeed => Ok(()),
            StartMode::Fail(error) => Err(error.clone()),
            StartMode::Manual => loop {
                {
                    let mut state = self.state.lock().unwrap();
                    if let Some(result) = state.pending.take() {
                        break result;
                    }
                    if state.released {
                        break Err(PlaybackError::Cancelled);
                    }
                }
                self.notify.notified().await;
            },
        };

        if result.is_ok() {
            self.state.lock().unwrap().paused = false;
        }
        result
    }

    fn pause(&self) {
        let mut state = self.state.lock().unwrap();
        if !state.released {
            state.paused = true;
        }
    }

    fn seek(&self, time: f64) {
        let mut state = self.state.lock().unwrap();
        if state.released {
            return;
        }
        let target = clamp_seek(time, state.duration);
        state.current_time = target;
        state.seeks.push(target);
    }

    fn release(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.released = true;
            state.paused = true;
        }
        self.notify.notify_one();
    }

    fn current_time(&self) -> f64 {
        self.state.lock().unwrap().current_time
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().unwrap().duration
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }
}

// ===== Backend =====

pub struct MockBackend {
    devices: Mutex<Vec<Arc<MockDevice>>>,
    default_mode: Mutex<StartMode>,
    modes: Mutex<HashMap<String, StartMode>>,
    unlock_result: Mutex<Result<()>>,
    unlock_calls: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            default_mode: Mutex::new(StartMode::Succeed),
            modes: Mutex::new(HashMap::new()),
            unlock_result: Mutex::new(Ok(())),
            unlock_calls: AtomicUsize::new(0),
        }
    }
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_default_mode(&self, mode: StartMode) {
        *self.default_mode.lock().unwrap() = mode;
    }

    pub fn set_mode(&self, uri: &str, mode: StartMode) {
        self.modes.lock().unwrap().insert(uri.to_string(), mode);
    }

    pub fn set_unlock_result(&self, result: Result<()>) {
        *self.unlock_result.lock().unwrap() = result;
    }

    pub fn unlock_calls(&self) -> usize {
        self.unlock_calls.load(Ordering::SeqCst)
    }

    pub fn devices(&self) -> Vec<Arc<MockDevice>> {
        self.devices.lock().unwrap().clone()
    }

    pub fn attached_uris(&self) -> Vec<String> {
        self.devices().iter().map(|d| d.uri.clone()).collect()
    }

    pub fn last_device(&self) -> Arc<MockDevice> {
        self.devices().last().cloned().expect("no device attached")
    }

    /// Attached and not yet released
    pub fn live_count(&self) -> usize {
        self.devices().iter().filter(|d| !d.is_released()).count()
    }
}

#[async_trait]
impl DeviceBackend for MockBackend {
    fn attach(&self, uri: &str, listener: SignalListener) -> Arc<dyn PlaybackDevice> {
        let mode = self
            .modes
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .unwrap_or_else(|| self.default_mode.lock().unwrap().clone());

        let device = Arc::new(MockDevice {
            uri: uri.to_string(),
            mode,
            listener,
            state: Mutex::new(DeviceState {
                paused: true,
                ..DeviceState::default()
            }),
            notify: Notify::new(),
        });
        self.devices.lock().unwrap().push(Arc::clone(&device));
        device
    }

    async fn unlock(&self) -> Result<()> {
        self.unlock_calls.fetch_add(1, Ordering::SeqCst);
        self.unlock_result.lock().unwrap().clone()
    }
}

// ===== Fixtures =====

pub fn setup() -> (Arc<MockBackend>, Arc<PlaybackController>) {
    setup_with(PlayerConfig::default())
}

pub fn setup_with(config: PlayerConfig) -> (Arc<MockBackend>, Arc<PlaybackController>) {
    let backend = MockBackend::new();
    let controller = PlaybackController::new(backend.clone(), config);
    (backend, controller)
}

pub fn uri(name: &str) -> String {
    format!("https://cdn.test/{name}.m4a")
}

pub fn track(name: &str) -> Track {
    Track::new(name, "Test Artist", Some(uri(name)))
}

pub fn unplayable(name: &str) -> Track {
    Track::new(name, "Test Artist", None::<String>)
}

pub fn playlist(tracks: Vec<Track>) -> Arc<Playlist> {
    Arc::new(Playlist::new("pl-1", "Test Mix", tracks))
}

pub fn at(playlist: &Arc<Playlist>, index: usize) -> PlaylistRef {
    PlaylistRef::new(Arc::clone(playlist), index)
}

pub fn chart(code: &str, tracks: Vec<Track>) -> TrendingEntry {
    TrendingEntry::new(code, code, ChartSource::Itunes, tracks)
}

pub fn catalog(entries: Vec<TrendingEntry>) -> Arc<TrendingCatalog> {
    Arc::new(TrendingCatalog::new(entries))
}

pub const TRENDING: PlaybackContext = PlaybackContext::Trending;

/// Records every event of the given kinds, in order
pub struct EventLog {
    events: Arc<Mutex<Vec<PlayerEvent>>>,
    _subscriptions: Vec<Subscription>,
}

impl EventLog {
    pub fn attach(controller: &PlaybackController) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let events = Arc::clone(&events);
                controller.on(kind, move |event| events.lock().unwrap().push(event.clone()))
            })
            .collect();
        Self {
            events,
            _subscriptions: subscriptions,
        }
    }

    pub fn all(&self) -> Vec<PlayerEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.all().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn ended(&self) -> Vec<globebeats_playback::EndedInfo> {
        self.all()
            .into_iter()
            .filter_map(|e| match e {
                PlayerEvent::Ended(info) => Some(info),
                _ => None,
            })
            .collect()
    }
}

/// Yield until `condition` holds (bounded so a broken test fails instead of hanging)
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached");
}
