//! Simulated audio backend
//!
//! Stands in for a browser `<audio>` element: a device "plays" by advancing a clock on
//! a tokio task and reports progress through the same signals a real element would
//! (`DurationKnown` once loaded, `TimeUpdated` per tick, `Ended` at the end).

use crate::config::SimulationSettings;
use async_trait::async_trait;
use globebeats_playback::{
    clamp_seek, DeviceBackend, DeviceSignal, PlaybackDevice, PlaybackError, Result,
    SignalListener,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Creates simulated devices and models the gesture-gated unlock
pub struct SimulatedBackend {
    settings: SimulationSettings,
    unlocked: Arc<AtomicBool>,
}

impl SimulatedBackend {
    pub fn new(settings: SimulationSettings) -> Self {
        Self {
            settings,
            unlocked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceBackend for SimulatedBackend {
    fn attach(&self, uri: &str, listener: SignalListener) -> Arc<dyn PlaybackDevice> {
        let fails = self.settings.failing_uris.iter().any(|failing| failing == uri);
        debug!(uri, fails, "Attaching simulated device");
        SimulatedDevice::new(uri, &self.settings, fails, Arc::clone(&self.unlocked), listener)
    }

    async fn unlock(&self) -> Result<()> {
        if self.settings.deny_unlock {
            return Err(PlaybackError::PolicyBlocked);
        }
        // The silent zero-length cycle
        tokio::task::yield_now().await;
        self.unlocked.store(true, Ordering::SeqCst);
        debug!("Simulated backend unlocked");
        Ok(())
    }
}

struct Clock {
    position: f64,
    paused: bool,
    released: bool,
    metadata_sent: bool,
    ticker: Option<JoinHandle<()>>,
}

/// One simulated resource
pub struct SimulatedDevice {
    me: Weak<SimulatedDevice>,
    uri: String,
    duration: f64,
    tick: Duration,
    /// Seconds of audio per tick
    step: f64,
    start_delay: Duration,
    fails: bool,
    require_unlock: bool,
    unlocked: Arc<AtomicBool>,
    listener: SignalListener,
    clock: Mutex<Clock>,
}

impl SimulatedDevice {
    fn new(
        uri: &str,
        settings: &SimulationSettings,
        fails: bool,
        unlocked: Arc<AtomicBool>,
        listener: SignalListener,
    ) -> Arc<Self> {
        let tick = Duration::from_millis(settings.tick_ms);
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            uri: uri.to_string(),
            duration: settings.track_seconds,
            tick,
            step: tick.as_secs_f64() * settings.speed,
            start_delay: Duration::from_millis(settings.start_delay_ms),
            fails,
            require_unlock: settings.require_unlock,
            unlocked,
            listener,
            clock: Mutex::new(Clock {
                position: 0.0,
                paused: true,
                released: false,
                metadata_sent: false,
                ticker: None,
            }),
        })
    }

    fn clock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Never called with the clock locked: the listener may call back into us
    fn emit(&self, signal: DeviceSignal) {
        (self.listener)(signal);
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let me = self.me.clone();
        let tick = self.tick;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(tick).await;
                let Some(device) = me.upgrade() else {
                    break;
                };
                if !device.advance() {
                    break;
                }
            }
        })
    }

    /// Advance the clock one tick; `false` once it should stop
    fn advance(&self) -> bool {
        let (position, ended) = {
            let mut clock = self.clock();
            if clock.released || clock.paused {
                return false;
            }
            clock.position = (clock.position + self.step).min(self.duration);
            let ended = clock.position >= self.duration;
            if ended {
                clock.paused = true;
                clock.ticker = None;
            }
            (clock.position, ended)
        };

        trace!(uri = %self.uri, position, "Tick");
        self.emit(DeviceSignal::TimeUpdated {
            current_time: position,
            duration: self.duration,
        });
        if ended {
            debug!(uri = %self.uri, "Simulated track ended");
            self.emit(DeviceSignal::Ended);
        }
        !ended
    }
}

#[async_trait]
impl PlaybackDevice for SimulatedDevice {
    async fn start(&self) -> Result<()> {
        if self.clock().released {
            return Err(PlaybackError::Cancelled);
        }
        if self.require_unlock && !self.unlocked.load(Ordering::SeqCst) {
            return Err(PlaybackError::PolicyBlocked);
        }

        tokio::time::sleep(self.start_delay).await;

        if self.fails {
            return Err(PlaybackError::resource(format!(
                "failed to load {}",
                self.uri
            )));
        }
        let send_metadata = {
            let mut clock = self.clock();
            if clock.released {
                return Err(PlaybackError::Cancelled);
            }
            !std::mem::replace(&mut clock.metadata_sent, true)
        };
        if send_metadata {
            self.emit(DeviceSignal::DurationKnown(self.duration));
        }

        let mut clock = self.clock();
        if clock.released {
            return Err(PlaybackError::Cancelled);
        }
        if clock.position >= self.duration {
            clock.position = 0.0;
        }
        clock.paused = false;
        if clock.ticker.is_none() {
            clock.ticker = Some(self.spawn_ticker());
        }
        Ok(())
    }

    fn pause(&self) {
        let ticker = {
            let mut clock = self.clock();
            if clock.released {
                return;
            }
            clock.paused = true;
            clock.ticker.take()
        };
        if let Some(ticker) = ticker {
            ticker.abort();
        }
    }

    fn seek(&self, time: f64) {
        let position = {
            let mut clock = self.clock();
            if clock.released {
                return;
            }
            clock.position = clamp_seek(time, Some(self.duration));
            clock.position
        };
        self.emit(DeviceSignal::TimeUpdated {
            current_time: position,
            duration: self.duration,
        });
    }

    fn release(&self) {
        let ticker = {
            let mut clock = self.clock();
            clock.released = true;
            clock.paused = true;
            clock.ticker.take()
        };
        if let Some(ticker) = ticker {
            ticker.abort();
        }
    }

    fn current_time(&self) -> f64 {
        self.clock().position
    }

    fn duration(&self) -> Option<f64> {
        self.clock().metadata_sent.then_some(self.duration)
    }

    fn is_paused(&self) -> bool {
        self.clock().paused
    }
}
