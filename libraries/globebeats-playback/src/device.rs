//! Platform-agnostic playback device traits
//!
//! Abstracts the one playable resource (an `<audio>` element in the browser, a
//! simulated clock in tests and in the CLI) behind a fixed signal vocabulary.

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Low-level lifecycle signals a device reports
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceSignal {
    /// Playback became audible
    Started,

    /// Playback paused (by the controller or natively)
    Paused,

    /// Reached the end of the resource
    Ended,

    /// Playback position advanced (seconds)
    TimeUpdated { current_time: f64, duration: f64 },

    /// Resource metadata loaded (seconds)
    DurationKnown(f64),

    /// Resource failed after attach
    Failed(PlaybackError),
}

/// Callback a device invokes for every signal
///
/// Devices may call it from any thread, but never while the caller of a device
/// method is expected to hold a lock: the controller never calls device methods
/// with its state locked.
pub type SignalListener = Arc<dyn Fn(DeviceSignal) + Send + Sync>;

/// One playable resource bound to one URI
///
/// After `release()` every method is a no-op: `start()` resolves to
/// `Err(PlaybackError::Cancelled)`, queries return their idle values.
#[async_trait]
pub trait PlaybackDevice: Send + Sync {
    /// Request playback
    ///
    /// # Returns
    /// * `Ok(())` - Audible playback started
    /// * `Err(PolicyBlocked)` - Gesture/autoplay policy refused
    /// * `Err(Resource(_))` - The resource errored before audible start
    async fn start(&self) -> Result<()>;

    /// Pause playback (keeps the resource)
    fn pause(&self);

    /// Seek, clamped with [`clamp_seek`]
    fn seek(&self, time: f64);

    /// Stop and free the resource
    fn release(&self);

    /// Current position in seconds
    fn current_time(&self) -> f64;

    /// Total duration in seconds, once known
    fn duration(&self) -> Option<f64>;

    /// Whether the device reports a paused (or never-started) state
    fn is_paused(&self) -> bool;
}

/// Factory for devices plus the platform's one-off unlock primitive
#[async_trait]
pub trait DeviceBackend: Send + Sync {
    /// Allocate a fresh device bound to `uri`; does not start playback
    fn attach(&self, uri: &str, listener: SignalListener) -> Arc<dyn PlaybackDevice>;

    /// Run one silent, zero-length playback cycle to satisfy autoplay policy
    async fn unlock(&self) -> Result<()>;
}

/// Clamp a seek target to `[0, duration]`
///
/// An unknown duration clamps only at zero. Non-finite targets go to zero.
pub fn clamp_seek(time: f64, duration: Option<f64>) -> f64 {
    if !time.is_finite() {
        return 0.0;
    }
    let upper = duration
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(f64::INFINITY);
    time.clamp(0.0, upper)
}
