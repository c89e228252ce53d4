//! GlobeBeats - Playback Orchestration
//!
//! Single-instance audio control for the GlobeBeats client.
//!
//! This crate provides:
//! - At most one sounding track at any time (single live device)
//! - Race-free play/pause/seek/stop for any number of UI consumers
//! - Single-flight play requests with duplicate suppression
//! - Unlock-before-play gating for gesture-required autoplay policies
//! - Typed event fan-out (sync handlers and an async broadcast stream)
//! - A reactive binding for pull/observe UIs
//! - The "what plays next" continuation policy with a one-way auto-play latch
//!
//! # Architecture
//!
//! `globebeats-playback` knows nothing about browsers, decoders or networks:
//! - Audio resources are provided via the [`DeviceBackend`] / [`PlaybackDevice`] traits
//! - Trending data is read through `globebeats_core::TrendingSource`
//! - Every other component talks to the [`PlaybackController`] through its public API
//!
//! # Example: Platform Integration
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use globebeats_core::{PlaybackContext, Track};
//! use globebeats_playback::{
//!     DeviceBackend, PlayOptions, PlaybackController, PlaybackDevice, PlayerConfig, Result,
//!     SignalListener,
//! };
//! use std::sync::Arc;
//!
//! struct MyBackend;
//!
//! #[async_trait]
//! impl DeviceBackend for MyBackend {
//!     fn attach(&self, uri: &str, listener: SignalListener) -> Arc<dyn PlaybackDevice> {
//!         // Bind a platform audio element to `uri`, forward its events to `listener`
//!         unimplemented!()
//!     }
//!
//!     async fn unlock(&self) -> Result<()> {
//!         // Play a zero-length silent clip
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() {
//! let controller = PlaybackController::new(Arc::new(MyBackend), PlayerConfig::default());
//! controller.unlock().await;
//!
//! let track = Track::new("Song", "Artist", Some("https://cdn.example/song.m4a"));
//! let outcome = controller
//!     .play(track, PlayOptions::new(PlaybackContext::Trending))
//!     .await;
//! assert!(outcome.is_success());
//! # }
//! ```

mod binding;
mod continuation;
mod controller;
mod device;
mod error;
pub mod events;
mod policy;
pub mod types;

// Public exports
pub use binding::{BindingSnapshot, EndedHandler, LatestHandler, PlayerBinding};
pub use continuation::{Continuation, ContinuationPolicy, Decision};
pub use controller::{shared_controller, PlaybackController};
pub use device::{clamp_seek, DeviceBackend, DeviceSignal, PlaybackDevice, SignalListener};
pub use error::{PlaybackError, Result};
pub use events::{EndedInfo, EventBus, EventKind, PlayerEvent, Subscription};
pub use policy::{PlaybackPolicy, RequestOrigin};
pub use types::{
    ControllerState, InFlightPolicy, PlayOptions, PlayOutcome, PlaybackPhase, PlayerConfig,
};
