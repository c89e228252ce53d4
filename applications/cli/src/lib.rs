//! GlobeBeats CLI
//!
//! Headless host for the playback core: loads configuration, builds a trending
//! catalog, and drives a listening session against a simulated audio device.

pub mod config;
pub mod demo;
pub mod error;
pub mod session;
pub mod sim;

pub use error::{CliError, Result};
