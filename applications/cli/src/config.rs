/// CLI configuration
use crate::error::{CliError, Result};
use globebeats_playback::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `GLOBEBEATS_PLAYER__AUTO_PLAY=false`
pub const ENV_PREFIX: &str = "GLOBEBEATS";

/// Read from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "globebeats.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub simulation: SimulationSettings,
}

/// Behaviour of the simulated audio device
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Length of every simulated preview, in seconds
    #[serde(default = "default_track_seconds")]
    pub track_seconds: f64,

    /// Interval between position updates
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Playback speed multiplier (2.0 plays a 30 s preview in 15 s)
    #[serde(default = "default_speed")]
    pub speed: f64,

    /// Simulated buffering before a start resolves
    #[serde(default = "default_start_delay_ms")]
    pub start_delay_ms: u64,

    /// Refuse to start until the backend has been unlocked
    #[serde(default = "default_require_unlock")]
    pub require_unlock: bool,

    /// Make every unlock attempt fail, as if no user gesture was available
    #[serde(default)]
    pub deny_unlock: bool,

    /// URIs whose start fails with a resource error
    #[serde(default)]
    pub failing_uris: Vec<String>,
}

impl CliConfig {
    /// Load configuration from file and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, None)
    }

    /// Load with an explicit environment map instead of the process environment
    pub fn load_with(
        path: Option<&Path>,
        environment: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(CliError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (GLOBEBEATS_SECTION__KEY)
        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("simulation.failing_uris")
                .try_parsing(true)
                .source(environment),
        );

        let config = settings
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.player
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;

        let sim = &self.simulation;
        if !sim.track_seconds.is_finite() || sim.track_seconds <= 0.0 {
            return Err(CliError::Config(
                "simulation.track_seconds must be a positive number".to_string(),
            ));
        }
        if sim.tick_ms == 0 {
            return Err(CliError::Config(
                "simulation.tick_ms must be positive".to_string(),
            ));
        }
        if !sim.speed.is_finite() || sim.speed <= 0.0 {
            return Err(CliError::Config(
                "simulation.speed must be a positive number".to_string(),
            ));
        }

        Ok(())
    }

    /// Effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))
    }
}

// Default values
fn default_track_seconds() -> f64 {
    30.0
}

fn default_tick_ms() -> u64 {
    250
}

fn default_speed() -> f64 {
    1.0
}

fn default_start_delay_ms() -> u64 {
    120
}

fn default_require_unlock() -> bool {
    true
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            track_seconds: default_track_seconds(),
            tick_ms: default_tick_ms(),
            speed: default_speed(),
            start_delay_ms: default_start_delay_ms(),
            require_unlock: default_require_unlock(),
            deny_unlock: false,
            failing_uris: Vec::new(),
        }
    }
}
