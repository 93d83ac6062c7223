//! Simulation settings
//!
//! Tunable constants for the beam engine. Loaded from JSON; any field missing
//! from the file falls back to the defaults in [`crate::consts`].

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::sim::Layer;

/// Errors raised while loading settings or scene files
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A value parsed but makes no sense (negative speed, zero cap, ...)
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "io error: {e}"),
            ConfigError::Json(e) => write!(f, "json error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Beam engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Propagation ===
    /// Front/tail speed in units per second
    pub speed: f32,
    /// Layers a beam collides with
    pub collision_mask: Layer,

    // === Population ===
    /// Live beam cap
    pub max_beams: usize,
    /// Intensity for beams created without a template
    pub default_intensity: u32,

    // === Tolerances ===
    /// Hit point/normal match tolerance
    pub match_tolerance: f32,
    /// Minimum length of a split remnant
    pub min_split_remainder: f32,
    /// Step past the hit point for the far-side probe
    pub other_side_epsilon: f32,
    /// Far-side probe distance
    pub other_side_probe: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            speed: BEAM_SPEED,
            collision_mask: Layer::TILE | Layer::WALL,

            max_beams: MAX_BEAMS,
            default_intensity: DEFAULT_INTENSITY,

            match_tolerance: MATCH_TOLERANCE,
            min_split_remainder: MIN_SPLIT_REMAINDER,
            other_side_epsilon: OTHER_SIDE_EPSILON,
            other_side_probe: OTHER_SIDE_PROBE,
        }
    }
}

impl Settings {
    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Serialize settings to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(ConfigError::Invalid(format!("speed must be positive, got {}", self.speed)));
        }
        if self.max_beams == 0 {
            return Err(ConfigError::Invalid("max_beams must be at least 1".into()));
        }
        if self.match_tolerance < 0.0 || self.min_split_remainder < 0.0 || self.other_side_epsilon < 0.0 {
            return Err(ConfigError::Invalid("tolerances must not be negative".into()));
        }
        if self.other_side_probe <= self.other_side_epsilon {
            return Err(ConfigError::Invalid(
                "other_side_probe must exceed other_side_epsilon".into(),
            ));
        }
        Ok(())
    }

    /// Distance the beam front travels in `dt` seconds
    #[inline]
    pub fn step_length(&self, dt: f32) -> f32 {
        dt.max(0.0) * self.speed
    }
}
