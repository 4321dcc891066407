//! Configuration loaded from `openroad.toml`

use crate::RoadCtrl;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid config syntax: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Road engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Road mode used when the game does not ask for one
    pub road_ctrl: RoadCtrl,
    /// Engine ticks per host frame (2 emulates the faster road co-processor)
    pub ticks_per_frame: u8,
    /// Horizon base height used before any height segment sets one
    pub horizon_base: i32,
    /// Run the horizon smoothing pass. Off reproduces the raw profile.
    pub smooth_horizon: bool,
    /// Road width at the start of a stage (integer part)
    pub start_width: i16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            road_ctrl: RoadCtrl::BothPriority0,
            ticks_per_frame: 1,
            horizon_base: 0x240,
            smooth_horizon: true,
            start_width: 0x1C2,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=2).contains(&self.ticks_per_frame) {
            return Err(ConfigError::InvalidValue(format!(
                "ticks_per_frame must be 1 or 2, got {}",
                self.ticks_per_frame
            )));
        }
        if !(0..=0x7FF).contains(&self.horizon_base) {
            return Err(ConfigError::InvalidValue(format!(
                "horizon_base {:#x} out of range",
                self.horizon_base
            )));
        }
        Ok(())
    }
}

/// Application-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    /// Track file loaded when none is given on the command line
    pub track: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            track: None,
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.engine.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.engine.horizon_base, 0x240);
        assert_eq!(config.engine.road_ctrl, RoadCtrl::BothPriority0);
        assert!(config.engine.smooth_horizon);
    }

    #[test]
    fn engine_section_overrides() {
        let config = AppConfig::from_toml_str(
            r#"
            log_level = "debug"
            track = "tracks/demo.toml"

            [engine]
            road_ctrl = "road1_split"
            ticks_per_frame = 2
            smooth_horizon = false
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.road_ctrl, RoadCtrl::Road1Split);
        assert_eq!(config.engine.ticks_per_frame, 2);
        assert!(!config.engine.smooth_horizon);
        assert_eq!(config.track, Some(PathBuf::from("tracks/demo.toml")));
    }

    #[test]
    fn rejects_bad_cadence() {
        let err = AppConfig::from_toml_str("[engine]\nticks_per_frame = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(_)), "got {:?}", err);
    }
}
