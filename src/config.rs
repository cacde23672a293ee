use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;
use crate::geometry::LayoutMode;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub animation: AnimationConfig,
    pub layout: LayoutConfig,
}

/// Collapse/expand timing, seconds for a full 0 to 1 sweep
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationConfig {
    pub disc_duration: f64,
    pub map_duration: f64,
    pub tree_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutConfig {
    /// Mode the landscape starts in
    pub mode: LayoutMode,
}

impl AnimationConfig {
    pub fn colexp_duration(&self, mode: LayoutMode) -> f64 {
        match mode {
            LayoutMode::Disc => self.disc_duration,
            LayoutMode::Map => self.map_duration,
            LayoutMode::Tree => self.tree_duration,
        }
    }
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            disc_duration: 0.75,
            map_duration: 0.5,
            tree_duration: 1.0,
        }
    }
}

// ── Serde intermediate structs ───────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    animation: RawAnimationConfig,
    layout: RawLayoutConfig,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawAnimationConfig {
    disc_duration: f64,
    map_duration: f64,
    tree_duration: f64,
}

impl Default for RawAnimationConfig {
    fn default() -> Self {
        let defaults = AnimationConfig::default();
        Self {
            disc_duration: defaults.disc_duration,
            map_duration: defaults.map_duration,
            tree_duration: defaults.tree_duration,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawLayoutConfig {
    mode: LayoutMode,
}

impl Config {
    /// Load config from a TOML file path. Returns defaults if file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Parse a TOML string into a Config.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let config = Self {
            animation: AnimationConfig {
                disc_duration: raw.animation.disc_duration,
                map_duration: raw.animation.map_duration,
                tree_duration: raw.animation.tree_duration,
            },
            layout: LayoutConfig {
                mode: raw.layout.mode,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for mode in LayoutMode::ALL {
            let duration = self.animation.colexp_duration(mode);
            if !(duration.is_finite() && duration > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "{mode} duration must be > 0 (got {duration})"
                )));
            }
        }
        Ok(())
    }
}
