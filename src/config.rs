//! Startup configuration
//!
//! Read once when the process starts and shared with every game instance
//! through an `Arc`. Nothing re-reads it mid-tick.

use std::collections::HashMap;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_MOVEMENT_SPEED, TICKS_PER_SECOND};
use crate::error::ConfigError;

/// Where joining players are placed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode")]
pub enum SpawnMode {
    /// Random valid position, kept away from other players
    #[default]
    Normal,
    /// Random valid position anywhere
    Random,
    /// Random position inside a circle
    Radius { position: Vec2, radius: f32 },
    /// Always the same position
    Fixed { position: Vec2 },
    /// Map center
    Center,
}

/// How the gas behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GasMode {
    #[default]
    Normal,
    /// Deterministic centers and short stage durations
    Debug,
    /// Gas never advances
    Disabled,
}

impl GasMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GasMode::Normal => "Normal",
            GasMode::Debug => "Debug",
            GasMode::Disabled => "Disabled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub mode: GasMode,
    /// Stage duration (seconds) used for every non-terminal stage in debug mode
    pub override_duration: f32,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            mode: GasMode::Normal,
            override_duration: 10.0,
        }
    }
}

/// A privileged role granted by password on join
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RoleConfig {
    pub password: String,
    pub is_dev: bool,
}

/// Process-wide startup parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Map definition id in the catalog
    pub map: String,
    pub max_players: usize,
    /// Players required before the gas starts
    pub min_players_to_start: usize,
    /// Concurrent game instances
    pub max_games: usize,
    pub tps: u32,
    /// Base player speed (units/second)
    pub movement_speed: f32,
    pub spawn: SpawnMode,
    pub gas: GasConfig,
    pub roles: HashMap<String, RoleConfig>,
    /// Fixed seed for every game; derived from the game id when absent
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map: "main".to_string(),
            max_players: 80,
            min_players_to_start: 2,
            max_games: 4,
            tps: TICKS_PER_SECOND,
            movement_speed: DEFAULT_MOVEMENT_SPEED,
            spawn: SpawnMode::Normal,
            gas: GasConfig::default(),
            roles: HashMap::new(),
            seed: None,
        }
    }
}

impl Config {
    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Using default config ({}: {})", path.display(), e);
                Self::default()
            }
        }
    }

    /// Milliseconds between ticks
    pub fn tick_interval_ms(&self) -> u64 {
        1000 / u64::from(self.tps.max(1))
    }

    /// Role whose password matches, if any
    pub fn role_for_password(&self, password: &str) -> Option<&str> {
        self.roles
            .iter()
            .find(|(_, role)| !role.password.is_empty() && role.password == password)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config = Config::from_json(r#"{ "max_players": 10, "gas": { "mode": "Debug" } }"#)
            .expect("valid config");
        assert_eq!(config.max_players, 10);
        assert_eq!(config.gas.mode, GasMode::Debug);
        assert_eq!(config.map, "main");
        assert_eq!(config.tps, TICKS_PER_SECOND);
    }

    #[test]
    fn spawn_mode_parses_tagged() {
        let config =
            Config::from_json(r#"{ "spawn": { "mode": "Fixed", "position": [10.0, 20.0] } }"#)
                .expect("valid config");
        assert_eq!(
            config.spawn,
            SpawnMode::Fixed {
                position: Vec2::new(10.0, 20.0)
            }
        );
    }

    #[test]
    fn role_lookup_ignores_empty_passwords() {
        let mut config = Config::default();
        config.roles.insert(
            "dev".to_string(),
            RoleConfig {
                password: "hunter2".to_string(),
                is_dev: true,
            },
        );
        config.roles.insert("empty".to_string(), RoleConfig::default());
        assert_eq!(config.role_for_password("hunter2"), Some("dev"));
        assert_eq!(config.role_for_password(""), None);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            Config::from_json("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }
}
