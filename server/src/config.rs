//! Simulation tunables.
//!
//! Everything here has a default; a JSON file passed with `--config` may
//! override any subset of the fields.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    /// Monsters with no player this close skip their whole update.
    pub activation_range: i32,
    /// Distance at which a monster drops its roaming and chases a player.
    pub hunt_range: i32,
    /// Radius around the spawn point that wandering destinations are drawn from.
    pub wander_radius: i32,
    /// Ticks a dead monster waits before it can respawn.
    pub revive_delay: u64,
    pub monsters_per_level: usize,
    pub items_per_level: usize,
    pub consumables_per_level: usize,
    /// Random tries before giving up on finding a spawn-safe tile.
    pub spawn_attempts: u32,
    pub heal_amount: i32,
    pub special_ap_cost: i32,
    pub special_cooldown: u64,
    pub blink_range: i32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            activation_range: 20,
            hunt_range: 8,
            wander_radius: 6,
            revive_delay: 300,
            monsters_per_level: 8,
            items_per_level: 6,
            consumables_per_level: 6,
            spawn_attempts: 500,
            heal_amount: 10,
            special_ap_cost: 6,
            special_cooldown: 30,
            blink_range: 6,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = SimConfig::from_json(r#"{"huntRange": 3, "reviveDelay": 10}"#).unwrap();
        assert_eq!(config.hunt_range, 3);
        assert_eq!(config.revive_delay, 10);
        assert_eq!(config.spawn_attempts, 500);
        assert_eq!(config.activation_range, SimConfig::default().activation_range);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(matches!(
            SimConfig::from_json("{huntRange: }"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            SimConfig::load("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
