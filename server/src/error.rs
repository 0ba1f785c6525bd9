//! Error taxonomy for the simulation core.
//!
//! Expected outcomes (unreachable destinations, misses, empty pickups,
//! commands for unknown connections) are not errors and never appear here.

use crate::utils::{EntityId, LevelId};
use shared::Channel;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    /// An attack was resolved on a channel the attacker has nothing equipped
    /// for. The action phase gates on equipment, so this is an upstream bug.
    #[error("entity {entity} attacked on {channel:?} without anything equipped for it")]
    MissingWeapon { entity: EntityId, channel: Channel },

    #[error("no empty tile found on level {level} after {attempts} attempts")]
    NoEmptyTile { level: LevelId, attempts: u32 },

    #[error("level {0} does not exist")]
    UnknownLevel(LevelId),

    #[error("invalid level map at line {line}: {reason}")]
    MapParse { line: usize, reason: String },
}
