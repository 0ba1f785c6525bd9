//! Per-connection change detection for outbound entity state.
//!
//! Every entity a viewer knows about is rendered to a [`ServerMessage`] each
//! tick. The message is encoded with bincode, which gives one canonical byte
//! string per value, and only its hash is kept. A message goes out when the
//! hash differs from the last one sent on that connection.

use crate::utils::EntityId;
use log::warn;
use shared::ServerMessage;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// Hash of the canonical encoding of `message`, or `None` if it could not be
/// encoded.
pub fn content_hash(message: &ServerMessage) -> Option<u64> {
    match bincode::serialize(message) {
        Ok(bytes) => {
            let mut hasher = DefaultHasher::new();
            bytes.hash(&mut hasher);
            Some(hasher.finish())
        }
        Err(e) => {
            warn!("Failed to encode state for change detection: {}", e);
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct Replicator {
    sent: HashMap<EntityId, u64>,
    last_emit_tick: Option<u64>,
}

impl Replicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages for the entries of `frame` that changed since the last call,
    /// followed by `remove` for entities that dropped out of the frame.
    ///
    /// If a tick was skipped since the previous call the cache is dropped
    /// first and the whole frame goes out again.
    pub fn diff(&mut self, tick: u64, frame: Vec<(EntityId, ServerMessage)>) -> Vec<ServerMessage> {
        if let Some(last) = self.last_emit_tick {
            if tick > last + 1 {
                self.sent.clear();
            }
        }
        self.last_emit_tick = Some(tick);

        let mut out = Vec::new();
        let mut present = HashSet::with_capacity(frame.len());
        for (id, message) in frame {
            present.insert(id);
            match content_hash(&message) {
                Some(hash) => {
                    if self.sent.insert(id, hash) != Some(hash) {
                        out.push(message);
                    }
                }
                None => {
                    self.sent.remove(&id);
                    out.push(message);
                }
            }
        }

        let mut gone: Vec<EntityId> = self
            .sent
            .keys()
            .filter(|id| !present.contains(id))
            .copied()
            .collect();
        gone.sort_unstable();
        for id in gone {
            self.sent.remove(&id);
            out.push(ServerMessage::Remove { id });
        }
        out
    }

    /// Forgets what was sent so the next diff repeats everything.
    pub fn forget(&mut self) {
        self.sent.clear();
    }

    /// Drops everything the viewer knew and returns the `remove` messages
    /// that tell it so.
    pub fn change_level(&mut self) -> Vec<ServerMessage> {
        let mut ids: Vec<EntityId> = self.sent.drain().map(|(id, _)| id).collect();
        ids.sort_unstable();
        ids.into_iter().map(|id| ServerMessage::Remove { id }).collect()
    }

    pub fn known(&self) -> usize {
        self.sent.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ConsumableView, ItemMajor, ItemView};

    fn potion(id: EntityId, gone: bool) -> (EntityId, ServerMessage) {
        (
            id,
            ServerMessage::Consumable(ConsumableView {
                id,
                subtype: "healthPotion".to_string(),
                x: 2,
                y: 3,
                magnitude: 8,
                gone,
            }),
        )
    }

    fn sword(id: EntityId, x: i32) -> (EntityId, ServerMessage) {
        (
            id,
            ServerMessage::Item(ItemView {
                id,
                major: ItemMajor::MeleeWeapon,
                subtype: "longsword".to_string(),
                x,
                y: 1,
                description: "Longsword (1d8)".to_string(),
                gone: false,
            }),
        )
    }

    #[test]
    fn test_unchanged_state_emits_nothing_second_time() {
        let mut replicator = Replicator::new();
        let first = replicator.diff(1, vec![potion(1, false), sword(2, 4)]);
        assert_eq!(first.len(), 2);
        let second = replicator.diff(2, vec![potion(1, false), sword(2, 4)]);
        assert!(second.is_empty());
    }

    #[test]
    fn test_changed_entity_is_resent() {
        let mut replicator = Replicator::new();
        replicator.diff(1, vec![potion(1, false), sword(2, 4)]);
        let out = replicator.diff(2, vec![potion(1, true), sword(2, 4)]);
        assert_eq!(out, vec![potion(1, true).1]);
    }

    #[test]
    fn test_missing_entity_is_removed() {
        let mut replicator = Replicator::new();
        replicator.diff(1, vec![potion(1, false), sword(2, 4)]);
        let out = replicator.diff(2, vec![sword(2, 4)]);
        assert_eq!(out, vec![ServerMessage::Remove { id: 1 }]);
        assert_eq!(replicator.known(), 1);
    }

    #[test]
    fn test_gap_forces_resync() {
        let mut replicator = Replicator::new();
        replicator.diff(1, vec![sword(2, 4)]);
        assert!(replicator.diff(2, vec![sword(2, 4)]).is_empty());
        let out = replicator.diff(4, vec![sword(2, 4)]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_forget_and_change_level() {
        let mut replicator = Replicator::new();
        replicator.diff(1, vec![sword(5, 1), potion(3, false)]);
        replicator.forget();
        assert_eq!(replicator.diff(2, vec![sword(5, 1), potion(3, false)]).len(), 2);

        let removes = replicator.change_level();
        assert_eq!(
            removes,
            vec![ServerMessage::Remove { id: 3 }, ServerMessage::Remove { id: 5 }]
        );
        assert_eq!(replicator.known(), 0);
    }

    #[test]
    fn test_hash_depends_on_content() {
        assert_eq!(content_hash(&sword(1, 1).1), content_hash(&sword(1, 1).1));
        assert_ne!(content_hash(&sword(1, 1).1), content_hash(&sword(1, 2).1));
    }
}
