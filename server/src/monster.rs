//! Monster kinds and their stat overrides.

use crate::dice::{Dice, GameRng};
use crate::item::{catalog, ItemTemplate};
use crate::stats::{ChannelValues, StatOverrides};
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonsterKind {
    Rat,
    Goblin,
    SkeletonArcher,
    Orc,
    Wraith,
    Drake,
}

pub struct MonsterTemplate {
    pub name: &'static str,
    pub level: u32,
    pub overrides: StatOverrides,
    pub weapons: &'static [ItemTemplate],
    pub gold: Dice,
}

impl MonsterKind {
    pub const ALL: [MonsterKind; 6] = [
        MonsterKind::Rat,
        MonsterKind::Goblin,
        MonsterKind::SkeletonArcher,
        MonsterKind::Orc,
        MonsterKind::Wraith,
        MonsterKind::Drake,
    ];

    pub fn subtype(&self) -> &'static str {
        match self {
            MonsterKind::Rat => "rat",
            MonsterKind::Goblin => "goblin",
            MonsterKind::SkeletonArcher => "skeletonArcher",
            MonsterKind::Orc => "orc",
            MonsterKind::Wraith => "wraith",
            MonsterKind::Drake => "drake",
        }
    }

    pub fn template(&self) -> MonsterTemplate {
        match self {
            MonsterKind::Rat => MonsterTemplate {
                name: "Rat",
                level: 1,
                overrides: StatOverrides {
                    max_hp: Some(6),
                    max_ap: Some(6),
                    ticks_per_move: Some(2),
                    vision: Some(6),
                    search_limit: Some(8),
                    defense_melee: Some(8),
                    defense_ranged: Some(9),
                    defense_magic: Some(8),
                    ..Default::default()
                },
                weapons: &[catalog::CLAWS],
                gold: Dice::new(1, 2),
            },
            MonsterKind::Goblin => MonsterTemplate {
                name: "Goblin",
                level: 2,
                overrides: StatOverrides {
                    max_hp: Some(10),
                    max_ap: Some(8),
                    ticks_per_move: Some(3),
                    search_limit: Some(10),
                    hit: ChannelValues {
                        melee: Some(1),
                        ..Default::default()
                    },
                    defense_melee: Some(10),
                    ..Default::default()
                },
                weapons: &[catalog::RUSTY_BLADE],
                gold: Dice::new(1, 6),
            },
            MonsterKind::SkeletonArcher => MonsterTemplate {
                name: "Skeleton archer",
                level: 3,
                overrides: StatOverrides {
                    max_hp: Some(12),
                    max_ap: Some(10),
                    ticks_per_move: Some(3),
                    hit: ChannelValues {
                        ranged: Some(2),
                        ..Default::default()
                    },
                    defense_ranged: Some(13),
                    defense_magic: Some(9),
                    ..Default::default()
                },
                weapons: &[catalog::SHORTBOW, catalog::CLAWS],
                gold: Dice::new(2, 4),
            },
            MonsterKind::Orc => MonsterTemplate {
                name: "Orc",
                level: 4,
                overrides: StatOverrides {
                    max_hp: Some(20),
                    max_ap: Some(10),
                    ticks_per_move: Some(3),
                    hit: ChannelValues {
                        melee: Some(3),
                        ..Default::default()
                    },
                    damage: ChannelValues {
                        melee: Some(1),
                        ..Default::default()
                    },
                    defense_melee: Some(13),
                    ..Default::default()
                },
                weapons: &[catalog::WAR_AXE],
                gold: Dice::new(2, 6),
            },
            MonsterKind::Wraith => MonsterTemplate {
                name: "Wraith",
                level: 5,
                overrides: StatOverrides {
                    max_hp: Some(22),
                    max_ap: Some(12),
                    ticks_per_move: Some(2),
                    vision: Some(10),
                    hit: ChannelValues {
                        melee_spell: Some(4),
                        ..Default::default()
                    },
                    defense_melee: Some(14),
                    defense_ranged: Some(14),
                    defense_magic: Some(11),
                    ..Default::default()
                },
                weapons: &[catalog::CHILL_TOUCH],
                gold: Dice::new(3, 6),
            },
            MonsterKind::Drake => MonsterTemplate {
                name: "Drake",
                level: 6,
                overrides: StatOverrides {
                    max_hp: Some(34),
                    max_ap: Some(14),
                    ap_regen: Some(2),
                    ticks_per_move: Some(3),
                    vision: Some(10),
                    search_limit: Some(14),
                    hit: ChannelValues {
                        melee: Some(4),
                        ranged_spell: Some(4),
                        ..Default::default()
                    },
                    defense_melee: Some(15),
                    defense_ranged: Some(14),
                    defense_magic: Some(13),
                    ..Default::default()
                },
                weapons: &[catalog::FIRE_BREATH, catalog::BITE],
                gold: Dice::new(4, 8),
            },
        }
    }

    /// Picks a kind for a level at `depth`: kinds up to `depth + 1` are
    /// possible, biased towards the level's own depth.
    pub fn for_depth(depth: u32, rng: &mut GameRng) -> MonsterKind {
        let cap = (depth as usize + 1).clamp(1, Self::ALL.len());
        let floor = (depth as usize).saturating_sub(2).min(cap - 1);
        Self::ALL[rng.gen_range(floor..cap)]
    }
}
