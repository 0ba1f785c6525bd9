//! Stat tables and the override chain that builds an actor's numbers.
//!
//! A player's stats are `base → race → profession → per-level deltas`; a
//! monster's are `base → monster kind`. Overrides replace values, deltas add
//! to them. Both are applied by [`merge`], a pure function.

use serde::{Deserialize, Serialize};
use shared::{Channel, Defenses, Profession, Race};

/// One value per attack channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelValues<T> {
    pub melee: T,
    pub ranged: T,
    pub melee_spell: T,
    pub ranged_spell: T,
}

impl<T: Copy> ChannelValues<T> {
    pub const fn splat(value: T) -> Self {
        Self {
            melee: value,
            ranged: value,
            melee_spell: value,
            ranged_spell: value,
        }
    }

    pub fn get(&self, channel: Channel) -> T {
        match channel {
            Channel::Melee => self.melee,
            Channel::Ranged => self.ranged,
            Channel::MeleeSpell => self.melee_spell,
            Channel::RangedSpell => self.ranged_spell,
        }
    }

    pub fn set(&mut self, channel: Channel, value: T) {
        match channel {
            Channel::Melee => self.melee = value,
            Channel::Ranged => self.ranged = value,
            Channel::MeleeSpell => self.melee_spell = value,
            Channel::RangedSpell => self.ranged_spell = value,
        }
    }
}

impl ChannelValues<i32> {
    fn plus(&self, other: &Self) -> Self {
        Self {
            melee: self.melee + other.melee,
            ranged: self.ranged + other.ranged,
            melee_spell: self.melee_spell + other.melee_spell,
            ranged_spell: self.ranged_spell + other.ranged_spell,
        }
    }
}

/// Resolved numbers for one actor, before equipment bonuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub max_hp: i32,
    pub max_ap: i32,
    pub ap_regen: i32,
    pub ticks_per_move: u64,
    pub move_cost: i32,
    pub vision: i32,
    pub search_limit: i32,
    pub hit: ChannelValues<i32>,
    pub damage: ChannelValues<i32>,
    pub defense: Defenses,
    pub invisible_hit: i32,
    pub invisible_damage: i32,
}

pub const BASE_STATS: Stats = Stats {
    max_hp: 20,
    max_ap: 10,
    ap_regen: 1,
    ticks_per_move: 2,
    move_cost: 1,
    vision: 8,
    search_limit: 12,
    hit: ChannelValues::splat(0),
    damage: ChannelValues::splat(0),
    defense: Defenses {
        melee: 10,
        ranged: 10,
        magic: 10,
    },
    invisible_hit: 4,
    invisible_damage: 2,
};

/// Values that replace whatever came before them in the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatOverrides {
    pub max_hp: Option<i32>,
    pub max_ap: Option<i32>,
    pub ap_regen: Option<i32>,
    pub ticks_per_move: Option<u64>,
    pub vision: Option<i32>,
    pub search_limit: Option<i32>,
    pub hit: ChannelValues<Option<i32>>,
    pub damage: ChannelValues<Option<i32>>,
    pub defense_melee: Option<i32>,
    pub defense_ranged: Option<i32>,
    pub defense_magic: Option<i32>,
    pub invisible_hit: Option<i32>,
    pub invisible_damage: Option<i32>,
}

impl StatOverrides {
    pub fn apply(&self, stats: &Stats) -> Stats {
        let mut next = stats.clone();
        next.max_hp = self.max_hp.unwrap_or(next.max_hp);
        next.max_ap = self.max_ap.unwrap_or(next.max_ap);
        next.ap_regen = self.ap_regen.unwrap_or(next.ap_regen);
        next.ticks_per_move = self.ticks_per_move.unwrap_or(next.ticks_per_move);
        next.vision = self.vision.unwrap_or(next.vision);
        next.search_limit = self.search_limit.unwrap_or(next.search_limit);
        for channel in Channel::ALL {
            if let Some(hit) = self.hit.get(channel) {
                next.hit.set(channel, hit);
            }
            if let Some(damage) = self.damage.get(channel) {
                next.damage.set(channel, damage);
            }
        }
        next.defense.melee = self.defense_melee.unwrap_or(next.defense.melee);
        next.defense.ranged = self.defense_ranged.unwrap_or(next.defense.ranged);
        next.defense.magic = self.defense_magic.unwrap_or(next.defense.magic);
        next.invisible_hit = self.invisible_hit.unwrap_or(next.invisible_hit);
        next.invisible_damage = self.invisible_damage.unwrap_or(next.invisible_damage);
        next
    }
}

/// Values added on top of the chain, once per level gained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatDelta {
    pub max_hp: i32,
    pub max_ap: i32,
    pub hit: ChannelValues<i32>,
    pub damage: ChannelValues<i32>,
    pub defense: Defenses,
}

impl StatDelta {
    pub fn apply(&self, stats: &Stats) -> Stats {
        let mut next = stats.clone();
        next.max_hp += self.max_hp;
        next.max_ap += self.max_ap;
        next.hit = next.hit.plus(&self.hit);
        next.damage = next.damage.plus(&self.damage);
        next.defense = next.defense.plus(&self.defense);
        next
    }
}

pub fn merge(base: &Stats, overrides: &[&StatOverrides], deltas: &[&StatDelta]) -> Stats {
    let overridden = overrides
        .iter()
        .fold(base.clone(), |stats, layer| layer.apply(&stats));
    deltas
        .iter()
        .fold(overridden, |stats, delta| delta.apply(&stats))
}

pub fn race_overrides(race: Race) -> StatOverrides {
    match race {
        Race::Human => StatOverrides {
            max_ap: Some(12),
            ..Default::default()
        },
        Race::Elf => StatOverrides {
            vision: Some(10),
            defense_ranged: Some(12),
            defense_magic: Some(11),
            ..Default::default()
        },
        Race::Dwarf => StatOverrides {
            max_hp: Some(26),
            ticks_per_move: Some(3),
            defense_melee: Some(11),
            ..Default::default()
        },
    }
}

pub fn profession_overrides(profession: Profession) -> StatOverrides {
    match profession {
        Profession::Fighter => StatOverrides {
            hit: ChannelValues {
                melee: Some(3),
                ..Default::default()
            },
            damage: ChannelValues {
                melee: Some(2),
                ..Default::default()
            },
            defense_melee: Some(13),
            ..Default::default()
        },
        Profession::Rogue => StatOverrides {
            ticks_per_move: Some(1),
            hit: ChannelValues {
                ranged: Some(2),
                ..Default::default()
            },
            invisible_hit: Some(6),
            invisible_damage: Some(4),
            ..Default::default()
        },
        Profession::Mage => StatOverrides {
            hit: ChannelValues {
                ranged_spell: Some(3),
                ..Default::default()
            },
            damage: ChannelValues {
                ranged_spell: Some(2),
                ..Default::default()
            },
            defense_magic: Some(14),
            ..Default::default()
        },
        Profession::Cleric => StatOverrides {
            max_ap: Some(14),
            hit: ChannelValues {
                melee_spell: Some(2),
                ..Default::default()
            },
            defense_magic: Some(13),
            ..Default::default()
        },
    }
}

pub fn profession_level_delta(profession: Profession) -> StatDelta {
    match profession {
        Profession::Fighter => StatDelta {
            max_hp: 6,
            hit: ChannelValues {
                melee: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        Profession::Rogue => StatDelta {
            max_hp: 4,
            hit: ChannelValues {
                ranged: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        Profession::Mage => StatDelta {
            max_hp: 3,
            max_ap: 1,
            hit: ChannelValues {
                ranged_spell: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        Profession::Cleric => StatDelta {
            max_hp: 4,
            hit: ChannelValues {
                melee_spell: 1,
                ..Default::default()
            },
            defense: Defenses {
                magic: 1,
                ..Default::default()
            },
            ..Default::default()
        },
    }
}

pub fn player_stats(race: Race, profession: Profession, level: u32) -> Stats {
    let race_layer = race_overrides(race);
    let profession_layer = profession_overrides(profession);
    let delta = profession_level_delta(profession);
    let deltas: Vec<&StatDelta> = (1..level.max(1)).map(|_| &delta).collect();
    merge(&BASE_STATS, &[&race_layer, &profession_layer], &deltas)
}

/// Action-point cost and timing of one attack channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRules {
    pub ap_cost: i32,
    /// Ticks between two attacks on this channel.
    pub cooldown: u64,
    /// Ticks after an attack during which the attacker neither moves nor
    /// attacks again.
    pub pause: u64,
}

pub fn channel_rules(channel: Channel) -> ChannelRules {
    match channel {
        Channel::Melee => ChannelRules {
            ap_cost: 3,
            cooldown: 4,
            pause: 2,
        },
        Channel::Ranged => ChannelRules {
            ap_cost: 4,
            cooldown: 6,
            pause: 3,
        },
        Channel::MeleeSpell => ChannelRules {
            ap_cost: 5,
            cooldown: 6,
            pause: 3,
        },
        Channel::RangedSpell => ChannelRules {
            ap_cost: 6,
            cooldown: 8,
            pause: 4,
        },
    }
}

pub const MAX_LEVEL: u32 = 10;

// XP needed to leave each level; index 0 is unused.
const XP_TO_NEXT: [u32; MAX_LEVEL as usize] = [0, 20, 50, 100, 180, 300, 480, 720, 1050, 1500];

/// Total XP at which a character of `level` advances. Saturates at the cap.
pub fn xp_to_next(level: u32) -> u32 {
    XP_TO_NEXT
        .get(level as usize)
        .copied()
        .filter(|_| level > 0)
        .unwrap_or(u32::MAX)
}
