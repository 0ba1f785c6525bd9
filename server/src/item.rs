//! Equipment, consumables and the loot that lies on level tiles.

use crate::dice::{Dice, GameRng};
use crate::utils::{EntityId, IdAllocator};
use rand::Rng;
use shared::{Channel, ConsumableView, Defenses, ItemMajor, ItemView, Profession, WeaponView};

/// Static description of an item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemTemplate {
    pub major: ItemMajor,
    pub subtype: &'static str,
    pub name: &'static str,
    pub damage: Dice,
    pub range: i32,
    pub min_range: i32,
    pub hit_bonus: i32,
    pub damage_bonus: i32,
    pub defense: Defenses,
}

const fn weapon(
    major: ItemMajor,
    subtype: &'static str,
    name: &'static str,
    damage: Dice,
    range: i32,
    min_range: i32,
) -> ItemTemplate {
    ItemTemplate {
        major,
        subtype,
        name,
        damage,
        range,
        min_range,
        hit_bonus: 0,
        damage_bonus: 0,
        defense: Defenses {
            melee: 0,
            ranged: 0,
            magic: 0,
        },
    }
}

const fn armor(subtype: &'static str, name: &'static str, melee: i32, ranged: i32, magic: i32) -> ItemTemplate {
    ItemTemplate {
        major: ItemMajor::Armor,
        subtype,
        name,
        damage: Dice::NONE,
        range: 0,
        min_range: 0,
        hit_bonus: 0,
        damage_bonus: 0,
        defense: Defenses {
            melee,
            ranged,
            magic,
        },
    }
}

pub mod catalog {
    use super::{armor, weapon, ItemTemplate};
    use crate::dice::Dice;
    use shared::ItemMajor::*;

    pub const DAGGER: ItemTemplate = weapon(MeleeWeapon, "dagger", "Dagger", Dice::new(1, 4), 1, 0);
    pub const MACE: ItemTemplate = weapon(MeleeWeapon, "mace", "Mace", Dice::new(1, 6), 1, 0);
    pub const LONGSWORD: ItemTemplate = weapon(MeleeWeapon, "longsword", "Longsword", Dice::new(1, 8), 1, 0);
    pub const STAFF: ItemTemplate = weapon(MeleeWeapon, "staff", "Quarterstaff", Dice::new(1, 4), 1, 0);
    pub const WAR_AXE: ItemTemplate = weapon(MeleeWeapon, "axe", "War axe", Dice::new(1, 10), 1, 0);
    pub const CLAWS: ItemTemplate = weapon(MeleeWeapon, "claws", "Claws", Dice::new(1, 3), 1, 0);
    pub const RUSTY_BLADE: ItemTemplate = weapon(MeleeWeapon, "shortsword", "Rusty blade", Dice::new(1, 6), 1, 0);
    pub const BITE: ItemTemplate = weapon(MeleeWeapon, "bite", "Bite", Dice::new(2, 6), 1, 0);

    pub const SHORTBOW: ItemTemplate = weapon(RangedWeapon, "shortbow", "Shortbow", Dice::new(1, 6), 6, 2);
    pub const LONGBOW: ItemTemplate = weapon(RangedWeapon, "longbow", "Longbow", Dice::new(1, 8), 8, 2);
    pub const SLING: ItemTemplate = weapon(RangedWeapon, "sling", "Sling", Dice::new(1, 4), 5, 1);

    pub const SPIRIT_TOUCH: ItemTemplate =
        weapon(MeleeSpell, "spiritTouch", "Spirit touch", Dice::new(1, 8), 1, 0);
    pub const CHILL_TOUCH: ItemTemplate =
        weapon(MeleeSpell, "chillTouch", "Chill touch", Dice::new(2, 6), 1, 0);

    pub const MAGIC_MISSILE: ItemTemplate =
        weapon(RangedSpell, "magicMissile", "Magic missile", Dice::new(1, 6), 7, 1);
    pub const FIRE_BOLT: ItemTemplate = weapon(RangedSpell, "fireBolt", "Fire bolt", Dice::new(2, 6), 7, 2);
    pub const FIRE_BREATH: ItemTemplate =
        weapon(RangedSpell, "fireBreath", "Fire breath", Dice::new(2, 8), 5, 1);

    pub const LEATHER: ItemTemplate = armor("leather", "Leather armor", 1, 1, 0);
    pub const ROBE: ItemTemplate = armor("robe", "Woven robe", 0, 0, 2);
    pub const SCALE: ItemTemplate = armor("scale", "Scale mail", 2, 1, 1);
    pub const CHAIN: ItemTemplate = armor("chain", "Chain mail", 3, 2, 0);

    /// Items that can be found lying around, from common to rare.
    pub const FLOOR_LOOT: [ItemTemplate; 11] = [
        DAGGER, MACE, SLING, LEATHER, LONGSWORD, SHORTBOW, ROBE, SCALE, SPIRIT_TOUCH, LONGBOW, FIRE_BOLT,
    ];
}

/// A concrete piece of equipment with its own id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: EntityId,
    pub major: ItemMajor,
    pub subtype: String,
    pub name: String,
    pub damage: Dice,
    pub range: i32,
    pub min_range: i32,
    pub hit_bonus: i32,
    pub damage_bonus: i32,
    pub defense: Defenses,
}

impl Item {
    pub fn from_template(id: EntityId, template: &ItemTemplate) -> Self {
        Self {
            id,
            major: template.major,
            subtype: template.subtype.to_string(),
            name: template.name.to_string(),
            damage: template.damage,
            range: template.range,
            min_range: template.min_range,
            hit_bonus: template.hit_bonus,
            damage_bonus: template.damage_bonus,
            defense: template.defense,
        }
    }

    /// Rolls an enchantment of up to `max_bonus` onto a fresh item.
    pub fn enchanted(mut self, rng: &mut GameRng, max_bonus: i32) -> Self {
        if max_bonus <= 0 {
            return self;
        }
        let bonus = rng.gen_range(0..=max_bonus);
        if self.major == ItemMajor::Armor {
            self.defense.melee += bonus;
        } else {
            self.hit_bonus += bonus;
            self.damage_bonus += bonus / 2;
        }
        self
    }

    pub fn description(&self) -> String {
        match self.major.channel() {
            Some(channel) => {
                let mut text = format!("{} ({}", self.name, self.damage);
                if self.hit_bonus != 0 {
                    text.push_str(&format!(", {:+} hit", self.hit_bonus));
                }
                if self.damage_bonus != 0 {
                    text.push_str(&format!(", {:+} dmg", self.damage_bonus));
                }
                if !channel.is_melee() {
                    text.push_str(&format!(", range {}", self.range));
                }
                text.push(')');
                text
            }
            None => format!(
                "{} (def {}/{}/{})",
                self.name, self.defense.melee, self.defense.ranged, self.defense.magic
            ),
        }
    }

    pub fn weapon_view(&self, channel: Channel) -> WeaponView {
        WeaponView {
            channel,
            name: self.name.clone(),
            damage: self.damage.to_string(),
            range: self.range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumableKind {
    HealthPotion,
    ActionPotion,
}

impl ConsumableKind {
    pub fn subtype(&self) -> &'static str {
        match self {
            ConsumableKind::HealthPotion => "healthPotion",
            ConsumableKind::ActionPotion => "actionPotion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumable {
    pub id: EntityId,
    pub kind: ConsumableKind,
    pub magnitude: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loot {
    Item(Item),
    Consumable(Consumable),
}

impl Loot {
    pub fn id(&self) -> EntityId {
        match self {
            Loot::Item(item) => item.id,
            Loot::Consumable(consumable) => consumable.id,
        }
    }
}

/// Loot on a level tile. A used consumable stays for one more broadcast with
/// `gone` set so clients learn it was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placed {
    pub loot: Loot,
    pub gone: bool,
}

impl Placed {
    pub fn new(loot: Loot) -> Self {
        Self { loot, gone: false }
    }

    pub fn consumable_view(&self, x: i32, y: i32) -> Option<ConsumableView> {
        match &self.loot {
            Loot::Consumable(consumable) => Some(ConsumableView {
                id: consumable.id,
                subtype: consumable.kind.subtype().to_string(),
                x,
                y,
                magnitude: consumable.magnitude,
                gone: self.gone,
            }),
            Loot::Item(_) => None,
        }
    }

    pub fn item_view(&self, x: i32, y: i32) -> Option<ItemView> {
        match &self.loot {
            Loot::Item(item) => Some(ItemView {
                id: item.id,
                major: item.major,
                subtype: item.subtype.clone(),
                x,
                y,
                description: item.description(),
                gone: self.gone,
            }),
            Loot::Consumable(_) => None,
        }
    }
}

/// One slot per item major type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Equipment {
    melee: Option<Item>,
    ranged: Option<Item>,
    melee_spell: Option<Item>,
    ranged_spell: Option<Item>,
    armor: Option<Item>,
}

impl Equipment {
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let mut equipment = Self::default();
        for item in items {
            equipment.equip(item);
        }
        equipment
    }

    fn slot_mut(&mut self, major: ItemMajor) -> &mut Option<Item> {
        match major {
            ItemMajor::MeleeWeapon => &mut self.melee,
            ItemMajor::RangedWeapon => &mut self.ranged,
            ItemMajor::MeleeSpell => &mut self.melee_spell,
            ItemMajor::RangedSpell => &mut self.ranged_spell,
            ItemMajor::Armor => &mut self.armor,
        }
    }

    /// Puts `item` in its slot and hands back whatever was there.
    pub fn equip(&mut self, item: Item) -> Option<Item> {
        self.slot_mut(item.major).replace(item)
    }

    pub fn weapon(&self, channel: Channel) -> Option<&Item> {
        match channel {
            Channel::Melee => self.melee.as_ref(),
            Channel::Ranged => self.ranged.as_ref(),
            Channel::MeleeSpell => self.melee_spell.as_ref(),
            Channel::RangedSpell => self.ranged_spell.as_ref(),
        }
    }

    pub fn armor(&self) -> Option<&Item> {
        self.armor.as_ref()
    }

    fn items(&self) -> impl Iterator<Item = &Item> {
        [
            &self.melee,
            &self.ranged,
            &self.melee_spell,
            &self.ranged_spell,
            &self.armor,
        ]
        .into_iter()
        .flatten()
    }

    pub fn hit_bonus(&self, channel: Channel) -> i32 {
        self.items()
            .filter(|item| item.major.channel() == Some(channel))
            .map(|item| item.hit_bonus)
            .sum()
    }

    pub fn damage_bonus(&self, channel: Channel) -> i32 {
        self.items()
            .filter(|item| item.major.channel() == Some(channel))
            .map(|item| item.damage_bonus)
            .sum()
    }

    pub fn defense(&self) -> Defenses {
        self.items()
            .fold(Defenses::default(), |total, item| total.plus(&item.defense))
    }

    pub fn weapon_views(&self) -> Vec<WeaponView> {
        Channel::ALL
            .iter()
            .filter_map(|channel| self.weapon(*channel).map(|item| item.weapon_view(*channel)))
            .collect()
    }
}

pub fn starting_kit(profession: Profession, ids: &mut IdAllocator) -> Equipment {
    use catalog::*;
    let templates: &[ItemTemplate] = match profession {
        Profession::Fighter => &[LONGSWORD, SHORTBOW, CHAIN],
        Profession::Rogue => &[DAGGER, LONGBOW, LEATHER],
        Profession::Mage => &[STAFF, MAGIC_MISSILE, ROBE],
        Profession::Cleric => &[MACE, SPIRIT_TOUCH, SCALE],
    };
    Equipment::with_items(
        templates
            .iter()
            .map(|template| Item::from_template(ids.allocate(), template)),
    )
}

/// Rolls a random piece of floor loot. Deeper levels roll rarer items and
/// stronger potions.
pub fn random_loot(rng: &mut GameRng, ids: &mut IdAllocator, depth: u32, consumable_chance: f64) -> Loot {
    let id = ids.allocate();
    if rng.gen_bool(consumable_chance.clamp(0.0, 1.0)) {
        let kind = if rng.gen_bool(0.6) {
            ConsumableKind::HealthPotion
        } else {
            ConsumableKind::ActionPotion
        };
        let base = match kind {
            ConsumableKind::HealthPotion => 8,
            ConsumableKind::ActionPotion => 6,
        };
        return Loot::Consumable(Consumable {
            id,
            kind,
            magnitude: base + 2 * depth as i32,
        });
    }

    let pool = &catalog::FLOOR_LOOT;
    let reach = ((depth as usize + 1) * 3).min(pool.len());
    let template = &pool[rng.gen_range(0..reach)];
    Loot::Item(Item::from_template(id, template).enchanted(rng, depth as i32 - 1))
}
