use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
/// Largest payload that fits in a single UDP datagram.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

pub const WALL_GLYPH: char = '#';
pub const FLOOR_GLYPH: char = '.';
pub const UP_STAIRS_GLYPH: char = '<';
pub const DOWN_STAIRS_GLYPH: char = '>';

/// One of the four independent attack channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Melee,
    Ranged,
    MeleeSpell,
    RangedSpell,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Melee,
        Channel::Ranged,
        Channel::MeleeSpell,
        Channel::RangedSpell,
    ];

    /// Melee channels always reach exactly one tile and ignore sightlines.
    pub fn is_melee(&self) -> bool {
        matches!(self, Channel::Melee | Channel::MeleeSpell)
    }

    pub fn is_spell(&self) -> bool {
        matches!(self, Channel::MeleeSpell | Channel::RangedSpell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Race {
    Human,
    Elf,
    Dwarf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Profession {
    Fighter,
    Rogue,
    Mage,
    Cleric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemMajor {
    MeleeWeapon,
    RangedWeapon,
    Armor,
    MeleeSpell,
    RangedSpell,
}

impl ItemMajor {
    /// The attack channel an item of this type arms, if any.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            ItemMajor::MeleeWeapon => Some(Channel::Melee),
            ItemMajor::RangedWeapon => Some(Channel::Ranged),
            ItemMajor::MeleeSpell => Some(Channel::MeleeSpell),
            ItemMajor::RangedSpell => Some(Channel::RangedSpell),
            ItemMajor::Armor => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Defenses {
    pub melee: i32,
    pub ranged: i32,
    pub magic: i32,
}

impl Defenses {
    /// Defense score matched against an attack on the given channel.
    pub fn against(&self, channel: Channel) -> i32 {
        match channel {
            Channel::Melee => self.melee,
            Channel::Ranged => self.ranged,
            Channel::MeleeSpell | Channel::RangedSpell => self.magic,
        }
    }

    pub fn plus(&self, other: &Defenses) -> Defenses {
        Defenses {
            melee: self.melee + other.melee,
            ranged: self.ranged + other.ranged,
            magic: self.magic + other.magic,
        }
    }
}

/// Which attack channels a player allows the server to fire automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelToggles {
    pub melee: bool,
    pub ranged: bool,
    pub melee_spell: bool,
    pub ranged_spell: bool,
}

impl Default for ChannelToggles {
    fn default() -> Self {
        Self {
            melee: true,
            ranged: true,
            melee_spell: true,
            ranged_spell: true,
        }
    }
}

impl ChannelToggles {
    pub fn enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Melee => self.melee,
            Channel::Ranged => self.ranged,
            Channel::MeleeSpell => self.melee_spell,
            Channel::RangedSpell => self.ranged_spell,
        }
    }

    pub fn set(&mut self, channel: Channel, enabled: bool) {
        match channel {
            Channel::Melee => self.melee = enabled,
            Channel::Ranged => self.ranged = enabled,
            Channel::MeleeSpell => self.melee_spell = enabled,
            Channel::RangedSpell => self.ranged_spell = enabled,
        }
    }
}

/// Strike record a presentation layer can animate. Lives for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackVisual {
    pub channel: Channel,
    pub from_x: i32,
    pub from_y: i32,
    pub to_x: i32,
    pub to_y: i32,
    pub hit: bool,
    pub target_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponView {
    pub channel: Channel,
    pub name: String,
    pub damage: String,
    pub range: i32,
}

/// Fields shared by every actor on the wire.
///
/// `visible` is false when the viewer has lost sight of the actor; `x`/`y`
/// then carry the last coordinate the viewer saw it at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobView {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub dest_x: i32,
    pub dest_y: i32,
    pub hp: i32,
    pub max_hp: i32,
    pub ap: i32,
    pub max_ap: i32,
    pub level: u32,
    pub alive: bool,
    pub invisible: bool,
    pub visible: bool,
    pub log: Vec<String>,
    pub attacks: Vec<AttackVisual>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub mob: MobView,
    pub race: Race,
    pub profession: Profession,
    pub xp: u32,
    pub xp_next: u32,
    pub gold: u32,
    pub toggles: ChannelToggles,
    pub defenses: Defenses,
    pub weapons: Vec<WeaponView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterView {
    pub mob: MobView,
    pub subtype: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumableView {
    pub id: u32,
    pub subtype: String,
    pub x: i32,
    pub y: i32,
    pub magnitude: i32,
    pub gone: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: u32,
    pub major: ItemMajor,
    pub subtype: String,
    pub x: i32,
    pub y: i32,
    pub description: String,
    pub gone: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathSummary {
    pub gold: u32,
    pub kills: u32,
    pub damage_done: i32,
}

/// Messages sent from the server, framed as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Map { tiles: Vec<String>, level_id: u32 },
    Player(PlayerView),
    #[serde(rename = "self")]
    SelfPlayer(PlayerView),
    Monster(MonsterView),
    Consumable(ConsumableView),
    Item(ItemView),
    Dead(DeathSummary),
    Remove { id: u32 },
    Disconnected { reason: String },
}

/// Commands sent by a client, framed the same way as [`ServerMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    Login {
        name: String,
        race: Race,
        profession: Profession,
    },
    Logout,
    Heartbeat,
    SetDestination { x: i32, y: i32 },
    GetItem { x: i32, y: i32 },
    SetSpecialAbilityLocation { x: i32, y: i32 },
    ToggleMelee { enabled: bool },
    ToggleRanged { enabled: bool },
    ToggleMeleeSpell { enabled: bool },
    ToggleRangedSpell { enabled: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_mob() -> MobView {
        MobView {
            id: 7,
            name: "Brann".to_string(),
            x: 3,
            y: 4,
            dest_x: 5,
            dest_y: 4,
            hp: 18,
            max_hp: 20,
            ap: 6,
            max_ap: 10,
            level: 2,
            alive: true,
            invisible: false,
            visible: true,
            log: vec!["dodged Goblin's attack".to_string()],
            attacks: vec![],
        }
    }

    #[test]
    fn test_defense_matches_channel() {
        let defenses = Defenses {
            melee: 10,
            ranged: 12,
            magic: 14,
        };
        assert_eq!(defenses.against(Channel::Melee), 10);
        assert_eq!(defenses.against(Channel::Ranged), 12);
        assert_eq!(defenses.against(Channel::MeleeSpell), 14);
        assert_eq!(defenses.against(Channel::RangedSpell), 14);
    }

    #[test]
    fn test_channel_toggles() {
        let mut toggles = ChannelToggles::default();
        assert!(Channel::ALL.iter().all(|c| toggles.enabled(*c)));

        toggles.set(Channel::RangedSpell, false);
        assert!(!toggles.enabled(Channel::RangedSpell));
        assert!(toggles.enabled(Channel::Ranged));
    }

    #[test]
    fn test_item_major_channel() {
        assert_eq!(ItemMajor::MeleeWeapon.channel(), Some(Channel::Melee));
        assert_eq!(ItemMajor::RangedSpell.channel(), Some(Channel::RangedSpell));
        assert_eq!(ItemMajor::Armor.channel(), None);
    }

    #[test]
    fn test_client_message_envelope() {
        let json = r#"{"type":"setDestination","data":{"x":3,"y":9}}"#;
        let message: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(message, ClientMessage::SetDestination { x: 3, y: 9 });

        let login = r#"{"type":"login","data":{"name":"Ada","race":"elf","profession":"mage"}}"#;
        match serde_json::from_str::<ClientMessage>(login).unwrap() {
            ClientMessage::Login {
                name,
                race,
                profession,
            } => {
                assert_eq!(name, "Ada");
                assert_eq!(race, Race::Elf);
                assert_eq!(profession, Profession::Mage);
            }
            other => panic!("Wrong message after parsing: {:?}", other),
        }
    }

    #[test]
    fn test_unit_command_without_data() {
        let message: ClientMessage = serde_json::from_str(r#"{"type":"logout"}"#).unwrap();
        assert_eq!(message, ClientMessage::Logout);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"fly","data":{}}"#);
        assert!(result.is_err());

        let result = serde_json::from_str::<ClientMessage>("not json at all");
        assert!(result.is_err());
    }

    #[test]
    fn test_self_message_tag() {
        let view = PlayerView {
            mob: sample_mob(),
            race: Race::Dwarf,
            profession: Profession::Fighter,
            xp: 12,
            xp_next: 20,
            gold: 3,
            toggles: ChannelToggles::default(),
            defenses: Defenses::default(),
            weapons: vec![],
        };
        let value = serde_json::to_value(ServerMessage::SelfPlayer(view)).unwrap();
        assert_eq!(value["type"], "self");
        assert_eq!(value["data"]["mob"]["maxHp"], 20);
        assert_eq!(value["data"]["xpNext"], 20);
    }

    #[test]
    fn test_map_message_fields() {
        let message = ServerMessage::Map {
            tiles: vec!["###".to_string(), "#.#".to_string()],
            level_id: 2,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "map");
        assert_eq!(value["data"]["levelId"], 2);
        assert_eq!(value["data"]["tiles"][1], "#.#");

        let parsed: ServerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, message);
    }
}
