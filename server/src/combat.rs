//! Attack resolution between two mobs.

use crate::dice::{roll, Dice, Roll};
use crate::error::GameError;
use crate::grid::Grid;
use crate::mob::{gain_xp, kill, Mob, Role};
use crate::stats::channel_rules;
use log::info;
use rand::Rng;
use shared::{AttackVisual, Channel};

/// Base XP for killing a foe of each level; index 0 is unused.
const KILL_XP: [u32; 7] = [0, 5, 10, 20, 35, 55, 80];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackOutcome {
    pub attack: Roll,
    pub defense: i32,
    pub hit: bool,
    pub damage: Option<Roll>,
    pub killed: bool,
    pub xp: u32,
}

/// XP for a kill, scaled by how far the killer outlevels the victim.
///
/// Two or more levels above the victim earns nothing, one level above earns
/// half, and fighting upwards earns a bonus.
pub fn xp_for_kill(attacker_level: u32, defender_level: u32) -> u32 {
    let base = KILL_XP[(defender_level as usize).clamp(1, KILL_XP.len() - 1)];
    let gap = attacker_level as i64 - defender_level as i64;
    match gap {
        g if g >= 2 => 0,
        1 => base / 2,
        0 => base,
        _ => base * 3 / 2,
    }
}

/// Resolves one attack from `attacker` on `defender` over `channel`.
///
/// Fails with [`GameError::MissingWeapon`] when the attacker has nothing
/// equipped for the channel; callers gate on equipment before attacking.
pub fn resolve<R: Rng + ?Sized>(
    attacker: &mut Mob,
    defender: &mut Mob,
    channel: Channel,
    grid: &mut Grid,
    tick: u64,
    rng: &mut R,
) -> Result<AttackOutcome, GameError> {
    let weapon = attacker
        .equipment
        .weapon(channel)
        .ok_or(GameError::MissingWeapon {
            entity: attacker.id,
            channel,
        })?;
    let weapon_name = weapon.name.clone();
    let weapon_die: Dice = weapon.damage;

    let (sneak_hit, sneak_damage) = if attacker.invisible {
        (attacker.stats.invisible_hit, attacker.stats.invisible_damage)
    } else {
        (0, 0)
    };

    let attack = roll(Dice::D20, attacker.hit_bonus(channel) + sneak_hit, rng);
    let defense = defender.defenses().against(channel);
    let hit = attack.total >= defense;

    let rules = channel_rules(channel);
    attacker.invisible = false;
    attacker.pause_until = tick + rules.pause;
    attacker.last_attack.set(channel, Some(tick));
    attacker.attacks.push(AttackVisual {
        channel,
        from_x: attacker.x,
        from_y: attacker.y,
        to_x: defender.x,
        to_y: defender.y,
        hit,
        target_id: defender.id,
    });

    if !hit {
        attacker.log.push(format!("missed {} with {}", defender.name, weapon_name));
        defender.log.push(format!("dodged {}'s {}", attacker.name, weapon_name));
        return Ok(AttackOutcome {
            attack,
            defense,
            hit,
            damage: None,
            killed: false,
            xp: 0,
        });
    }

    let damage = roll(weapon_die, attacker.damage_bonus(channel) + sneak_damage, rng);
    let amount = damage.total.max(0);
    defender.hp -= amount;
    attacker.log.push(format!("hit {} for {}", defender.name, amount));
    defender.log.push(format!("{} hit you for {}", attacker.name, amount));
    if let Role::Player(state) = &mut attacker.role {
        state.damage_done += amount;
    }

    let mut killed = false;
    let mut xp = 0;
    if defender.alive && defender.hp <= 0 {
        kill(defender, tick);
        grid.vacate(defender.x, defender.y);
        killed = true;
        attacker.log.push(format!("killed {}", defender.name));

        if attacker.is_player() {
            xp = xp_for_kill(attacker.level, defender.level);
            let loot_gold = defender.monster().map_or(0, |state| state.gold);
            if let Role::Player(state) = &mut attacker.role {
                state.kills += 1;
                state.gold += loot_gold;
            }
            gain_xp(attacker, xp);
        }
        info!("{} {} killed {} {}", attacker.name, attacker.id, defender.name, defender.id);
    }

    Ok(AttackOutcome {
        attack,
        defense,
        hit,
        damage: Some(damage),
        killed,
        xp,
    })
}
