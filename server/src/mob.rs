//! The actor aggregate shared by players and monsters, and its per-tick
//! state machine.
//!
//! Behaviour lives in free functions that take the [`Mob`] being updated
//! together with the [`Level`] it stands on. The level's registries never
//! hold the mob while it updates, so both can be borrowed mutably.

use crate::combat;
use crate::config::SimConfig;
use crate::dice::GameRng;
use crate::error::GameError;
use crate::item::{starting_kit, Equipment, Item};
use crate::level::{find_nearest_eligible, Level, TargetQuery};
use crate::monster::MonsterKind;
use crate::pathfind::find_path;
use crate::stats::{self, channel_rules, merge, player_stats, ChannelValues, Stats, BASE_STATS};
use crate::utils::{chebyshev, EntityId, IdAllocator, Tile};
use log::{debug, info};
use rand::Rng;
use shared::{
    AttackVisual, Channel, ChannelToggles, Defenses, MobView, MonsterView, PlayerView, Profession, Race,
};
use std::collections::VecDeque;

/// Channels in the order the action phase tries them, after the special.
pub const ATTACK_PRIORITY: [Channel; 4] = [
    Channel::Ranged,
    Channel::RangedSpell,
    Channel::Melee,
    Channel::MeleeSpell,
];

/// Per-tick inputs shared by every update on every level.
pub struct TickContext<'a> {
    pub tick: u64,
    pub config: &'a SimConfig,
    pub rng: &'a mut GameRng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Special {
    Invisibility,
    Blink,
    Heal,
}

impl Special {
    pub fn for_profession(profession: Profession) -> Option<Special> {
        match profession {
            Profession::Fighter => None,
            Profession::Rogue => Some(Special::Invisibility),
            Profession::Mage => Some(Special::Blink),
            Profession::Cleric => Some(Special::Heal),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub race: Race,
    pub profession: Profession,
    pub xp: u32,
    pub gold: u32,
    pub kills: u32,
    pub damage_done: i32,
    pub toggles: ChannelToggles,
    pub special: Option<Special>,
    pub special_target: Option<Tile>,
    pub pending_pickup: Option<Tile>,
    /// Stairs tile the player arrived on; it does not trigger until left.
    pub arrived_on: Option<Tile>,
    pub death_reported: bool,
}

#[derive(Debug, Clone)]
pub struct MonsterState {
    pub kind: MonsterKind,
    pub spawn: Tile,
    pub gold: u32,
}

#[derive(Debug, Clone)]
pub enum Role {
    Player(PlayerState),
    Monster(MonsterState),
}

#[derive(Debug, Clone)]
pub struct Mob {
    pub id: EntityId,
    pub name: String,
    pub level: u32,
    pub role: Role,
    pub x: i32,
    pub y: i32,
    pub dest_x: i32,
    pub dest_y: i32,
    pub hp: i32,
    pub ap: i32,
    pub stats: Stats,
    pub equipment: Equipment,
    pub alive: bool,
    pub death_tick: u64,
    pub invisible: bool,
    pub last_move_tick: u64,
    pub pause_until: u64,
    pub last_attack: ChannelValues<Option<u64>>,
    pub last_special: Option<u64>,
    /// Remaining steps to the destination; empty means "recompute".
    pub path: VecDeque<Tile>,
    pub log: Vec<String>,
    pub attacks: Vec<AttackVisual>,
}

impl Mob {
    fn with_stats(id: EntityId, name: String, level: u32, role: Role, at: Tile, stats: Stats, equipment: Equipment) -> Self {
        Self {
            id,
            name,
            level,
            role,
            x: at.0,
            y: at.1,
            dest_x: at.0,
            dest_y: at.1,
            hp: stats.max_hp,
            ap: stats.max_ap,
            stats,
            equipment,
            alive: true,
            death_tick: 0,
            invisible: false,
            last_move_tick: 0,
            pause_until: 0,
            last_attack: ChannelValues::splat(None),
            last_special: None,
            path: VecDeque::new(),
            log: Vec::new(),
            attacks: Vec::new(),
        }
    }

    pub fn new_player(
        id: EntityId,
        name: &str,
        race: Race,
        profession: Profession,
        at: Tile,
        ids: &mut IdAllocator,
    ) -> Self {
        let state = PlayerState {
            race,
            profession,
            xp: 0,
            gold: 0,
            kills: 0,
            damage_done: 0,
            toggles: ChannelToggles::default(),
            special: Special::for_profession(profession),
            special_target: None,
            pending_pickup: None,
            arrived_on: None,
            death_reported: false,
        };
        Self::with_stats(
            id,
            name.to_string(),
            1,
            Role::Player(state),
            at,
            player_stats(race, profession, 1),
            starting_kit(profession, ids),
        )
    }

    pub fn new_monster(id: EntityId, kind: MonsterKind, spawn: Tile, ids: &mut IdAllocator, rng: &mut GameRng) -> Self {
        let template = kind.template();
        let stats = merge(&BASE_STATS, &[&template.overrides], &[]);
        let equipment = Equipment::with_items(
            template
                .weapons
                .iter()
                .map(|weapon| Item::from_template(ids.allocate(), weapon)),
        );
        let gold = crate::dice::roll(template.gold, 0, rng).total.max(0) as u32;
        let state = MonsterState { kind, spawn, gold };
        Self::with_stats(
            id,
            template.name.to_string(),
            template.level,
            Role::Monster(state),
            spawn,
            stats,
            equipment,
        )
    }

    pub fn position(&self) -> Tile {
        (self.x, self.y)
    }

    pub fn destination(&self) -> Tile {
        (self.dest_x, self.dest_y)
    }

    pub fn at_destination(&self) -> bool {
        self.position() == self.destination()
    }

    pub fn set_destination(&mut self, to: Tile) {
        self.dest_x = to.0;
        self.dest_y = to.1;
        self.path.clear();
    }

    pub fn max_hp(&self) -> i32 {
        self.stats.max_hp
    }

    pub fn max_ap(&self) -> i32 {
        self.stats.max_ap
    }

    pub fn is_paused(&self, tick: u64) -> bool {
        tick < self.pause_until
    }

    pub fn hit_bonus(&self, channel: Channel) -> i32 {
        self.stats.hit.get(channel) + self.equipment.hit_bonus(channel)
    }

    pub fn damage_bonus(&self, channel: Channel) -> i32 {
        self.stats.damage.get(channel) + self.equipment.damage_bonus(channel)
    }

    pub fn defenses(&self) -> Defenses {
        self.stats.defense.plus(&self.equipment.defense())
    }

    pub fn player(&self) -> Option<&PlayerState> {
        match &self.role {
            Role::Player(state) => Some(state),
            Role::Monster(_) => None,
        }
    }

    pub fn player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.role {
            Role::Player(state) => Some(state),
            Role::Monster(_) => None,
        }
    }

    pub fn monster(&self) -> Option<&MonsterState> {
        match &self.role {
            Role::Monster(state) => Some(state),
            Role::Player(_) => None,
        }
    }

    pub fn is_player(&self) -> bool {
        self.player().is_some()
    }

    pub fn view(&self) -> MobView {
        MobView {
            id: self.id,
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            dest_x: self.dest_x,
            dest_y: self.dest_y,
            hp: self.hp,
            max_hp: self.max_hp(),
            ap: self.ap,
            max_ap: self.max_ap(),
            level: self.level,
            alive: self.alive,
            invisible: self.invisible,
            visible: true,
            log: self.log.clone(),
            attacks: self.attacks.clone(),
        }
    }

    pub fn player_view(&self) -> Option<PlayerView> {
        let state = self.player()?;
        Some(PlayerView {
            mob: self.view(),
            race: state.race,
            profession: state.profession,
            xp: state.xp,
            xp_next: stats::xp_to_next(self.level),
            gold: state.gold,
            toggles: state.toggles,
            defenses: self.defenses(),
            weapons: self.equipment.weapon_views(),
        })
    }

    pub fn monster_view(&self) -> Option<MonsterView> {
        let state = self.monster()?;
        Some(MonsterView {
            mob: self.view(),
            subtype: state.kind.subtype().to_string(),
        })
    }
}

pub fn regenerate(mob: &mut Mob) {
    mob.ap = (mob.ap + mob.stats.ap_regen).clamp(0, mob.max_ap());
}

/// Drops the current path and makes the current tile the destination.
pub fn stop(mob: &mut Mob) {
    mob.path.clear();
    mob.dest_x = mob.x;
    mob.dest_y = mob.y;
}

pub fn kill(mob: &mut Mob, tick: u64) {
    mob.alive = false;
    mob.hp = mob.hp.min(0);
    mob.death_tick = tick;
    mob.invisible = false;
    stop(mob);
    if let Some(state) = mob.player_mut() {
        state.pending_pickup = None;
        state.special_target = None;
    }
}

/// Adds experience and applies any level-ups it earns. Monsters ignore XP.
pub fn gain_xp(mob: &mut Mob, amount: u32) {
    let Role::Player(state) = &mut mob.role else {
        return;
    };
    state.xp = state.xp.saturating_add(amount);
    let (race, profession) = (state.race, state.profession);
    let mut gained = false;
    while mob.level < stats::MAX_LEVEL {
        let xp = mob.player().map_or(0, |state| state.xp);
        if xp < stats::xp_to_next(mob.level) {
            break;
        }
        mob.level += 1;
        gained = true;
    }
    if gained {
        mob.stats = player_stats(race, profession, mob.level);
        mob.hp = mob.max_hp();
        mob.ap = mob.max_ap();
        mob.log.push(format!("reached level {}", mob.level));
        info!("{} reached level {}", mob.name, mob.level);
    }
}

/// Brings a dead monster back at its spawn point once the revive delay has
/// passed. Returns true if it respawned.
pub fn respawn(mob: &mut Mob, level: &mut Level, ctx: &TickContext) -> bool {
    let Some(spawn) = mob.monster().map(|state| state.spawn) else {
        return false;
    };
    if mob.alive || ctx.tick < mob.death_tick + ctx.config.revive_delay {
        return false;
    }
    if level.location_blocked(spawn.0, spawn.1) {
        return false;
    }
    mob.alive = true;
    mob.hp = mob.max_hp();
    mob.ap = mob.max_ap();
    mob.x = spawn.0;
    mob.y = spawn.1;
    mob.invisible = false;
    mob.pause_until = 0;
    mob.last_attack = ChannelValues::splat(None);
    stop(mob);
    level.grid.mark_occupied(spawn.0, spawn.1);
    debug!("{} {} respawned at {:?}", mob.name, mob.id, spawn);
    true
}

/// Advances one tile along the cached path. Returns true if the mob moved.
pub fn move_towards_destination(mob: &mut Mob, level: &mut Level, tick: u64) -> bool {
    if mob.at_destination() {
        return false;
    }
    if tick < mob.last_move_tick + mob.stats.ticks_per_move || mob.ap < mob.stats.move_cost {
        return false;
    }

    if mob.path.is_empty() {
        mob.path = find_path(&level.grid, mob.position(), mob.destination(), mob.stats.search_limit);
        if mob.path.is_empty() {
            debug!("{} {} gave up on {:?}", mob.name, mob.id, mob.destination());
            stop(mob);
            return false;
        }
    }

    let Some(&(nx, ny)) = mob.path.front() else {
        return false;
    };
    if level.location_blocked(nx, ny) {
        stop(mob);
        return false;
    }

    mob.path.pop_front();
    level.grid.vacate(mob.x, mob.y);
    level.grid.mark_occupied(nx, ny);
    mob.x = nx;
    mob.y = ny;
    mob.ap -= mob.stats.move_cost;
    mob.last_move_tick = tick;
    true
}

fn movement_eligible(mob: &Mob, tick: u64) -> bool {
    tick >= mob.last_move_tick + mob.stats.ticks_per_move && mob.ap >= mob.stats.move_cost
}

/// Runs the action phase. At most one attack fires; the special runs first
/// and does not stop an attack in the same tick.
fn try_actions(mob: &mut Mob, level: &mut Level, ctx: &mut TickContext) -> Result<bool, GameError> {
    let mut moved = try_special(mob, level, ctx);
    if mob.is_paused(ctx.tick) {
        return Ok(moved);
    }

    for channel in ATTACK_PRIORITY {
        if let Some(target) = attack_target(mob, level, channel, ctx.tick) {
            moved |= attack(mob, level, target, channel, ctx)?;
            break;
        }
    }
    Ok(moved)
}

fn attack_target(mob: &Mob, level: &Level, channel: Channel, tick: u64) -> Option<EntityId> {
    if let Some(state) = mob.player() {
        if !state.toggles.enabled(channel) {
            return None;
        }
    }
    let weapon = mob.equipment.weapon(channel)?;
    let rules = channel_rules(channel);
    if let Some(last) = mob.last_attack.get(channel) {
        if tick < last + rules.cooldown {
            return None;
        }
    }
    if mob.ap < rules.ap_cost {
        return None;
    }

    let query = if channel.is_melee() {
        TargetQuery {
            x: mob.x,
            y: mob.y,
            range: 1,
            min_range: 0,
            require_sight: false,
        }
    } else {
        TargetQuery {
            x: mob.x,
            y: mob.y,
            range: weapon.range,
            min_range: weapon.min_range,
            require_sight: true,
        }
    };
    let registry = if mob.is_player() {
        &level.monsters
    } else {
        &level.players
    };
    find_nearest_eligible(registry, &level.grid, &query)
}

/// Returns true when the defender died, which changes occupancy.
fn attack(
    mob: &mut Mob,
    level: &mut Level,
    target: EntityId,
    channel: Channel,
    ctx: &mut TickContext,
) -> Result<bool, GameError> {
    let registry = if mob.is_player() {
        &mut level.monsters
    } else {
        &mut level.players
    };
    let Some(defender) = registry.get_mut(&target) else {
        return Ok(false);
    };
    mob.ap -= channel_rules(channel).ap_cost;
    let outcome = combat::resolve(mob, defender, channel, &mut level.grid, ctx.tick, &mut *ctx.rng)?;
    Ok(outcome.killed)
}

fn try_special(mob: &mut Mob, level: &mut Level, ctx: &TickContext) -> bool {
    let Some(state) = mob.player() else {
        return false;
    };
    let (Some(special), Some(target)) = (state.special, state.special_target) else {
        return false;
    };
    if let Some(last) = mob.last_special {
        if ctx.tick < last + ctx.config.special_cooldown {
            return false;
        }
    }
    if mob.ap < ctx.config.special_ap_cost {
        return false;
    }

    let mut moved = false;
    match special {
        Special::Invisibility => {
            mob.invisible = true;
            mob.log.push("faded from sight".to_string());
        }
        Special::Heal => {
            let before = mob.hp;
            mob.hp = (mob.hp + ctx.config.heal_amount).min(mob.max_hp());
            mob.log.push(format!("healed {} hp", mob.hp - before));
        }
        Special::Blink => {
            let in_range = chebyshev(mob.position(), target) <= ctx.config.blink_range;
            let clear = !level.location_blocked(target.0, target.1)
                && level.grid.has_line_of_sight(mob.position(), target);
            if !in_range || !clear {
                if let Some(state) = mob.player_mut() {
                    state.special_target = None;
                }
                mob.log.push("cannot blink there".to_string());
                return false;
            }
            level.grid.vacate(mob.x, mob.y);
            level.grid.mark_occupied(target.0, target.1);
            mob.x = target.0;
            mob.y = target.1;
            stop(mob);
            mob.log.push("blinked".to_string());
            moved = true;
        }
    }
    mob.ap -= ctx.config.special_ap_cost;
    mob.last_special = Some(ctx.tick);
    if let Some(state) = mob.player_mut() {
        state.special_target = None;
    }
    moved
}

/// Player update. Returns true if occupancy changed.
pub fn update_player(mob: &mut Mob, level: &mut Level, ctx: &mut TickContext) -> Result<bool, GameError> {
    if !mob.alive {
        return Ok(false);
    }
    regenerate(mob);

    let pending = mob.player().and_then(|state| state.pending_pickup);
    if pending == Some(mob.position()) {
        level.pickup_at(mob);
        if let Some(state) = mob.player_mut() {
            state.pending_pickup = None;
        }
    }

    if mob.is_paused(ctx.tick) {
        return Ok(try_special(mob, level, ctx));
    }

    let mut moved = try_actions(mob, level, ctx)?;
    if mob.is_paused(ctx.tick) {
        return Ok(moved);
    }
    moved |= move_towards_destination(mob, level, ctx.tick);
    Ok(moved)
}

/// Monster update. Returns true if occupancy changed.
pub fn update_monster(mob: &mut Mob, level: &mut Level, ctx: &mut TickContext) -> Result<bool, GameError> {
    if !mob.alive {
        return Ok(respawn(mob, level, ctx));
    }
    if !level.player_within(mob.position(), ctx.config.activation_range) {
        return Ok(false);
    }
    regenerate(mob);
    if mob.is_paused(ctx.tick) {
        return Ok(false);
    }

    let mut moved = try_actions(mob, level, ctx)?;
    if mob.is_paused(ctx.tick) {
        return Ok(moved);
    }

    if movement_eligible(mob, ctx.tick) {
        retarget_monster(mob, level, ctx);
    }
    moved |= move_towards_destination(mob, level, ctx.tick);
    Ok(moved)
}

/// Chooses where a monster is heading: the nearest visible player within
/// hunt range, or else a fresh wander point once the old one is reached.
pub fn retarget_monster(mob: &mut Mob, level: &Level, ctx: &mut TickContext) {
    let query = TargetQuery {
        x: mob.x,
        y: mob.y,
        range: ctx.config.hunt_range,
        min_range: 0,
        require_sight: true,
    };
    let prey = find_nearest_eligible(&level.players, &level.grid, &query)
        .and_then(|id| level.players.get(&id))
        .map(|player| player.position());

    if let Some(prey) = prey {
        if chebyshev(mob.position(), prey) <= 1 {
            stop(mob);
        } else if mob.destination() != prey {
            mob.set_destination(prey);
        }
        return;
    }

    if !mob.at_destination() {
        return;
    }
    let Some(spawn) = mob.monster().map(|state| state.spawn) else {
        return;
    };
    let radius = ctx.config.wander_radius.max(1);
    let point = (
        spawn.0 + ctx.rng.gen_range(-radius..=radius),
        spawn.1 + ctx.rng.gen_range(-radius..=radius),
    );
    if point == mob.position() || level.grid.tile_blocked(point.0, point.1) {
        return;
    }
    let path = find_path(&level.grid, mob.position(), point, mob.stats.search_limit);
    if path.is_empty() {
        return;
    }
    mob.dest_x = point.0;
    mob.dest_y = point.1;
    mob.path = path;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::seeded_rng;
    use crate::item::catalog;

    const OPEN: &str = "\
##########
#........#
#........#
#........#
#........#
#........#
#........#
##########";

    fn open_level() -> Level {
        Level::parse(1, OPEN).unwrap()
    }

    fn player_at(id: EntityId, at: Tile, ids: &mut IdAllocator) -> Mob {
        Mob::new_player(id, "Brann", Race::Human, Profession::Fighter, at, ids)
    }

    #[test]
    fn test_new_player_starts_full() {
        let mut ids = IdAllocator::new();
        let mob = player_at(100, (2, 2), &mut ids);
        assert!(mob.alive);
        assert_eq!(mob.hp, mob.max_hp());
        assert_eq!(mob.ap, 12);
        assert!(mob.at_destination());
        assert!(mob.equipment.weapon(Channel::Melee).is_some());
    }

    #[test]
    fn test_regenerate_clamps_to_max() {
        let mut ids = IdAllocator::new();
        let mut mob = player_at(1, (2, 2), &mut ids);
        mob.ap = mob.max_ap() - 1;
        regenerate(&mut mob);
        regenerate(&mut mob);
        assert_eq!(mob.ap, mob.max_ap());
    }

    #[test]
    fn test_no_move_when_at_destination() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut mob = player_at(1, (5, 5), &mut ids);
        mob.set_destination((5, 5));
        assert!(!move_towards_destination(&mut mob, &mut level, 10));
        assert!(mob.path.is_empty());
        assert_eq!(mob.position(), (5, 5));
    }

    #[test]
    fn test_zero_ap_skips_move_and_keeps_path() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut mob = player_at(1, (2, 2), &mut ids);
        mob.set_destination((5, 2));
        mob.path = VecDeque::from(vec![(3, 2), (4, 2), (5, 2)]);
        mob.ap = 0;

        assert!(!move_towards_destination(&mut mob, &mut level, 10));
        assert_eq!(mob.position(), (2, 2));
        assert_eq!(mob.destination(), (5, 2));
        assert_eq!(mob.path.len(), 3);
    }

    #[test]
    fn test_move_follows_lazy_path() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut mob = player_at(1, (1, 1), &mut ids);
        level.grid.mark_occupied(1, 1);
        mob.set_destination((4, 1));

        assert!(move_towards_destination(&mut mob, &mut level, 10));
        assert_eq!(mob.position(), (2, 1));
        assert_eq!(mob.ap, mob.max_ap() - 1);
        assert!(!level.grid.tile_blocked(1, 1));
        assert!(level.grid.tile_blocked(2, 1));

        // Too soon for the next step.
        assert!(!move_towards_destination(&mut mob, &mut level, 11));
        assert!(move_towards_destination(&mut mob, &mut level, 12));
        assert_eq!(mob.position(), (3, 1));
    }

    #[test]
    fn test_blocked_step_collapses_destination() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut mob = player_at(1, (1, 1), &mut ids);
        mob.set_destination((4, 1));
        mob.path = VecDeque::from(vec![(2, 1), (3, 1), (4, 1)]);
        level.grid.mark_occupied(2, 1);

        assert!(!move_towards_destination(&mut mob, &mut level, 10));
        assert_eq!(mob.position(), (1, 1));
        assert!(mob.at_destination());
        assert!(mob.path.is_empty());
    }

    #[test]
    fn test_unreachable_destination_stops() {
        let mut level = Level::parse(1, "#####\n#.#.#\n#####").unwrap();
        let mut ids = IdAllocator::new();
        let mut mob = player_at(1, (1, 1), &mut ids);
        mob.set_destination((3, 1));
        assert!(!move_towards_destination(&mut mob, &mut level, 10));
        assert!(mob.at_destination());
    }

    #[test]
    fn test_gain_xp_levels_up_and_refills() {
        let mut ids = IdAllocator::new();
        let mut mob = player_at(1, (1, 1), &mut ids);
        mob.hp = 3;
        gain_xp(&mut mob, 25);
        assert_eq!(mob.level, 2);
        assert_eq!(mob.hp, mob.max_hp());
        assert_eq!(mob.max_hp(), 20 + 6);

        gain_xp(&mut mob, 200);
        assert_eq!(mob.level, 5);
    }

    #[test]
    fn test_monster_respawns_after_delay() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(1);
        let config = SimConfig::default();
        let mut rat = Mob::new_monster(50, MonsterKind::Rat, (3, 3), &mut ids, &mut rng);
        rat.x = 6;
        rat.y = 6;
        kill(&mut rat, 100);

        let mut ctx = TickContext {
            tick: 100 + config.revive_delay - 1,
            config: &config,
            rng: &mut rng,
        };
        assert!(!update_monster(&mut rat, &mut level, &mut ctx).unwrap());
        assert!(!rat.alive);

        ctx.tick += 1;
        assert!(update_monster(&mut rat, &mut level, &mut ctx).unwrap());
        assert!(rat.alive);
        assert_eq!(rat.position(), (3, 3));
        assert_eq!(rat.hp, rat.max_hp());
        assert!(level.grid.tile_blocked(3, 3));
    }

    #[test]
    fn test_respawn_waits_for_free_spawn() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(1);
        let config = SimConfig::default();
        let mut rat = Mob::new_monster(50, MonsterKind::Rat, (3, 3), &mut ids, &mut rng);
        kill(&mut rat, 0);
        level.grid.mark_occupied(3, 3);

        let mut ctx = TickContext {
            tick: config.revive_delay + 5,
            config: &config,
            rng: &mut rng,
        };
        assert!(!update_monster(&mut rat, &mut level, &mut ctx).unwrap());
        assert!(!rat.alive);
    }

    #[test]
    fn test_idle_monster_without_players_nearby() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(1);
        let config = SimConfig::default();
        let mut rat = Mob::new_monster(50, MonsterKind::Rat, (3, 3), &mut ids, &mut rng);
        rat.ap = 0;
        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        assert!(!update_monster(&mut rat, &mut level, &mut ctx).unwrap());
        // Skipped entirely, not even regenerated.
        assert_eq!(rat.ap, 0);
    }

    #[test]
    fn test_monster_hunts_visible_player() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(1);
        let config = SimConfig::default();
        level.add_player(player_at(1, (7, 5), &mut ids));
        let mut goblin = Mob::new_monster(50, MonsterKind::Goblin, (2, 2), &mut ids, &mut rng);

        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        retarget_monster(&mut goblin, &level, &mut ctx);
        assert_eq!(goblin.destination(), (7, 5));
    }

    #[test]
    fn test_monster_ignores_invisible_player() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(1);
        let config = SimConfig {
            wander_radius: 0,
            ..SimConfig::default()
        };
        let mut rogue = player_at(1, (7, 5), &mut ids);
        rogue.invisible = true;
        level.add_player(rogue);
        let mut goblin = Mob::new_monster(50, MonsterKind::Goblin, (2, 2), &mut ids, &mut rng);

        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        retarget_monster(&mut goblin, &level, &mut ctx);
        assert_ne!(goblin.destination(), (7, 5));
    }

    #[test]
    fn test_wander_destination_is_reachable() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(9);
        let config = SimConfig::default();
        let mut rat = Mob::new_monster(50, MonsterKind::Rat, (4, 3), &mut ids, &mut rng);
        level.grid.mark_occupied(4, 3);

        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        for _ in 0..100 {
            retarget_monster(&mut rat, &level, &mut ctx);
            if !rat.at_destination() {
                break;
            }
        }
        assert!(!rat.at_destination());
        assert_eq!(rat.path.back(), Some(&rat.destination()));
        assert!(!level.grid.tile_blocked(rat.dest_x, rat.dest_y));
    }

    #[test]
    fn test_player_attacks_adjacent_monster_once_per_tick() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(4);
        let config = SimConfig::default();
        let rat = Mob::new_monster(50, MonsterKind::Rat, (3, 2), &mut ids, &mut rng);
        level.add_monster(rat);
        let mut fighter = player_at(1, (2, 2), &mut ids);

        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        update_player(&mut fighter, &mut level, &mut ctx).unwrap();

        assert_eq!(fighter.attacks.len(), 1);
        assert_eq!(fighter.attacks[0].channel, Channel::Melee);
        assert_eq!(fighter.last_attack.get(Channel::Melee), Some(10));
        assert!(fighter.is_paused(10));
        let melee_cost = channel_rules(Channel::Melee).ap_cost;
        assert_eq!(fighter.ap, fighter.max_ap() - melee_cost);
    }

    #[test]
    fn test_ranged_preferred_over_melee_when_in_range() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(4);
        let config = SimConfig::default();
        level.add_monster(Mob::new_monster(50, MonsterKind::Rat, (6, 2), &mut ids, &mut rng));
        let mut fighter = player_at(1, (2, 2), &mut ids);

        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        update_player(&mut fighter, &mut level, &mut ctx).unwrap();
        assert_eq!(fighter.attacks.len(), 1);
        assert_eq!(fighter.attacks[0].channel, Channel::Ranged);
    }

    #[test]
    fn test_disabled_channel_never_fires() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(4);
        let config = SimConfig::default();
        level.add_monster(Mob::new_monster(50, MonsterKind::Rat, (3, 2), &mut ids, &mut rng));
        let mut fighter = player_at(1, (2, 2), &mut ids);
        if let Some(state) = fighter.player_mut() {
            state.toggles.set(Channel::Melee, false);
        }

        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        update_player(&mut fighter, &mut level, &mut ctx).unwrap();
        assert!(fighter.attacks.is_empty());
    }

    #[test]
    fn test_paused_player_only_uses_special() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(4);
        let config = SimConfig::default();
        let mut rogue = Mob::new_player(1, "Vex", Race::Elf, Profession::Rogue, (2, 2), &mut ids);
        rogue.pause_until = 20;
        rogue.set_destination((5, 2));
        if let Some(state) = rogue.player_mut() {
            state.special_target = Some((2, 2));
        }

        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        update_player(&mut rogue, &mut level, &mut ctx).unwrap();
        assert!(rogue.invisible);
        assert_eq!(rogue.position(), (2, 2));
        assert_eq!(rogue.last_special, Some(10));
    }

    #[test]
    fn test_blink_moves_to_visible_tile() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(4);
        let config = SimConfig::default();
        let mut mage = Mob::new_player(1, "Ada", Race::Human, Profession::Mage, (1, 1), &mut ids);
        level.grid.mark_occupied(1, 1);
        if let Some(state) = mage.player_mut() {
            state.special_target = Some((5, 4));
        }

        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        assert!(update_player(&mut mage, &mut level, &mut ctx).unwrap());
        assert_eq!(mage.position(), (5, 4));
        assert!(level.grid.tile_blocked(5, 4));
        assert!(!level.grid.tile_blocked(1, 1));
    }

    #[test]
    fn test_pending_pickup_runs_on_arrival() {
        let mut level = open_level();
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(4);
        let config = SimConfig::default();
        level.place_loot((2, 2), crate::item::Loot::Item(Item::from_template(77, &catalog::LONGBOW)));
        let mut fighter = player_at(1, (2, 2), &mut ids);
        if let Some(state) = fighter.player_mut() {
            state.pending_pickup = Some((2, 2));
        }

        let mut ctx = TickContext {
            tick: 10,
            config: &config,
            rng: &mut rng,
        };
        update_player(&mut fighter, &mut level, &mut ctx).unwrap();
        assert_eq!(fighter.equipment.weapon(Channel::Ranged).map(|i| i.id), Some(77));
        assert!(fighter.player().unwrap().pending_pickup.is_none());
    }
}
