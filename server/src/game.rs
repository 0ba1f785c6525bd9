//! Authoritative world state and the per-tick driver.
//!
//! `GameState` owns every level, the id allocator and the random generator.
//! Network handlers hand it decoded commands through [`GameState::apply_command`];
//! the server loop calls [`GameState::advance_tick`] once per tick and then
//! [`GameState::outbound`] to collect what each connection should receive.

use crate::config::SimConfig;
use crate::delta::Replicator;
use crate::dice::{seeded_rng, GameRng};
use crate::error::GameError;
use crate::level::Level;
use crate::mob::{stop, Mob, TickContext};
use crate::utils::{chebyshev, ClientId, EntityId, IdAllocator, LevelId, Tile};
use log::{debug, info, warn};
use shared::{Channel, ClientMessage, DeathSummary, MobView, Profession, Race, ServerMessage};
use std::collections::{BTreeMap, HashMap};

/// Maps shipped with the server, top floor first.
pub const BUNDLED_LEVELS: [&str; 2] = [
    include_str!("../levels/level1.txt"),
    include_str!("../levels/level2.txt"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub name: String,
    pub race: Race,
    pub profession: Profession,
}

/// A logged-in connection and what it has been told so far.
#[derive(Debug)]
pub struct Session {
    pub player: EntityId,
    pub level: LevelId,
    replicator: Replicator,
    /// Where this viewer last saw each entity that is now out of sight.
    last_seen: HashMap<EntityId, Tile>,
    needs_map: bool,
    pending: Vec<ServerMessage>,
}

impl Session {
    fn new(player: EntityId, level: LevelId) -> Self {
        Self {
            player,
            level,
            replicator: Replicator::new(),
            last_seen: HashMap::new(),
            needs_map: true,
            pending: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub logins: usize,
    pub logouts: usize,
    pub transitions: usize,
    /// Levels whose occupancy grid was rebuilt this tick.
    pub rebuilt_levels: usize,
}

pub struct GameState {
    pub tick: u64,
    pub config: SimConfig,
    ids: IdAllocator,
    rng: GameRng,
    levels: BTreeMap<LevelId, Level>,
    sessions: BTreeMap<ClientId, Session>,
    pending_logins: Vec<(ClientId, LoginRequest)>,
    pending_logouts: Vec<ClientId>,
    outbox: Vec<(ClientId, ServerMessage)>,
}

impl GameState {
    /// Builds and populates one level per map, linking each floor's down
    /// stairs to the next floor and its up stairs to the previous one.
    pub fn new<S: AsRef<str>>(maps: &[S], config: SimConfig, seed: u64) -> Result<Self, GameError> {
        let mut ids = IdAllocator::new();
        let mut rng = seeded_rng(seed);
        let count = maps.len() as LevelId;
        let mut levels = BTreeMap::new();

        for (index, map) in maps.iter().enumerate() {
            let id = index as LevelId + 1;
            let mut level = Level::parse(id, map.as_ref())?;
            for stairs in &mut level.stairs {
                stairs.link = if stairs.down {
                    (id < count).then_some(id + 1)
                } else {
                    (id > 1).then_some(id - 1)
                };
            }
            level.populate(&mut ids, &mut rng, &config)?;
            levels.insert(id, level);
        }

        info!("World created with {} levels (seed {})", levels.len(), seed);
        Ok(Self {
            tick: 0,
            config,
            ids,
            rng,
            levels,
            sessions: BTreeMap::new(),
            pending_logins: Vec::new(),
            pending_logouts: Vec::new(),
            outbox: Vec::new(),
        })
    }

    pub fn with_bundled_levels(config: SimConfig, seed: u64) -> Result<Self, GameError> {
        Self::new(&BUNDLED_LEVELS, config, seed)
    }

    pub fn level(&self, id: LevelId) -> Option<&Level> {
        self.levels.get(&id)
    }

    pub fn level_mut(&mut self, id: LevelId) -> Option<&mut Level> {
        self.levels.get_mut(&id)
    }

    pub fn session(&self, client: ClientId) -> Option<&Session> {
        self.sessions.get(&client)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn player(&self, client: ClientId) -> Option<&Mob> {
        let session = self.sessions.get(&client)?;
        self.levels.get(&session.level)?.players.get(&session.player)
    }

    pub fn player_mut(&mut self, client: ClientId) -> Option<&mut Mob> {
        let session = self.sessions.get(&client)?;
        self.levels
            .get_mut(&session.level)?
            .players
            .get_mut(&session.player)
    }

    /// Routes one decoded client command. Logins and logouts are queued for
    /// the next tick boundary; everything else only writes fields on the
    /// player and never pathfinds.
    pub fn apply_command(&mut self, client: ClientId, message: ClientMessage) {
        match message {
            ClientMessage::Login {
                name,
                race,
                profession,
            } => {
                let queued = self.pending_logins.iter().any(|(id, _)| *id == client);
                if self.sessions.contains_key(&client) || queued {
                    debug!("Ignoring repeated login from client {}", client);
                    return;
                }
                self.pending_logins.push((
                    client,
                    LoginRequest {
                        name,
                        race,
                        profession,
                    },
                ));
            }
            ClientMessage::Logout => self.disconnect(client),
            ClientMessage::Heartbeat => {}
            command => {
                let Some(session) = self.sessions.get(&client) else {
                    debug!("Command from client {} without a player: {:?}", client, command);
                    return;
                };
                let Some(level) = self.levels.get_mut(&session.level) else {
                    return;
                };
                if let Some((x, y)) = command_target(&command) {
                    if !level.grid.in_bounds(x, y) {
                        warn!("Client {} sent coordinates ({}, {}) outside the map", client, x, y);
                        return;
                    }
                }
                let Some(mob) = level.players.get_mut(&session.player) else {
                    return;
                };
                if mob.alive {
                    steer(mob, command);
                }
            }
        }
    }

    /// Queues a logout, processed after the next tick's player updates.
    pub fn disconnect(&mut self, client: ClientId) {
        self.pending_logins.retain(|(id, _)| *id != client);
        if !self.pending_logouts.contains(&client) {
            self.pending_logouts.push(client);
        }
    }

    /// Advances the world by one tick.
    ///
    /// Each call is a new tick. A failing entity update does not stop the
    /// rest of the tick; the first failure is returned once the tick is done.
    pub fn advance_tick(&mut self) -> Result<TickReport, GameError> {
        self.tick += 1;
        let tick = self.tick;
        let mut report = TickReport {
            tick,
            ..Default::default()
        };
        report.logins = self.process_logins();

        let mut failure = None;
        let mut ctx = TickContext {
            tick,
            config: &self.config,
            rng: &mut self.rng,
        };
        for level in self.levels.values_mut() {
            level.begin_tick();
            let monsters = level.update_monsters(&mut ctx);
            let players = level.update_players(&mut ctx);
            let moved = matches!(monsters, Ok(true)) || matches!(players, Ok(true));
            let failed = monsters.is_err() || players.is_err();
            if moved || failed {
                level.rebuild_occupancy();
                report.rebuilt_levels += 1;
            }
            for result in [monsters, players] {
                if let Err(e) = result {
                    failure.get_or_insert(e);
                }
            }
        }

        report.transitions = self.process_transitions();
        report.logouts = self.process_logouts();

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    fn process_logins(&mut self) -> usize {
        let logins = std::mem::take(&mut self.pending_logins);
        let mut accepted = 0;
        for (client, request) in logins {
            match self.spawn_player(client, &request) {
                Ok(id) => {
                    accepted += 1;
                    info!(
                        "{} ({:?} {:?}) logged in as entity {} for client {}",
                        request.name, request.race, request.profession, id, client
                    );
                }
                Err(e) => {
                    warn!("Login for client {} rejected: {}", client, e);
                    self.outbox.push((
                        client,
                        ServerMessage::Disconnected {
                            reason: e.to_string(),
                        },
                    ));
                }
            }
        }
        accepted
    }

    fn spawn_player(&mut self, client: ClientId, request: &LoginRequest) -> Result<EntityId, GameError> {
        let (&level_id, level) = self
            .levels
            .iter_mut()
            .next()
            .ok_or(GameError::UnknownLevel(1))?;
        let spawn = level.random_empty_tile(&mut self.rng, self.config.spawn_attempts)?;
        let id = self.ids.allocate();
        let player = Mob::new_player(
            id,
            &request.name,
            request.race,
            request.profession,
            spawn,
            &mut self.ids,
        );
        level.add_player(player);
        self.sessions.insert(client, Session::new(id, level_id));
        Ok(id)
    }

    /// Moves living players standing on linked stairs to the linked level.
    fn process_transitions(&mut self) -> usize {
        let mut moves = Vec::new();
        for (client, session) in &self.sessions {
            let Some(level) = self.levels.get(&session.level) else {
                continue;
            };
            let Some(player) = level.players.get(&session.player) else {
                continue;
            };
            let position = player.position();
            if !player.alive || player.player().and_then(|state| state.arrived_on) == Some(position) {
                continue;
            }
            if let Some(to) = level.stairs_at(position).and_then(|stairs| stairs.link) {
                moves.push((*client, session.level, to));
            }
        }

        for level in self.levels.values_mut() {
            for player in level.players.values_mut() {
                let position = player.position();
                if let Some(state) = player.player_mut() {
                    if state.arrived_on.is_some_and(|tile| tile != position) {
                        state.arrived_on = None;
                    }
                }
            }
        }

        let mut done = 0;
        for (client, from, to) in moves {
            match self.transfer(client, from, to) {
                Ok(()) => done += 1,
                Err(e) => warn!("Client {} could not move to level {}: {}", client, to, e),
            }
        }
        done
    }

    fn transfer(&mut self, client: ClientId, from: LevelId, to: LevelId) -> Result<(), GameError> {
        let Some(player_id) = self.sessions.get(&client).map(|session| session.player) else {
            return Ok(());
        };

        let target = self.levels.get(&to).ok_or(GameError::UnknownLevel(to))?;
        let arrival = match target.stairs_to(from) {
            Some(stairs) => target.free_tile_near((stairs.x, stairs.y), &mut self.rng, self.config.spawn_attempts)?,
            None => target.random_empty_tile(&mut self.rng, self.config.spawn_attempts)?,
        };

        let source = self.levels.get_mut(&from).ok_or(GameError::UnknownLevel(from))?;
        let Some(mut player) = source.remove_player(player_id) else {
            return Ok(());
        };
        player.x = arrival.0;
        player.y = arrival.1;
        stop(&mut player);
        if let Some(state) = player.player_mut() {
            state.pending_pickup = None;
            state.special_target = None;
            state.arrived_on = Some(arrival);
        }
        info!("{} went from level {} to level {}", player.name, from, to);
        self.levels
            .get_mut(&to)
            .ok_or(GameError::UnknownLevel(to))?
            .add_player(player);

        if let Some(session) = self.sessions.get_mut(&client) {
            session.level = to;
            session.needs_map = true;
            session.last_seen.clear();
            let removes = session.replicator.change_level();
            session.pending.extend(
                removes
                    .into_iter()
                    .filter(|message| !matches!(message, ServerMessage::Remove { id } if *id == player_id)),
            );
        }
        Ok(())
    }

    fn process_logouts(&mut self) -> usize {
        let logouts = std::mem::take(&mut self.pending_logouts);
        let mut removed = 0;
        for client in logouts {
            let Some(session) = self.sessions.remove(&client) else {
                continue;
            };
            if let Some(level) = self.levels.get_mut(&session.level) {
                if let Some(player) = level.remove_player(session.player) {
                    info!("{} (client {}) logged out", player.name, client);
                }
            }
            removed += 1;
        }
        removed
    }

    /// Makes every connection receive its map and full state again.
    pub fn force_resync(&mut self) {
        for session in self.sessions.values_mut() {
            session.replicator.forget();
            session.needs_map = true;
        }
    }

    /// Messages for every connection after the current tick.
    pub fn outbound(&mut self) -> Vec<(ClientId, ServerMessage)> {
        let mut out = std::mem::take(&mut self.outbox);
        let tick = self.tick;

        for (client, session) in self.sessions.iter_mut() {
            let Some(level) = self.levels.get_mut(&session.level) else {
                continue;
            };
            out.extend(session.pending.drain(..).map(|message| (*client, message)));
            if session.needs_map {
                session.needs_map = false;
                out.push((
                    *client,
                    ServerMessage::Map {
                        tiles: level.tile_rows(),
                        level_id: level.id,
                    },
                ));
            }
            if let Some(summary) = death_summary(level, session.player) {
                out.push((*client, ServerMessage::Dead(summary)));
            }

            let frame = build_frame(level, session.player, &mut session.last_seen);
            out.extend(
                session
                    .replicator
                    .diff(tick, frame)
                    .into_iter()
                    .map(|message| (*client, message)),
            );
        }
        out
    }
}

/// The map coordinate a command refers to, if any.
fn command_target(command: &ClientMessage) -> Option<Tile> {
    match command {
        ClientMessage::SetDestination { x, y }
        | ClientMessage::GetItem { x, y }
        | ClientMessage::SetSpecialAbilityLocation { x, y } => Some((*x, *y)),
        _ => None,
    }
}

/// Applies a movement, pickup, special or toggle command to a live player.
fn steer(mob: &mut Mob, command: ClientMessage) {
    let toggle = |mob: &mut Mob, channel: Channel, enabled: bool| {
        if let Some(state) = mob.player_mut() {
            state.toggles.set(channel, enabled);
        }
    };
    match command {
        ClientMessage::SetDestination { x, y } => {
            if let Some(state) = mob.player_mut() {
                state.pending_pickup = None;
            }
            mob.set_destination((x, y));
        }
        ClientMessage::GetItem { x, y } => {
            if let Some(state) = mob.player_mut() {
                state.pending_pickup = Some((x, y));
            }
            if mob.position() != (x, y) {
                mob.set_destination((x, y));
            }
        }
        ClientMessage::SetSpecialAbilityLocation { x, y } => {
            if let Some(state) = mob.player_mut() {
                state.special_target = Some((x, y));
            }
        }
        ClientMessage::ToggleMelee { enabled } => toggle(mob, Channel::Melee, enabled),
        ClientMessage::ToggleRanged { enabled } => toggle(mob, Channel::Ranged, enabled),
        ClientMessage::ToggleMeleeSpell { enabled } => toggle(mob, Channel::MeleeSpell, enabled),
        ClientMessage::ToggleRangedSpell { enabled } => toggle(mob, Channel::RangedSpell, enabled),
        ClientMessage::Login { .. } | ClientMessage::Logout | ClientMessage::Heartbeat => {}
    }
}

/// The one-off summary for a player who died since the last call.
fn death_summary(level: &mut Level, player: EntityId) -> Option<DeathSummary> {
    let mob = level.players.get_mut(&player)?;
    if mob.alive {
        return None;
    }
    let state = mob.player_mut()?;
    if state.death_reported {
        return None;
    }
    state.death_reported = true;
    Some(DeathSummary {
        gold: state.gold,
        kills: state.kills,
        damage_done: state.damage_done,
    })
}

/// Everything `viewer` should know about on its level this tick, keyed by
/// entity id. Entities out of sight are reported at their last seen spot;
/// entities never seen are left out.
fn build_frame(level: &Level, viewer: EntityId, last_seen: &mut HashMap<EntityId, Tile>) -> Vec<(EntityId, ServerMessage)> {
    let Some(me) = level.players.get(&viewer) else {
        return Vec::new();
    };
    let mut frame = Vec::new();
    if let Some(view) = me.player_view() {
        frame.push((me.id, ServerMessage::SelfPlayer(view)));
    }

    let eye = me.position();
    let vision = me.stats.vision;
    let sees = |other: &Mob| {
        !other.invisible
            && chebyshev(eye, other.position()) <= vision
            && level.grid.has_line_of_sight(eye, other.position())
    };

    for other in level.players.values().filter(|other| other.id != viewer) {
        if let Some(mut view) = other.player_view() {
            if observe(other, sees(other), last_seen, &mut view.mob) {
                frame.push((other.id, ServerMessage::Player(view)));
            }
        }
    }
    for monster in level.monsters.values() {
        if let Some(mut view) = monster.monster_view() {
            if observe(monster, sees(monster), last_seen, &mut view.mob) {
                frame.push((monster.id, ServerMessage::Monster(view)));
            }
        }
    }
    for (&(x, y), placed) in &level.loot {
        if let Some(view) = placed.consumable_view(x, y) {
            frame.push((view.id, ServerMessage::Consumable(view)));
        } else if let Some(view) = placed.item_view(x, y) {
            frame.push((view.id, ServerMessage::Item(view)));
        }
    }

    last_seen.retain(|id, _| level.players.contains_key(id) || level.monsters.contains_key(id));
    frame
}

/// Records a sighting, or turns `view` into a ghost at the last seen spot.
/// Returns false if the viewer has never seen `mob`.
fn observe(mob: &Mob, visible: bool, last_seen: &mut HashMap<EntityId, Tile>, view: &mut MobView) -> bool {
    if visible {
        last_seen.insert(mob.id, mob.position());
        return true;
    }
    let Some(&(x, y)) = last_seen.get(&mob.id) else {
        return false;
    };
    view.x = x;
    view.y = y;
    view.dest_x = x;
    view.dest_y = y;
    view.visible = false;
    view.log.clear();
    view.attacks.clear();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "\
############
#<.........#
#..........#
#....##....#
#..........#
#.........>#
############";

    const LOWER: &str = "\
##########
#<.......#
#........#
#........#
##########";

    fn empty_world() -> GameState {
        let config = SimConfig {
            monsters_per_level: 0,
            items_per_level: 0,
            consumables_per_level: 0,
            ..SimConfig::default()
        };
        GameState::new(&[SMALL, LOWER], config, 7).unwrap()
    }

    fn login(game: &mut GameState, client: ClientId, profession: Profession) {
        game.apply_command(
            client,
            ClientMessage::Login {
                name: format!("hero{}", client),
                race: Race::Human,
                profession,
            },
        );
    }

    #[test]
    fn test_stairs_are_linked_in_order() {
        let game = empty_world();
        let top = game.level(1).unwrap();
        assert_eq!(top.stairs_at((10, 5)).and_then(|s| s.link), Some(2));
        assert_eq!(top.stairs_at((1, 1)).and_then(|s| s.link), None);
        let lower = game.level(2).unwrap();
        assert_eq!(lower.stairs_at((1, 1)).and_then(|s| s.link), Some(1));
    }

    #[test]
    fn test_login_is_deferred_to_tick() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        assert_eq!(game.session_count(), 0);

        let report = game.advance_tick().unwrap();
        assert_eq!(report.logins, 1);
        assert_eq!(game.session_count(), 1);
        let player = game.player(1).unwrap();
        assert!(player.alive);
        assert!(game.level(1).unwrap().grid.tile_blocked(player.x, player.y));
    }

    #[test]
    fn test_first_outbound_sends_map_then_self() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Mage);
        game.advance_tick().unwrap();

        let out = game.outbound();
        assert!(matches!(out[0], (1, ServerMessage::Map { level_id: 1, .. })));
        assert!(out
            .iter()
            .any(|(client, message)| *client == 1 && matches!(message, ServerMessage::SelfPlayer(_))));
    }

    #[test]
    fn test_quiet_tick_sends_nothing_new() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        game.advance_tick().unwrap();
        game.outbound();
        game.advance_tick().unwrap();
        let out = game.outbound();
        assert!(out.is_empty(), "unexpected {:?}", out);
    }

    #[test]
    fn test_set_destination_only_writes_fields() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        game.advance_tick().unwrap();

        game.apply_command(1, ClientMessage::SetDestination { x: 5, y: 2 });
        let player = game.player(1).unwrap();
        assert_eq!(player.destination(), (5, 2));
        assert!(player.path.is_empty());
    }

    #[test]
    fn test_toggles_and_special_target() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Rogue);
        game.advance_tick().unwrap();

        game.apply_command(1, ClientMessage::ToggleRanged { enabled: false });
        game.apply_command(1, ClientMessage::SetSpecialAbilityLocation { x: 3, y: 3 });
        let state = game.player(1).unwrap().player().unwrap();
        assert!(!state.toggles.enabled(Channel::Ranged));
        assert!(state.toggles.enabled(Channel::Melee));
        assert_eq!(state.special_target, Some((3, 3)));
    }

    #[test]
    fn test_off_map_coordinates_are_ignored() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        game.advance_tick().unwrap();
        let before = game.player(1).unwrap().destination();

        game.apply_command(1, ClientMessage::SetDestination { x: i32::MIN, y: 0 });
        game.apply_command(1, ClientMessage::GetItem { x: i32::MAX, y: i32::MAX });
        game.apply_command(1, ClientMessage::SetSpecialAbilityLocation { x: -1, y: 3 });
        let player = game.player(1).unwrap();
        assert_eq!(player.destination(), before);
        assert_eq!(player.player().unwrap().pending_pickup, None);
        assert_eq!(player.player().unwrap().special_target, None);

        for _ in 0..5 {
            assert!(game.advance_tick().is_ok());
        }
    }

    #[test]
    fn test_unknown_client_commands_are_ignored() {
        let mut game = empty_world();
        game.apply_command(42, ClientMessage::SetDestination { x: 1, y: 1 });
        game.apply_command(42, ClientMessage::Heartbeat);
        assert!(game.advance_tick().is_ok());
    }

    #[test]
    fn test_logout_removes_player_after_tick() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        game.advance_tick().unwrap();
        let position = game.player(1).unwrap().position();

        game.apply_command(1, ClientMessage::Logout);
        assert_eq!(game.session_count(), 1);
        let report = game.advance_tick().unwrap();
        assert_eq!(report.logouts, 1);
        assert_eq!(game.session_count(), 0);
        let level = game.level(1).unwrap();
        assert!(level.players.is_empty());
        assert!(!level.grid.tile_blocked(position.0, position.1));
    }

    fn teleport(game: &mut GameState, client: ClientId, to: Tile) -> EntityId {
        let session = game.session(client).unwrap();
        let (id, level_id) = (session.player, session.level);
        let level = game.level_mut(level_id).unwrap();
        let mut player = level.remove_player(id).unwrap();
        player.x = to.0;
        player.y = to.1;
        stop(&mut player);
        level.add_player(player);
        id
    }

    fn player_views(out: &[(ClientId, ServerMessage)], to: ClientId) -> Vec<MobView> {
        out.iter()
            .filter_map(|(client, message)| match message {
                ServerMessage::Player(view) if *client == to => Some(view.mob.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_walking_onto_stairs_changes_level() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        game.advance_tick().unwrap();
        game.outbound();

        let id = teleport(&mut game, 1, (9, 5));
        game.apply_command(1, ClientMessage::SetDestination { x: 10, y: 5 });

        let mut moved = false;
        for _ in 0..10 {
            let report = game.advance_tick().unwrap();
            if report.transitions == 1 {
                moved = true;
                break;
            }
        }
        assert!(moved);
        assert_eq!(game.session(1).unwrap().level, 2);
        assert_eq!(game.player(1).unwrap().position(), (1, 1));
        assert!(game.level(1).unwrap().players.is_empty());

        let out = game.outbound();
        let map = out
            .iter()
            .position(|(_, message)| matches!(message, ServerMessage::Map { level_id: 2, .. }));
        let me = out
            .iter()
            .position(|(_, message)| matches!(message, ServerMessage::SelfPlayer(view) if view.mob.id == id));
        assert!(map.is_some());
        assert!(map < me);

        // Standing on the arrival stairs does not bounce the player back.
        for _ in 0..5 {
            assert_eq!(game.advance_tick().unwrap().transitions, 0);
        }
        assert_eq!(game.session(1).unwrap().level, 2);
    }

    #[test]
    fn test_dead_summary_sent_once() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        game.advance_tick().unwrap();
        game.outbound();

        let player = game.player_mut(1).unwrap();
        crate::mob::kill(player, 2);

        let deaths = |out: &[(ClientId, ServerMessage)]| {
            out.iter()
                .filter(|(_, message)| matches!(message, ServerMessage::Dead(_)))
                .count()
        };
        game.advance_tick().unwrap();
        assert_eq!(deaths(&game.outbound()), 1);
        game.advance_tick().unwrap();
        assert_eq!(deaths(&game.outbound()), 0);
    }

    #[test]
    fn test_dead_player_ignores_commands() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        game.advance_tick().unwrap();
        let player = game.player_mut(1).unwrap();
        crate::mob::kill(player, 1);
        let before = game.player(1).unwrap().destination();

        game.apply_command(1, ClientMessage::SetDestination { x: 8, y: 4 });
        assert_eq!(game.player(1).unwrap().destination(), before);
    }

    #[test]
    fn test_other_player_becomes_ghost_out_of_sight() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        login(&mut game, 2, Profession::Fighter);
        game.advance_tick().unwrap();

        teleport(&mut game, 1, (2, 2));
        teleport(&mut game, 2, (8, 2));
        let out = game.outbound();
        let seen = player_views(&out, 1);
        assert_eq!(seen.len(), 1);
        assert_eq!((seen[0].x, seen[0].y, seen[0].visible), (8, 2, true));

        // Nine tiles apart is past a human's vision.
        teleport(&mut game, 1, (1, 4));
        teleport(&mut game, 2, (10, 4));
        game.advance_tick().unwrap();
        let out = game.outbound();
        let ghost = player_views(&out, 1);
        assert_eq!(ghost.len(), 1);
        assert_eq!((ghost[0].x, ghost[0].y, ghost[0].visible), (8, 2, false));
    }

    #[test]
    fn test_never_seen_player_is_not_sent() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        login(&mut game, 2, Profession::Fighter);
        game.advance_tick().unwrap();

        teleport(&mut game, 1, (1, 4));
        teleport(&mut game, 2, (10, 4));
        assert!(player_views(&game.outbound(), 1).is_empty());
    }

    #[test]
    fn test_invisible_player_is_hidden() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        login(&mut game, 2, Profession::Rogue);
        game.advance_tick().unwrap();

        teleport(&mut game, 1, (2, 2));
        teleport(&mut game, 2, (4, 2));
        game.player_mut(2).unwrap().invisible = true;
        assert!(player_views(&game.outbound(), 1).is_empty());
    }

    #[test]
    fn test_resync_resends_everything() {
        let mut game = empty_world();
        login(&mut game, 1, Profession::Fighter);
        game.advance_tick().unwrap();
        let first = game.outbound().len();
        game.advance_tick().unwrap();
        assert!(game.outbound().is_empty());

        game.force_resync();
        game.advance_tick().unwrap();
        assert_eq!(game.outbound().len(), first);
    }

    #[test]
    fn test_bundled_levels_load() {
        let game = GameState::with_bundled_levels(SimConfig::default(), 1).unwrap();
        assert!(game.level(1).is_some());
        assert!(game.level(2).is_some());
        assert!(!game.level(1).unwrap().monsters.is_empty());
    }
}
