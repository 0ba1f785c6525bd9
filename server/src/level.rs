//! One dungeon floor: its grid, entity registries, loot and stairs.

use crate::config::SimConfig;
use crate::dice::GameRng;
use crate::error::GameError;
use crate::grid::Grid;
use crate::item::{random_loot, ConsumableKind, Loot, Placed};
use crate::mob::{self, Mob, TickContext};
use crate::monster::MonsterKind;
use crate::utils::{chebyshev, EntityId, IdAllocator, LevelId, Tile};
use log::{debug, info};
use rand::Rng;
use shared::{DOWN_STAIRS_GLYPH, FLOOR_GLYPH, UP_STAIRS_GLYPH, WALL_GLYPH};
use std::collections::BTreeMap;

/// Entities keyed by id and iterated in id order. Ids are allocated in
/// increasing order, so this matches spawn order, but a player arriving from
/// another level keeps its older id and sorts ahead of later arrivals.
pub type Registry = BTreeMap<EntityId, Mob>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stairs {
    pub x: i32,
    pub y: i32,
    pub down: bool,
    pub link: Option<LevelId>,
}

/// Criteria for [`find_nearest_eligible`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetQuery {
    pub x: i32,
    pub y: i32,
    pub range: i32,
    pub min_range: i32,
    pub require_sight: bool,
}

/// What a pickup did to the mob standing on the tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pickup {
    Consumed { id: EntityId, magnitude: i32 },
    Equipped { id: EntityId, dropped: Option<EntityId> },
}

/// Nearest living entity in `registry` matching `query`, by Chebyshev
/// distance.
///
/// Unlike a plain first-match scan, the whole registry is searched and the
/// closest candidate wins. Equally near candidates resolve to the one met
/// first in registry order.
/// That tie-break is arbitrary but stable, which keeps target selection
/// reproducible.
pub fn find_nearest_eligible(registry: &Registry, grid: &Grid, query: &TargetQuery) -> Option<EntityId> {
    let origin = (query.x, query.y);
    let mut best: Option<(i32, EntityId)> = None;
    for mob in registry.values() {
        if !mob.alive || (query.require_sight && mob.invisible) {
            continue;
        }
        let distance = chebyshev(origin, mob.position());
        if distance > query.range || distance < query.min_range {
            continue;
        }
        if best.is_some_and(|(nearest, _)| distance >= nearest) {
            continue;
        }
        if query.require_sight && query.range > 1 && !grid.has_line_of_sight(origin, mob.position()) {
            continue;
        }
        best = Some((distance, mob.id));
    }
    best.map(|(_, id)| id)
}

#[derive(Debug, Clone)]
pub struct Level {
    pub id: LevelId,
    /// 1 for the top floor; drives monster and loot strength.
    pub depth: u32,
    pub grid: Grid,
    pub players: Registry,
    pub monsters: Registry,
    pub loot: BTreeMap<Tile, Placed>,
    pub stairs: Vec<Stairs>,
    rows: Vec<String>,
}

impl Level {
    /// Builds a level from an ASCII map. Every row must have the same width;
    /// stairs start unlinked.
    pub fn parse(id: LevelId, text: &str) -> Result<Self, GameError> {
        let rows: Vec<&str> = text.lines().map(str::trim_end).filter(|row| !row.is_empty()).collect();
        let width = rows.first().map_or(0, |row| row.chars().count());
        if width == 0 {
            return Err(GameError::MapParse {
                line: 1,
                reason: "map is empty".to_string(),
            });
        }

        let mut grid = Grid::new(width as i32, rows.len() as i32);
        let mut stairs = Vec::new();
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width {
                return Err(GameError::MapParse {
                    line: y + 1,
                    reason: format!("expected {} columns, found {}", width, row.chars().count()),
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                let (x, y) = (x as i32, y as i32);
                match glyph {
                    WALL_GLYPH => grid.set_wall(x, y, true),
                    FLOOR_GLYPH => {}
                    UP_STAIRS_GLYPH | DOWN_STAIRS_GLYPH => stairs.push(Stairs {
                        x,
                        y,
                        down: glyph == DOWN_STAIRS_GLYPH,
                        link: None,
                    }),
                    other => {
                        return Err(GameError::MapParse {
                            line: y as usize + 1,
                            reason: format!("unknown tile {:?}", other),
                        })
                    }
                }
            }
        }

        Ok(Self {
            id,
            depth: id,
            grid,
            players: Registry::new(),
            monsters: Registry::new(),
            loot: BTreeMap::new(),
            stairs,
            rows: rows.iter().map(|row| row.to_string()).collect(),
        })
    }

    /// The map as sent to clients.
    pub fn tile_rows(&self) -> Vec<String> {
        self.rows.clone()
    }

    /// Recomputes occupancy from the wall layer plus every living entity.
    pub fn rebuild_occupancy(&mut self) {
        self.grid.clear_occupants();
        for mob in self.monsters.values().chain(self.players.values()) {
            if mob.alive {
                self.grid.mark_occupied(mob.x, mob.y);
            }
        }
    }

    /// True if the tile is blocked in the occupancy grid or a living player
    /// stands on it. Players are checked directly because the grid can lag
    /// behind moves made earlier in the same tick.
    pub fn location_blocked(&self, x: i32, y: i32) -> bool {
        self.grid.tile_blocked(x, y)
            || self
                .players
                .values()
                .any(|player| player.alive && player.position() == (x, y))
    }

    pub fn player_within(&self, from: Tile, range: i32) -> bool {
        self.players
            .values()
            .any(|player| player.alive && chebyshev(from, player.position()) <= range)
    }

    pub fn stairs_at(&self, tile: Tile) -> Option<&Stairs> {
        self.stairs.iter().find(|stairs| (stairs.x, stairs.y) == tile)
    }

    /// Stairs on this level that lead back to `from`.
    pub fn stairs_to(&self, from: LevelId) -> Option<&Stairs> {
        self.stairs.iter().find(|stairs| stairs.link == Some(from))
    }

    pub fn place_loot(&mut self, tile: Tile, loot: Loot) {
        self.loot.insert(tile, Placed::new(loot));
    }

    /// Uses whatever lies under `mob`. A consumable is applied and flagged
    /// gone; an item is swapped with the one in the same equip slot, which
    /// is dropped on the tile.
    pub fn pickup_at(&mut self, mob: &mut Mob) -> Option<Pickup> {
        let tile = mob.position();
        let consumable = match self.loot.get(&tile) {
            Some(placed) if !placed.gone => match &placed.loot {
                Loot::Consumable(consumable) => Some(consumable.clone()),
                Loot::Item(_) => None,
            },
            _ => return None,
        };

        if let Some(consumable) = consumable {
            let magnitude = consumable.magnitude;
            match consumable.kind {
                ConsumableKind::HealthPotion => {
                    mob.hp = (mob.hp + magnitude).min(mob.max_hp());
                    mob.log.push(format!("drank a health potion (+{})", magnitude));
                }
                ConsumableKind::ActionPotion => {
                    mob.ap = (mob.ap + magnitude).min(mob.max_ap());
                    mob.log.push(format!("drank an action potion (+{})", magnitude));
                }
            }
            if let Some(placed) = self.loot.get_mut(&tile) {
                placed.gone = true;
            }
            return Some(Pickup::Consumed {
                id: consumable.id,
                magnitude,
            });
        }

        let Some(Placed {
            loot: Loot::Item(item),
            ..
        }) = self.loot.remove(&tile)
        else {
            return None;
        };
        let id = item.id;
        mob.log.push(format!("picked up {}", item.description()));
        let dropped = mob.equipment.equip(item);
        let dropped_id = dropped.as_ref().map(|old| old.id);
        if let Some(old) = dropped {
            self.loot.insert(tile, Placed::new(Loot::Item(old)));
        }
        Some(Pickup::Equipped {
            id,
            dropped: dropped_id,
        })
    }

    /// Drops loot flagged gone during the previous tick.
    pub fn purge_gone_loot(&mut self) {
        self.loot.retain(|_, placed| !placed.gone);
    }

    /// Clears per-tick output and stale loot before a new tick starts.
    pub fn begin_tick(&mut self) {
        self.purge_gone_loot();
        for mob in self.monsters.values_mut().chain(self.players.values_mut()) {
            mob.log.clear();
            mob.attacks.clear();
        }
    }

    fn spawn_safe(&self, tile: Tile) -> bool {
        !self.location_blocked(tile.0, tile.1)
            && !self.loot.contains_key(&tile)
            && self.stairs_at(tile).is_none()
    }

    /// Random search for a free floor tile, bounded by `attempts`.
    pub fn random_empty_tile(&self, rng: &mut GameRng, attempts: u32) -> Result<Tile, GameError> {
        let (width, height) = (self.grid.width(), self.grid.height());
        if width > 0 && height > 0 {
            for _ in 0..attempts {
                let tile = (rng.gen_range(0..width), rng.gen_range(0..height));
                if self.spawn_safe(tile) {
                    return Ok(tile);
                }
            }
        }
        Err(GameError::NoEmptyTile {
            level: self.id,
            attempts,
        })
    }

    /// Closest free tile to `around`, searched ring by ring. Falls back to a
    /// random search when the neighbourhood is full.
    pub fn free_tile_near(&self, around: Tile, rng: &mut GameRng, attempts: u32) -> Result<Tile, GameError> {
        if !self.location_blocked(around.0, around.1) {
            return Ok(around);
        }
        for radius in 1i32..=4 {
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx.abs().max(dy.abs()) != radius {
                        continue;
                    }
                    let tile = (around.0 + dx, around.1 + dy);
                    if !self.location_blocked(tile.0, tile.1) {
                        return Ok(tile);
                    }
                }
            }
        }
        self.random_empty_tile(rng, attempts)
    }

    /// Spawns this level's monsters and loot.
    pub fn populate(&mut self, ids: &mut IdAllocator, rng: &mut GameRng, config: &SimConfig) -> Result<(), GameError> {
        for _ in 0..config.monsters_per_level {
            let spawn = self.random_empty_tile(rng, config.spawn_attempts)?;
            let kind = MonsterKind::for_depth(self.depth, rng);
            let monster = Mob::new_monster(ids.allocate(), kind, spawn, ids, rng);
            self.add_monster(monster);
        }
        for _ in 0..config.items_per_level {
            let tile = self.random_empty_tile(rng, config.spawn_attempts)?;
            let loot = random_loot(rng, ids, self.depth, 0.0);
            self.place_loot(tile, loot);
        }
        for _ in 0..config.consumables_per_level {
            let tile = self.random_empty_tile(rng, config.spawn_attempts)?;
            let loot = random_loot(rng, ids, self.depth, 1.0);
            self.place_loot(tile, loot);
        }
        info!(
            "Level {} populated: {} monsters, {} loot",
            self.id,
            self.monsters.len(),
            self.loot.len()
        );
        Ok(())
    }

    pub fn add_monster(&mut self, monster: Mob) {
        if monster.alive {
            self.grid.mark_occupied(monster.x, monster.y);
        }
        self.monsters.insert(monster.id, monster);
    }

    pub fn add_player(&mut self, player: Mob) {
        if player.alive {
            self.grid.mark_occupied(player.x, player.y);
        }
        self.players.insert(player.id, player);
    }

    pub fn remove_player(&mut self, id: EntityId) -> Option<Mob> {
        let player = self.players.remove(&id)?;
        if player.alive {
            self.grid.vacate(player.x, player.y);
        }
        Some(player)
    }

    /// Runs every monster's update. Each monster leaves the registry while
    /// it updates and always returns to it, even when the update fails.
    pub fn update_monsters(&mut self, ctx: &mut TickContext) -> Result<bool, GameError> {
        let ids: Vec<EntityId> = self.monsters.keys().copied().collect();
        let mut moved = false;
        for id in ids {
            let Some(mut monster) = self.monsters.remove(&id) else {
                continue;
            };
            let result = mob::update_monster(&mut monster, self, ctx);
            self.monsters.insert(id, monster);
            moved |= result?;
        }
        Ok(moved)
    }

    pub fn update_players(&mut self, ctx: &mut TickContext) -> Result<bool, GameError> {
        let ids: Vec<EntityId> = self.players.keys().copied().collect();
        let mut moved = false;
        for id in ids {
            let Some(mut player) = self.players.remove(&id) else {
                continue;
            };
            let result = mob::update_player(&mut player, self, ctx);
            self.players.insert(id, player);
            moved |= result?;
        }
        if moved {
            debug!("Level {}: occupancy changed on tick {}", self.id, ctx.tick);
        }
        Ok(moved)
    }
}
