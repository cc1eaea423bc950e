//! Entity lifecycle: spawn, per-tick iteration, cull.
//!
//! Each group owns its live entities in insertion order; that order is the
//! tie-break for everything that happens within a tick. Tiles only hold
//! ids, so every removal goes through [`EntityGroup::cull`] or
//! [`EntityGroup::reset`], which keep tiles and the datastore in step.

use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, DerefMut};

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::action::{Action, Style};
use crate::config::{Config, PlayerSpawn};
use crate::datastore::Datastore;
use crate::entity::{Entity, EntityId};
use crate::error::{RealmError, Result};
use crate::map::Map;
use crate::math::{Fixed, Position};
use crate::npc::{self, Disposition};

/// Entities removed during one tick's cull phase, with their final state.
///
/// Not `Clone`: a culled set is handed out once and consumed once.
#[derive(Debug, PartialEq, Eq)]
pub struct Culled {
    tick: u64,
    entities: BTreeMap<EntityId, Entity>,
}

impl Culled {
    /// Empty set for `tick`.
    #[must_use]
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            entities: BTreeMap::new(),
        }
    }

    /// Tick that produced the set.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Culled ids, ascending.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Whether `id` was culled.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Final state of a culled entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Number of culled entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Nothing was culled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Absorb another set from the same tick.
    pub fn merge(&mut self, other: Self) {
        self.entities.extend(other.entities);
    }
}

/// Insertion-ordered live entities with an id index.
#[derive(Debug, Clone, Default)]
pub struct EntityGroup {
    entities: Vec<Entity>,
    index: HashMap<EntityId, usize>,
}

impl EntityGroup {
    /// Empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity to the live mapping, its tile, and the Entity table.
    ///
    /// # Errors
    /// [`RealmError::DuplicateSpawn`] if the id is already live,
    /// [`RealmError::InvalidPosition`] if its position is off the map.
    pub fn spawn_entity(&mut self, mut entity: Entity, map: &mut Map, ds: &mut Datastore) -> Result<()> {
        let id = entity.id();
        if self.index.contains_key(&id) {
            return Err(RealmError::DuplicateSpawn(id));
        }
        map.add_entity(entity.pos(), id)?;
        entity.insert_row(&mut ds.entities);
        self.index.insert(id, self.entities.len());
        self.entities.push(entity);
        Ok(())
    }

    /// Live entity by id.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.index.get(&id).map(|&i| &self.entities[i])
    }

    /// Mutable live entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.index.get(&id).map(|&i| &mut self.entities[i])
    }

    /// Two distinct live entities at once. `None` if either is absent or
    /// the ids are equal.
    pub fn pair_mut(&mut self, a: EntityId, b: EntityId) -> Option<(&mut Entity, &mut Entity)> {
        let i = *self.index.get(&a)?;
        let j = *self.index.get(&b)?;
        if i == j {
            return None;
        }
        if i < j {
            let (left, right) = self.entities.split_at_mut(j);
            Some((&mut left[i], &mut right[0]))
        } else {
            let (left, right) = self.entities.split_at_mut(i);
            Some((&mut right[0], &mut left[j]))
        }
    }

    /// Whether `id` is live.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// No live entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Live entities in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Mutable live entities in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    /// Live ids in insertion order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(Entity::id).collect()
    }

    fn reindex(&mut self) {
        self.index = self
            .entities
            .iter()
            .enumerate()
            .map(|(i, entity)| (entity.id(), i))
            .collect();
    }

    /// Remove every dead entity from its tile, the datastore and the live
    /// mapping.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] if an entity sits off the map.
    pub fn cull(&mut self, map: &mut Map, ds: &mut Datastore, config: &Config, tick: u64) -> Result<Culled> {
        let mut culled = Culled::new(tick);
        if self.entities.iter().all(Entity::alive) {
            return Ok(culled);
        }

        let (dead, live): (Vec<Entity>, Vec<Entity>) =
            std::mem::take(&mut self.entities).into_iter().partition(|e| !e.alive());
        self.entities = live;
        self.reindex();

        for mut entity in dead {
            map.remove_entity(entity.pos(), entity.id())?;
            if config.item_system_enabled {
                entity.inventory.destroy(ds);
            }
            entity.delete_row(&mut ds.entities);
            culled.entities.insert(entity.id(), entity);
        }
        debug!(tick, count = culled.len(), "Culled entities");
        Ok(culled)
    }

    /// Remove every entity, deleting rows and items.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] if an entity sits off the map.
    pub fn reset(&mut self, map: &mut Map, ds: &mut Datastore) -> Result<()> {
        for mut entity in self.entities.drain(..) {
            map.remove_entity(entity.pos(), entity.id())?;
            entity.inventory.destroy(ds);
            entity.delete_row(&mut ds.entities);
        }
        self.index.clear();
        Ok(())
    }
}

/// Evenly spaced positions around the grass ring at the edge of the
/// playable area, shuffled.
pub fn concurrent_positions<R: Rng + ?Sized>(config: &Config, rng: &mut R) -> Vec<Position> {
    let low = config.map_border;
    let high = config.map_border + config.map_center;

    let mut ring = Vec::with_capacity(4 * config.map_center as usize);
    ring.extend((low..high).map(|c| Position::new(low, c)));
    ring.extend((low..high).map(|r| Position::new(r, high)));
    ring.extend((low + 1..=high).rev().map(|c| Position::new(high, c)));
    ring.extend((low + 1..=high).rev().map(|r| Position::new(r, low)));

    let n = config.player_n as usize;
    if n == 0 || ring.is_empty() {
        return Vec::new();
    }
    let mut positions: Vec<Position> = (0..n).map(|i| ring[i * ring.len() / n % ring.len()]).collect();
    positions.shuffle(rng);
    positions
}

/// Players, ids `1..=player_n`.
#[derive(Debug, Clone, Default)]
pub struct PlayerManager {
    group: EntityGroup,
}

impl Deref for PlayerManager {
    type Target = EntityGroup;

    fn deref(&self) -> &Self::Target {
        &self.group
    }
}

impl DerefMut for PlayerManager {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.group
    }
}

impl PlayerManager {
    /// Empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn every configured player not already live.
    ///
    /// # Errors
    /// Propagates spawn errors.
    pub fn spawn<R: Rng + ?Sized>(&mut self, config: &Config, map: &mut Map, ds: &mut Datastore, rng: &mut R) -> Result<()> {
        let positions = match &config.player_spawn {
            PlayerSpawn::Concurrent => concurrent_positions(config, rng),
            PlayerSpawn::Fixed(list) => list.iter().copied().map(Position::from).collect(),
        };
        for (i, pos) in positions.into_iter().take(config.player_n as usize).enumerate() {
            let id = i as EntityId + 1;
            if self.contains(id) {
                continue;
            }
            self.spawn_entity(Entity::player(id, pos, config), map, ds)?;
        }
        Ok(())
    }
}

/// NPCs, ids `-1, -2, ...`.
#[derive(Debug, Clone)]
pub struct NpcManager {
    group: EntityGroup,
    next_id: EntityId,
    spawn_dangers: Vec<Fixed>,
}

impl Default for NpcManager {
    fn default() -> Self {
        Self {
            group: EntityGroup::default(),
            next_id: -1,
            spawn_dangers: Vec::new(),
        }
    }
}

impl Deref for NpcManager {
    type Target = EntityGroup;

    fn deref(&self) -> &Self::Target {
        &self.group
    }
}

impl DerefMut for NpcManager {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.group
    }
}

impl NpcManager {
    /// Empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every NPC and restart ids at -1.
    ///
    /// # Errors
    /// Propagates [`EntityGroup::reset`] errors.
    pub fn reset(&mut self, map: &mut Map, ds: &mut Datastore) -> Result<()> {
        self.group.reset(map, ds)?;
        self.next_id = -1;
        self.spawn_dangers.clear();
        Ok(())
    }

    /// Id the next spawned NPC will get.
    #[must_use]
    pub const fn next_id(&self) -> EntityId {
        self.next_id
    }

    /// Queue a danger value to respawn at.
    pub fn push_danger(&mut self, danger: Fixed) {
        self.spawn_dangers.push(danger);
    }

    /// Dangers waiting to be respawned.
    #[must_use]
    pub fn spawn_dangers(&self) -> &[Fixed] {
        &self.spawn_dangers
    }

    /// Top up the NPC population. Returns how many spawned.
    ///
    /// Each attempt reuses a queued danger when one is available, otherwise
    /// draws a uniform interior position. Attempts landing on uninhabitable
    /// tiles or below the passive threshold spawn nothing.
    ///
    /// # Errors
    /// Propagates spawn errors.
    pub fn default_spawn<R: Rng + ?Sized>(
        &mut self,
        map: &mut Map,
        ds: &mut Datastore,
        config: &Config,
        rng: &mut R,
    ) -> Result<u32> {
        if !config.npc_system_enabled {
            return Ok(0);
        }
        let (low, high) = config.playable_range();
        let mut spawned = 0;
        for _ in 0..config.npc_spawn_attempts {
            if self.len() >= config.npc_n as usize {
                break;
            }
            let pos = match self.spawn_dangers.pop() {
                Some(danger) => npc::spawn_position(config, danger, rng),
                None => Position::new(rng.gen_range(low..high), rng.gen_range(low..high)),
            };
            if let Some(entity) = npc::build_npc(self.next_id, pos, map, ds, config, rng) {
                self.group.spawn_entity(entity, map, ds)?;
                self.next_id -= 1;
                spawned += 1;
            }
        }
        if self.len() < config.npc_n as usize {
            debug!(
                live = self.len(),
                target = config.npc_n,
                "NPC spawn attempts exhausted, retrying next tick"
            );
        }
        Ok(spawned)
    }

    /// Spawn one NPC at an explicit position with a fixed level and no
    /// equipment.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] if the tile is off the map or
    /// uninhabitable.
    pub fn spawn_at(
        &mut self,
        pos: Position,
        disposition: Disposition,
        style: Style,
        level: u32,
        map: &mut Map,
        ds: &mut Datastore,
        config: &Config,
    ) -> Result<EntityId> {
        if !map.habitable(pos.row, pos.col) {
            return Err(RealmError::InvalidPosition {
                row: pos.row,
                col: pos.col,
            });
        }
        let id = self.next_id;
        let mut entity = Entity::npc(id, pos, config, disposition, style, npc::danger(config, pos));
        if level > 0 {
            entity.skills.set_level(style, level, config);
        }
        self.group.spawn_entity(entity, map, ds)?;
        self.next_id -= 1;
        Ok(id)
    }

    /// Every NPC's decision for this tick, in insertion order.
    pub fn actions<R: Rng + ?Sized>(
        &self,
        map: &mut Map,
        ds: &Datastore,
        config: &Config,
        rng: &mut R,
    ) -> Vec<(EntityId, Action)> {
        self.group
            .iter()
            .map(|entity| (entity.id(), npc::decide(entity, map, ds, config, rng)))
            .collect()
    }
}
