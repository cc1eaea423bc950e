//! Realm orchestration.
//!
//! The [`Realm`] owns the map, the datastore, the event log and both entity
//! managers, and advances them one tick at a time. Each tick runs, in order:
//!
//! 1. NPC decisions
//! 2. Movement (players, then NPCs)
//! 3. Attacks (players, then NPCs)
//! 4. Per-entity update (players, then NPCs)
//! 5. Cull (players, then NPCs)
//! 6. Tile regeneration
//! 7. NPC respawn
//!
//! Within a phase, entities act in insertion order.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use realm_core::prelude::*;
//!
//! let config = Config::small().with_npcs(0);
//! let terrain = Terrain::filled(config.map_size as usize, Material::Grass);
//! let mut rng = StdRng::seed_from_u64(7);
//!
//! let mut realm = Realm::new(config).unwrap();
//! realm.reset(&terrain, &mut rng).unwrap();
//! let culled = realm.step(&BTreeMap::new(), &mut rng).unwrap();
//! assert_eq!(realm.tick(), 1);
//! assert!(culled.is_empty());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::action::{Action, Attack, Direction, Style};
use crate::combat;
use crate::config::Config;
use crate::datastore::{Datastore, EntityAttr, EventAttr, Frame, ItemAttr, Table, TileAttr};
use crate::entity::{Entity, EntityId};
use crate::entity_manager::{Culled, EntityGroup, NpcManager, PlayerManager};
use crate::error::{RealmError, Result};
use crate::event_log::{EventCode, EventFields, EventLog};
use crate::map::Map;
use crate::material::{Material, Terrain};
use crate::math::Position;
use crate::npc::Disposition;

/// Frozen copy of the four tables between ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// Live entity rows.
    pub entities: Frame<EntityAttr>,
    /// Existing item rows.
    pub items: Frame<ItemAttr>,
    /// Tile rows, row-major.
    pub tiles: Frame<TileAttr>,
    /// Every event recorded this episode.
    pub events: Frame<EventAttr>,
    /// Live player ids, then live NPC ids, each in insertion order.
    pub alive: Vec<EntityId>,
}

/// Full table contents plus visible tile materials, for replay and
/// rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldDump {
    /// Tick the dump was taken at.
    pub tick: u64,
    /// Side length of the map.
    pub map_size: i32,
    /// Visible material of every tile, row-major.
    pub materials: Vec<Material>,
    /// Entity table.
    pub entities: Table<EntityAttr>,
    /// Item table.
    pub items: Table<ItemAttr>,
    /// Tile table.
    pub tiles: Table<TileAttr>,
    /// Event table.
    pub events: Table<EventAttr>,
}

impl WorldDump {
    /// Encode with bincode.
    ///
    /// # Errors
    /// [`RealmError::Serialization`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| RealmError::Serialization(format!("Failed to encode dump: {e}")))
    }

    /// Decode from bincode.
    ///
    /// # Errors
    /// [`RealmError::Serialization`] if the bytes are not a dump.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| RealmError::Serialization(format!("Failed to decode dump: {e}")))
    }

    /// Visible material at `(row, col)`, `None` off the map.
    #[must_use]
    pub fn material(&self, row: i32, col: i32) -> Option<Material> {
        if row < 0 || col < 0 || row >= self.map_size || col >= self.map_size {
            return None;
        }
        self.materials
            .get((row * self.map_size + col) as usize)
            .copied()
    }
}

/// The simulated world.
#[derive(Debug, Clone)]
pub struct Realm {
    config: Config,
    tick: u64,
    map: Map,
    ds: Datastore,
    log: EventLog,
    players: PlayerManager,
    npcs: NpcManager,
    ready: bool,
}

impl Realm {
    /// Allocate a realm for `config`. Call [`Realm::reset`] before stepping.
    ///
    /// # Errors
    /// [`RealmError::InvalidConfig`] if the configuration is inconsistent.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            map: Map::new(&config),
            config,
            tick: 0,
            ds: Datastore::new(),
            log: EventLog::new(),
            players: PlayerManager::new(),
            npcs: NpcManager::new(),
            ready: false,
        })
    }

    /// Start a new episode on `terrain`.
    ///
    /// Clears every table and the event log, loads the terrain, spawns all
    /// players and the first wave of NPCs.
    ///
    /// # Errors
    /// [`RealmError::TerrainShape`] if the terrain does not match the map
    /// size; spawn errors otherwise.
    pub fn reset<R: Rng + ?Sized>(&mut self, terrain: &Terrain, rng: &mut R) -> Result<()> {
        self.ready = false;
        self.players.reset(&mut self.map, &mut self.ds)?;
        self.npcs.reset(&mut self.map, &mut self.ds)?;
        self.ds.clear();
        self.log.reset();
        self.tick = 0;

        self.map.reset(terrain, &self.config, &mut self.ds.tiles)?;
        self.players.spawn(&self.config, &mut self.map, &mut self.ds, rng)?;
        self.npcs.default_spawn(&mut self.map, &mut self.ds, &self.config, rng)?;
        self.ready = true;

        info!(
            map_size = self.map.size(),
            players = self.players.len(),
            npcs = self.npcs.len(),
            "Realm reset"
        );
        Ok(())
    }

    /// Replace the configuration, ending the current episode. Takes effect
    /// at the next reset.
    ///
    /// # Errors
    /// [`RealmError::InvalidConfig`] if the configuration is inconsistent.
    pub fn set_config(&mut self, config: Config) -> Result<()> {
        config.validate()?;
        self.players.reset(&mut self.map, &mut self.ds)?;
        self.npcs.reset(&mut self.map, &mut self.ds)?;
        if config.map_size != self.map.size() {
            self.map = Map::new(&config);
        }
        self.config = config;
        self.ready = false;
        Ok(())
    }

    /// Advance one tick.
    ///
    /// `actions` holds player intents by id; players without an entry stay
    /// idle. Returns every entity culled this tick.
    ///
    /// # Errors
    /// [`RealmError::NotReset`] before the first reset. Any lower-level
    /// error abandons the tick.
    pub fn step<R: Rng + ?Sized>(&mut self, actions: &BTreeMap<EntityId, Action>, rng: &mut R) -> Result<Culled> {
        if !self.ready {
            return Err(RealmError::NotReset);
        }
        self.tick += 1;
        let tick = self.tick;

        for &id in actions.keys() {
            if !self.players.contains(id) {
                warn!(tick, entity = id, "Action for unknown player ignored");
            }
        }
        let player_actions: Vec<(EntityId, Action)> = self
            .players
            .ids()
            .into_iter()
            .filter_map(|id| actions.get(&id).map(|action| (id, *action)))
            .collect();
        let npc_actions = self.npcs.actions(&mut self.map, &self.ds, &self.config, rng);

        for (id, action) in &player_actions {
            if let Some(direction) = action.movement {
                move_entity(&mut self.players, &mut self.map, &mut self.ds, *id, direction)?;
            }
        }
        for (id, action) in &npc_actions {
            if let Some(direction) = action.movement {
                move_entity(&mut self.npcs, &mut self.map, &mut self.ds, *id, direction)?;
            }
        }

        if self.config.combat_system_enabled {
            for (id, action) in player_actions.iter().chain(&npc_actions) {
                if let Some(attack) = action.attack {
                    self.resolve_attack(*id, attack)?;
                }
            }
        }

        for entity in self.players.iter_mut() {
            entity.update(&mut self.map, &mut self.ds, &mut self.log, &self.config, tick)?;
        }
        for entity in self.npcs.iter_mut() {
            entity.update(&mut self.map, &mut self.ds, &mut self.log, &self.config, tick)?;
        }

        let mut culled = self.players.cull(&mut self.map, &mut self.ds, &self.config, tick)?;
        let npc_culled = self.npcs.cull(&mut self.map, &mut self.ds, &self.config, tick)?;
        for id in npc_culled.ids() {
            if let Some(npc) = npc_culled.get(id) {
                self.npcs.push_danger(npc.spawn_danger());
            }
        }
        culled.merge(npc_culled);
        #[cfg(feature = "debug-validation")]
        debug_assert!(self.occupancy_consistent(), "tile occupants out of sync at tick {tick}");

        self.map.step(&mut self.ds.tiles);
        self.npcs.default_spawn(&mut self.map, &mut self.ds, &self.config, rng)?;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            debug!(tick, state_hash = hash, "Realm state hash");
        }

        Ok(culled)
    }

    fn resolve_attack(&mut self, attacker_id: EntityId, attack: Attack) -> Result<()> {
        let tick = self.tick;
        let Self {
            config,
            ds,
            log,
            players,
            npcs,
            ..
        } = self;

        let target_id = attack.target;
        let pair = match (attacker_id > 0, target_id > 0) {
            (true, true) => players.pair_mut(attacker_id, target_id),
            (false, false) => npcs.pair_mut(attacker_id, target_id),
            (true, false) => players.get_mut(attacker_id).zip(npcs.get_mut(target_id)),
            (false, true) => npcs.get_mut(attacker_id).zip(players.get_mut(target_id)),
        };
        let Some((attacker, target)) = pair else {
            warn!(tick, attacker = attacker_id, target = target_id, "Attack on invalid target ignored");
            return Ok(());
        };

        if !attacker.alive() || !target.alive() {
            return Ok(());
        }
        if attacker.is_npc() && target.is_npc() && !config.npc_allow_attack_other_npcs {
            return Ok(());
        }
        let distance = attacker.pos().linf(target.pos());
        if distance > attack.style.reach(config) {
            debug!(tick, attacker = attacker_id, target = target_id, distance, "Attack out of range");
            return Ok(());
        }

        let outcome = combat::attack(config, ds, attacker, target, attack.style, tick);
        if attacker.is_player() {
            record_hit(log, tick, attacker, target, attack.style, outcome)?;
        }
        if outcome.killed && config.exchange_system_enabled {
            loot_gold(log, ds, tick, attacker, target)?;
        }
        Ok(())
    }

    #[cfg(feature = "debug-validation")]
    fn occupancy_consistent(&self) -> bool {
        let listed: usize = self.map.tiles().iter().map(|tile| tile.occupants().len()).sum();
        listed == self.players.len() + self.npcs.len()
            && self.players.iter().chain(self.npcs.iter()).all(|entity| {
                let pos = entity.pos();
                self.map
                    .tile(pos.row, pos.col)
                    .is_ok_and(|tile| tile.occupants().contains(&entity.id()))
            })
    }

    /// Reject a culled set produced by an earlier tick.
    ///
    /// # Errors
    /// [`RealmError::StaleCulledSet`] if `culled` is not from the current
    /// tick.
    pub fn check_culled(&self, culled: &Culled) -> Result<()> {
        if culled.tick() == self.tick {
            Ok(())
        } else {
            Err(RealmError::StaleCulledSet {
                produced: culled.tick(),
                current: self.tick,
            })
        }
    }

    /// Spawn an NPC at an explicit position.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] if the tile is off the map or
    /// uninhabitable.
    pub fn spawn_npc(&mut self, pos: Position, disposition: Disposition, style: Style, level: u32) -> Result<EntityId> {
        self.npcs
            .spawn_at(pos, disposition, style, level, &mut self.map, &mut self.ds, &self.config)
    }

    /// Append an event at the current tick.
    ///
    /// # Errors
    /// [`RealmError::MalformedEvent`] if the fields do not fit the code.
    pub fn record_event(&mut self, code: EventCode, entity: EntityId, fields: EventFields) -> Result<()> {
        self.log.record(self.tick, code, entity, fields)
    }

    /// Freeze the four tables.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tick: self.tick,
            entities: self.ds.entities.all(),
            items: self.ds.items.all(),
            tiles: self.ds.tiles.all(),
            events: self.log.table().all(),
            alive: self.alive_ids(),
        }
    }

    /// Full dump for replay.
    #[must_use]
    pub fn dump(&self) -> WorldDump {
        WorldDump {
            tick: self.tick,
            map_size: self.map.size(),
            materials: self.map.tiles().iter().map(|tile| tile.visible_material()).collect(),
            entities: self.ds.entities.clone(),
            items: self.ds.items.clone(),
            tiles: self.ds.tiles.clone(),
            events: self.log.table().clone(),
        }
    }

    /// Hash of the complete simulation state.
    ///
    /// Two realms with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.ds.hash(&mut hasher);
        self.log.hash(&mut hasher);

        for entity in self.players.iter().chain(self.npcs.iter()) {
            entity.hash(&mut hasher);
        }
        self.npcs.next_id().hash(&mut hasher);
        self.npcs.spawn_dangers().hash(&mut hasher);

        self.map.active_tiles().hash(&mut hasher);
        for tile in self.map.tiles() {
            tile.resources().hash(&mut hasher);
            tile.regen_timer().hash(&mut hasher);
            tile.occupants().hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Live player ids then live NPC ids, each in insertion order.
    #[must_use]
    pub fn alive_ids(&self) -> Vec<EntityId> {
        self.players.iter().chain(self.npcs.iter()).map(Entity::id).collect()
    }

    /// Live entity by id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        if id > 0 {
            self.players.get(id)
        } else {
            self.npcs.get(id)
        }
    }

    /// Mutable live entity by id. Changes reach the Entity table at the
    /// entity's next update.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if id > 0 {
            self.players.get_mut(id)
        } else {
            self.npcs.get_mut(id)
        }
    }

    /// Current tick. Zero after reset.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Tile grid.
    #[must_use]
    pub const fn map(&self) -> &Map {
        &self.map
    }

    /// Entity, item and tile tables.
    #[must_use]
    pub const fn datastore(&self) -> &Datastore {
        &self.ds
    }

    /// Gameplay history.
    #[must_use]
    pub const fn event_log(&self) -> &EventLog {
        &self.log
    }

    /// Live players.
    #[must_use]
    pub const fn players(&self) -> &PlayerManager {
        &self.players
    }

    /// Live NPCs.
    #[must_use]
    pub const fn npcs(&self) -> &NpcManager {
        &self.npcs
    }
}

/// Step one tile if the destination is habitable; otherwise stay put.
fn move_entity(
    group: &mut EntityGroup,
    map: &mut Map,
    ds: &mut Datastore,
    id: EntityId,
    direction: Direction,
) -> Result<()> {
    let Some(entity) = group.get_mut(id) else {
        return Ok(());
    };
    if !entity.alive() {
        return Ok(());
    }
    let from = entity.pos();
    let to = from.offset(direction.delta());
    if !map.habitable(to.row, to.col) {
        return Ok(());
    }
    map.move_entity(id, from, to)?;
    entity.move_to(to, &mut ds.entities);
    Ok(())
}

fn record_hit(
    log: &mut EventLog,
    tick: u64,
    attacker: &Entity,
    target: &Entity,
    style: Style,
    outcome: combat::AttackOutcome,
) -> Result<()> {
    log.record(
        tick,
        EventCode::ScoreHit,
        attacker.id(),
        EventFields::new()
            .with_combat_style(style)
            .with_damage(i64::from(outcome.damage)),
    )?;
    if let Some(level) = outcome.level_up {
        log.record(
            tick,
            EventCode::LevelUp,
            attacker.id(),
            EventFields::new().with_skill(style).with_level(i64::from(level)),
        )?;
    }
    if outcome.killed {
        log.record(
            tick,
            EventCode::PlayerKill,
            attacker.id(),
            EventFields::new().with_target(target.id(), i64::from(target.combat_level())),
        )?;
    }
    Ok(())
}

/// The killer takes the victim's gold.
fn loot_gold(log: &mut EventLog, ds: &mut Datastore, tick: u64, killer: &mut Entity, victim: &mut Entity) -> Result<()> {
    let gold = victim.inventory.gold;
    if gold <= 0 {
        return Ok(());
    }
    victim.inventory.gold = 0;
    killer.inventory.gold += gold;
    victim.commit(&mut ds.entities);
    killer.commit(&mut ds.entities);
    if killer.is_player() {
        log.record(tick, EventCode::EarnGold, killer.id(), EventFields::new().with_amount(i64::from(gold)))?;
    }
    Ok(())
}
