//! Players and NPCs.
//!
//! One record type covers both; [`EntityKind`] tags which behavior applies.
//! Mutators that change observable state write the entity's full row back
//! to the Entity table, so the table never lags the record.

use serde::{Deserialize, Serialize};

use crate::action::Style;
use crate::config::Config;
use crate::datastore::{Datastore, EntityAttr, RowId, Table};
use crate::error::Result;
use crate::event_log::{EventCode, EventFields, EventLog};
use crate::item::Inventory;
use crate::map::Map;
use crate::material::Material;
use crate::math::{fixed_serde, Fixed, Position};
use crate::npc::Disposition;

/// Entity id: positive for players, negative for NPCs.
pub type EntityId = i32;

/// Player or NPC, with NPC-specific data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Externally controlled agent.
    Player,
    /// Scripted agent.
    Npc {
        /// AI policy.
        disposition: Disposition,
        /// Combat focus.
        style: Style,
        /// Danger of the spawn location.
        #[serde(with = "fixed_serde")]
        spawn_danger: Fixed,
    },
}

/// Depletable resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resources {
    /// Hit points. The entity dies at zero.
    pub health: i32,
    /// Players only.
    pub food: i32,
    /// Players only.
    pub water: i32,
}

/// Combat experience and levels, indexed by [`Style::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Skills {
    exp: [u32; 3],
    level: [u32; 3],
}

impl Default for Skills {
    fn default() -> Self {
        Self {
            exp: [0; 3],
            level: [1; 3],
        }
    }
}

fn isqrt(n: u32) -> u32 {
    let mut root = 0u32;
    while (root + 1).saturating_mul(root + 1) <= n {
        root += 1;
    }
    root
}

impl Skills {
    /// Level reached with `exp` experience.
    #[must_use]
    pub fn level_for_exp(exp: u32, config: &Config) -> u32 {
        (1 + isqrt(exp / config.progression_base_xp.max(1))).min(config.progression_level_max)
    }

    /// Experience at which `level` starts.
    #[must_use]
    pub const fn exp_for_level(level: u32, config: &Config) -> u32 {
        let step = level.saturating_sub(1);
        step * step * config.progression_base_xp
    }

    /// Level of a style.
    #[must_use]
    pub const fn level(&self, style: Style) -> u32 {
        self.level[style.index()]
    }

    /// Experience of a style.
    #[must_use]
    pub const fn exp(&self, style: Style) -> u32 {
        self.exp[style.index()]
    }

    /// Highest level across styles.
    #[must_use]
    pub fn combat_level(&self) -> u32 {
        self.level.iter().copied().max().unwrap_or(1)
    }

    /// Style with the most experience. `None` when all three are equal.
    /// Partial ties resolve to the earliest style.
    #[must_use]
    pub fn dominant(&self) -> Option<Style> {
        let max = self.exp.iter().copied().max().unwrap_or(0);
        let min = self.exp.iter().copied().min().unwrap_or(0);
        if max == min {
            return None;
        }
        Style::ALL.into_iter().find(|s| self.exp(*s) == max)
    }

    /// Set a style directly to a level.
    pub fn set_level(&mut self, style: Style, level: u32, config: &Config) {
        self.exp[style.index()] = Self::exp_for_level(level, config);
        self.level[style.index()] = level.max(1);
    }

    /// Add experience. Returns the new level if it increased.
    pub fn add_exp(&mut self, style: Style, amount: u32, config: &Config) -> Option<u32> {
        let i = style.index();
        self.exp[i] = self.exp[i].saturating_add(amount);
        let level = Self::level_for_exp(self.exp[i], config);
        if level > self.level[i] {
            self.level[i] = level;
            Some(level)
        } else {
            None
        }
    }
}

/// Per-life bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct History {
    /// Ticks survived.
    pub time_alive: u32,
    /// Damage taken on the latest hit.
    pub damage: i32,
    /// Latest attacker.
    pub attacker: Option<EntityId>,
    /// Tick of the latest hit taken.
    pub last_combat_tick: u64,
    /// Entities killed.
    pub kills: u32,
    /// Entity that landed the killing blow.
    pub killed_by: Option<EntityId>,
    /// Where the entity spawned.
    pub spawn_pos: Position,
    /// Largest L-infinity distance reached from spawn.
    pub farthest: i32,
}

impl History {
    fn new(spawn_pos: Position) -> Self {
        Self {
            time_alive: 0,
            damage: 0,
            attacker: None,
            last_combat_tick: 0,
            kills: 0,
            killed_by: None,
            spawn_pos,
            farthest: 0,
        }
    }
}

/// A player or NPC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    pos: Position,
    /// Health, food and water.
    pub resources: Resources,
    /// Combat skills.
    pub skills: Skills,
    /// Gold and equipment.
    pub inventory: Inventory,
    /// Per-life bookkeeping.
    pub history: History,
    row: Option<RowId>,
}

impl Entity {
    /// A fresh player at full health, food and water.
    #[must_use]
    pub fn player(id: EntityId, pos: Position, config: &Config) -> Self {
        Self {
            id,
            kind: EntityKind::Player,
            pos,
            resources: Resources {
                health: config.player_base_health,
                food: config.resource_base,
                water: config.resource_base,
            },
            skills: Skills::default(),
            inventory: Inventory::default(),
            history: History::new(pos),
            row: None,
        }
    }

    /// A fresh NPC. Level, gold and equipment are applied by the spawner.
    #[must_use]
    pub fn npc(
        id: EntityId,
        pos: Position,
        config: &Config,
        disposition: Disposition,
        style: Style,
        spawn_danger: Fixed,
    ) -> Self {
        Self {
            id,
            kind: EntityKind::Npc {
                disposition,
                style,
                spawn_danger,
            },
            pos,
            resources: Resources {
                health: config.player_base_health,
                food: 0,
                water: 0,
            },
            skills: Skills::default(),
            inventory: Inventory::default(),
            history: History::new(pos),
            row: None,
        }
    }

    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Player or NPC.
    #[must_use]
    pub const fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Current tile.
    #[must_use]
    pub const fn pos(&self) -> Position {
        self.pos
    }

    /// Health above zero.
    #[must_use]
    pub const fn alive(&self) -> bool {
        self.resources.health > 0
    }

    /// Externally controlled.
    #[must_use]
    pub const fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player)
    }

    /// Scripted.
    #[must_use]
    pub const fn is_npc(&self) -> bool {
        matches!(self.kind, EntityKind::Npc { .. })
    }

    /// NPC disposition, if this is an NPC.
    #[must_use]
    pub const fn disposition(&self) -> Option<Disposition> {
        match self.kind {
            EntityKind::Npc { disposition, .. } => Some(disposition),
            EntityKind::Player => None,
        }
    }

    /// NPC combat focus, if this is an NPC.
    #[must_use]
    pub const fn npc_style(&self) -> Option<Style> {
        match self.kind {
            EntityKind::Npc { style, .. } => Some(style),
            EntityKind::Player => None,
        }
    }

    /// Danger of the spawn location. Zero for players.
    #[must_use]
    pub const fn spawn_danger(&self) -> Fixed {
        match self.kind {
            EntityKind::Npc { spawn_danger, .. } => spawn_danger,
            EntityKind::Player => Fixed::ZERO,
        }
    }

    /// Highest skill level.
    #[must_use]
    pub fn combat_level(&self) -> u32 {
        self.skills.combat_level()
    }

    /// Row in the Entity table, while live.
    #[must_use]
    pub const fn row(&self) -> Option<RowId> {
        self.row
    }

    /// Claim a row and write the entity to it.
    pub fn insert_row(&mut self, table: &mut Table<EntityAttr>) {
        if self.row.is_none() {
            self.row = Some(table.insert());
        }
        self.commit(table);
    }

    /// Release the entity's row.
    pub fn delete_row(&mut self, table: &mut Table<EntityAttr>) {
        if let Some(row) = self.row.take() {
            table.delete(row);
        }
    }

    /// Write every column of the entity's row.
    pub fn commit(&self, table: &mut Table<EntityAttr>) {
        let Some(row) = self.row else {
            return;
        };
        let npc_type = self.disposition().map_or(0, Disposition::code);
        let values = [
            self.id,
            npc_type,
            self.pos.row,
            self.pos.col,
            self.resources.health,
            self.resources.food,
            self.resources.water,
            self.inventory.gold,
            self.skills.level(Style::Melee) as i32,
            self.skills.exp(Style::Melee) as i32,
            self.skills.level(Style::Range) as i32,
            self.skills.exp(Style::Range) as i32,
            self.skills.level(Style::Mage) as i32,
            self.skills.exp(Style::Mage) as i32,
            self.history.damage,
            self.history.time_alive as i32,
            self.history.attacker.unwrap_or(0),
            self.history.last_combat_tick as i32,
            self.inventory.equipment.item_level(),
        ];
        table.set_row(row, &values);
    }

    /// Change position. The caller keeps tile occupancy in sync.
    pub fn move_to(&mut self, pos: Position, table: &mut Table<EntityAttr>) {
        self.pos = pos;
        self.commit(table);
    }

    /// Take a hit. Players also lose food and water.
    ///
    /// Returns true if this hit killed the entity.
    pub fn receive_damage(
        &mut self,
        attacker: EntityId,
        damage: u32,
        tick: u64,
        config: &Config,
        table: &mut Table<EntityAttr>,
    ) -> bool {
        let was_alive = self.alive();
        let damage = damage as i32;
        self.resources.health -= damage;
        if self.is_player() && config.resource_system_enabled {
            self.resources.food = (self.resources.food - damage).max(0);
            self.resources.water = (self.resources.water - damage).max(0);
        }
        self.history.damage = damage;
        self.history.attacker = Some(attacker);
        self.history.last_combat_tick = tick;

        let killed = was_alive && !self.alive();
        if killed {
            self.history.killed_by = Some(attacker);
        }
        self.commit(table);
        killed
    }

    /// Gain experience for dealing `damage` with `style`.
    ///
    /// Returns the new level on a level up.
    pub fn gain_exp(&mut self, style: Style, damage: u32, config: &Config, table: &mut Table<EntityAttr>) -> Option<u32> {
        if !config.progression_system_enabled {
            return None;
        }
        let amount = damage.saturating_mul(config.progression_combat_xp_scale);
        let level = self.skills.add_exp(style, amount, config);
        self.commit(table);
        level
    }

    /// Per-tick update.
    ///
    /// # Errors
    /// Propagates map and event log errors.
    pub fn update(
        &mut self,
        map: &mut Map,
        ds: &mut Datastore,
        log: &mut EventLog,
        config: &Config,
        tick: u64,
    ) -> Result<()> {
        if self.alive() {
            match self.kind {
                EntityKind::Player => self.update_player(map, ds, log, config, tick)?,
                EntityKind::Npc { .. } => {
                    self.resources.health = (self.resources.health + 1).min(config.player_base_health);
                }
            }
            self.history.time_alive += 1;
        }
        self.commit(&mut ds.entities);
        Ok(())
    }

    fn update_player(
        &mut self,
        map: &mut Map,
        ds: &mut Datastore,
        log: &mut EventLog,
        config: &Config,
        tick: u64,
    ) -> Result<()> {
        if config.resource_system_enabled {
            self.update_resources(map, ds, log, config, tick)?;
        }

        let distance = self.pos.linf(self.history.spawn_pos);
        if distance > self.history.farthest {
            self.history.farthest = distance;
            log.record(
                tick,
                EventCode::GoFarthest,
                self.id,
                EventFields::new().with_distance(i64::from(distance)),
            )?;
        }
        Ok(())
    }

    fn update_resources(
        &mut self,
        map: &mut Map,
        ds: &mut Datastore,
        log: &mut EventLog,
        config: &Config,
        tick: u64,
    ) -> Result<()> {
        let base = config.resource_base;
        let r = &mut self.resources;
        r.food = (r.food - config.resource_depletion_rate).max(0);
        r.water = (r.water - config.resource_depletion_rate).max(0);

        let (row, col) = (self.pos.row, self.pos.col);
        if map.tile(row, col)?.material() == Material::Foliage
            && map.harvest(row, col, true, &mut ds.tiles)?.is_some()
        {
            r.food = (r.food + config.resource_foliage_restore).min(base);
            log.record(tick, EventCode::EatFood, self.id, EventFields::new())?;
        }
        if let Some(water) = map.find_adjacent(self.pos, Material::Water) {
            if map.harvest(water.row, water.col, false, &mut ds.tiles)?.is_some() {
                r.water = (r.water + config.resource_water_restore).min(base);
                log.record(tick, EventCode::DrinkWater, self.id, EventFields::new())?;
            }
        }

        if r.food == 0 {
            r.health -= config.resource_starvation_rate;
        }
        if r.water == 0 {
            r.health -= config.resource_dehydration_rate;
        }

        let threshold = base * config.resource_health_regen_threshold_pct as i32 / 100;
        if r.health > 0 && r.food > threshold && r.water > threshold {
            let max = config.player_base_health;
            let regen = max * config.resource_health_restore_pct as i32 / 100;
            r.health = (r.health + regen).min(max);
        }
        Ok(())
    }
}
