//! Realm configuration.
//!
//! A read-only bag of named parameters consumed by every component. Configs
//! are plain data, deserialized from RON, and validated once per reset.
//!
//! # Example RON
//!
//! ```ron
//! (
//!     map_center: 32,
//!     map_border: 10,
//!     map_size: 52,
//!     player_n: 8,
//!     npc_n: 16,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RealmError, Result};
use crate::math::{percent, Fixed};

/// How player spawn positions are chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PlayerSpawn {
    /// Evenly spaced around the perimeter ring, shuffled per episode.
    #[default]
    Concurrent,
    /// Explicit positions, one per player id in order.
    Fixed(Vec<(i32, i32)>),
}

/// Simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ---- Map ----
    /// Side length of the playable area.
    pub map_center: i32,
    /// Width of the void border around the playable area.
    pub map_border: i32,
    /// Side length of the full grid. Must equal `map_center + 2 * map_border`.
    pub map_size: i32,
    /// Vision radius of players; the border must be wider than this.
    pub player_vision_radius: i32,
    /// Use supplied terrain; when off every playable tile is grass.
    pub terrain_system_enabled: bool,
    /// Replace stone with grass during terrain processing.
    pub terrain_disable_stone: bool,

    // ---- Players ----
    /// Number of players spawned at reset.
    pub player_n: u32,
    /// Player spawn placement.
    pub player_spawn: PlayerSpawn,
    /// Starting and maximum health.
    pub player_base_health: i32,

    // ---- NPCs ----
    /// Spawn NPCs each tick.
    pub npc_system_enabled: bool,
    /// Maximum concurrent NPCs.
    pub npc_n: u32,
    /// Spawn attempts per tick.
    pub npc_spawn_attempts: u32,
    /// Danger (percent of scale) at or above which NPCs are hostile.
    pub npc_spawn_aggressive_pct: u32,
    /// Danger (percent of scale) at or above which NPCs are neutral.
    pub npc_spawn_neutral_pct: u32,
    /// Danger (percent of scale) at or above which NPCs are passive.
    pub npc_spawn_passive_pct: u32,
    /// Level at danger zero.
    pub npc_level_min: u32,
    /// Level at full danger.
    pub npc_level_max: u32,
    /// Allow NPCs to target other NPCs.
    pub npc_allow_attack_other_npcs: bool,
    /// Units of ammunition given to ranged and mage NPCs.
    pub npc_ammunition_quantity: u32,

    // ---- Resources ----
    /// Food and water bookkeeping for players.
    pub resource_system_enabled: bool,
    /// Maximum food and water.
    pub resource_base: i32,
    /// Food and water lost per tick.
    pub resource_depletion_rate: i32,
    /// Health lost per tick while starving.
    pub resource_starvation_rate: i32,
    /// Health lost per tick while dehydrated.
    pub resource_dehydration_rate: i32,
    /// Food restored by foraging a foliage tile.
    pub resource_foliage_restore: i32,
    /// Water restored by drinking next to water.
    pub resource_water_restore: i32,
    /// Food and water (percent of base) above which health regenerates.
    pub resource_health_regen_threshold_pct: u32,
    /// Health (percent of base) regenerated per tick when well fed.
    pub resource_health_restore_pct: u32,

    // ---- Combat ----
    /// Allow attack actions.
    pub combat_system_enabled: bool,
    /// Base melee damage.
    pub combat_melee_base_damage: i32,
    /// Base range damage.
    pub combat_range_base_damage: i32,
    /// Base mage damage.
    pub combat_mage_base_damage: i32,
    /// Melee damage per attacker level.
    pub progression_melee_damage: i32,
    /// Range damage per attacker level.
    pub progression_range_damage: i32,
    /// Mage damage per attacker level.
    pub progression_mage_damage: i32,
    /// Defense per target level.
    pub progression_defense: i32,
    /// Multiplier (percent) applied when hitting the target's weakness.
    pub combat_weakness_multiplier_pct: u32,
    /// Melee reach in tiles (L-infinity).
    pub combat_melee_reach: i32,
    /// Range reach in tiles.
    pub combat_range_reach: i32,
    /// Mage reach in tiles.
    pub combat_mage_reach: i32,

    // ---- Progression ----
    /// Track skill experience and levels.
    pub progression_system_enabled: bool,
    /// Experience scale of the level curve.
    pub progression_base_xp: u32,
    /// Level cap.
    pub progression_level_max: u32,
    /// Experience gained per point of damage dealt.
    pub progression_combat_xp_scale: u32,

    // ---- Items ----
    /// Track items in the datastore; culling destroys held items.
    pub item_system_enabled: bool,
    /// Give NPCs starting equipment.
    pub equipment_system_enabled: bool,
    /// Give NPCs starting gold.
    pub exchange_system_enabled: bool,
    /// Weapon offense at level zero.
    pub equipment_weapon_base_damage: i32,
    /// Weapon offense per level.
    pub equipment_weapon_level_damage: i32,
    /// Armor defense at level zero.
    pub equipment_armor_base_defense: i32,
    /// Armor defense per level.
    pub equipment_armor_level_defense: i32,
    /// Ammunition offense at level zero.
    pub equipment_ammunition_base_damage: i32,
    /// Ammunition offense per level.
    pub equipment_ammunition_level_damage: i32,

    // ---- Pathfinding ----
    /// Node expansions before A* gives up and returns its best guess.
    pub pathfinding_budget: u32,
    /// Memoized `(start, goal)` paths kept before the memo is flushed.
    /// Zero disables memoization.
    pub pathfinding_memo_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            map_center: 64,
            map_border: 16,
            map_size: 96,
            player_vision_radius: 7,
            terrain_system_enabled: true,
            terrain_disable_stone: false,

            player_n: 16,
            player_spawn: PlayerSpawn::Concurrent,
            player_base_health: 100,

            npc_system_enabled: true,
            npc_n: 32,
            npc_spawn_attempts: 16,
            npc_spawn_aggressive_pct: 80,
            npc_spawn_neutral_pct: 50,
            npc_spawn_passive_pct: 0,
            npc_level_min: 1,
            npc_level_max: 10,
            npc_allow_attack_other_npcs: false,
            npc_ammunition_quantity: 10,

            resource_system_enabled: true,
            resource_base: 100,
            resource_depletion_rate: 5,
            resource_starvation_rate: 10,
            resource_dehydration_rate: 10,
            resource_foliage_restore: 50,
            resource_water_restore: 50,
            resource_health_regen_threshold_pct: 50,
            resource_health_restore_pct: 10,

            combat_system_enabled: true,
            combat_melee_base_damage: 30,
            combat_range_base_damage: 30,
            combat_mage_base_damage: 30,
            progression_melee_damage: 5,
            progression_range_damage: 5,
            progression_mage_damage: 5,
            progression_defense: 5,
            combat_weakness_multiplier_pct: 150,
            combat_melee_reach: 1,
            combat_range_reach: 3,
            combat_mage_reach: 4,

            progression_system_enabled: true,
            progression_base_xp: 10,
            progression_level_max: 10,
            progression_combat_xp_scale: 1,

            item_system_enabled: true,
            equipment_system_enabled: true,
            exchange_system_enabled: true,
            equipment_weapon_base_damage: 15,
            equipment_weapon_level_damage: 15,
            equipment_armor_base_defense: 0,
            equipment_armor_level_defense: 10,
            equipment_ammunition_base_damage: 10,
            equipment_ammunition_level_damage: 10,

            pathfinding_budget: 64,
            pathfinding_memo_capacity: 4096,
        }
    }
}

impl Config {
    /// Small maps: 32x32 playable area, few agents.
    #[must_use]
    pub fn small() -> Self {
        Self {
            map_center: 32,
            map_border: 10,
            map_size: 52,
            player_n: 8,
            npc_n: 16,
            ..Default::default()
        }
    }

    /// Medium maps: the default 64x64 playable area.
    #[must_use]
    pub fn medium() -> Self {
        Self::default()
    }

    /// Large maps: 128x128 playable area, hundreds of agents.
    #[must_use]
    pub fn large() -> Self {
        Self {
            map_center: 128,
            map_border: 16,
            map_size: 160,
            player_n: 128,
            npc_n: 256,
            npc_spawn_attempts: 32,
            ..Default::default()
        }
    }

    /// Set the playable area and border, keeping `map_size` consistent.
    #[must_use]
    pub const fn with_map(mut self, center: i32, border: i32) -> Self {
        self.map_center = center;
        self.map_border = border;
        self.map_size = center + 2 * border;
        self
    }

    /// Set the player count.
    #[must_use]
    pub const fn with_players(mut self, player_n: u32) -> Self {
        self.player_n = player_n;
        self
    }

    /// Set the NPC cap.
    #[must_use]
    pub const fn with_npcs(mut self, npc_n: u32) -> Self {
        self.npc_n = npc_n;
        self.npc_system_enabled = npc_n > 0;
        self
    }

    /// Disable every optional game system, leaving movement only.
    #[must_use]
    pub const fn minimal(mut self) -> Self {
        self.npc_system_enabled = false;
        self.resource_system_enabled = false;
        self.combat_system_enabled = false;
        self.progression_system_enabled = false;
        self.item_system_enabled = false;
        self.equipment_system_enabled = false;
        self.exchange_system_enabled = false;
        self
    }

    /// Load a config from a RON file and validate it.
    ///
    /// # Errors
    /// Returns [`RealmError::ConfigLoad`] if the file cannot be read or
    /// parsed, or [`RealmError::InvalidConfig`] if validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| RealmError::ConfigLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = Self::from_ron_str(&contents).map_err(|e| match e {
            RealmError::ConfigLoad { message, .. } => RealmError::ConfigLoad {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Parse a config from RON text and validate it.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| RealmError::ConfigLoad {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints. Never clamps.
    pub fn validate(&self) -> Result<()> {
        if self.map_center <= 0 {
            return Err(RealmError::InvalidConfig(format!(
                "map_center must be positive, got {}",
                self.map_center
            )));
        }
        if self.map_size != self.map_center + 2 * self.map_border {
            return Err(RealmError::InvalidConfig(format!(
                "map_size {} must equal map_center {} + 2 * map_border {}",
                self.map_size, self.map_center, self.map_border
            )));
        }
        if self.map_border <= self.player_vision_radius {
            return Err(RealmError::InvalidConfig(format!(
                "map_border {} must be greater than player_vision_radius {}",
                self.map_border, self.player_vision_radius
            )));
        }
        if !(self.npc_spawn_passive_pct <= self.npc_spawn_neutral_pct
            && self.npc_spawn_neutral_pct <= self.npc_spawn_aggressive_pct)
        {
            return Err(RealmError::InvalidConfig(format!(
                "NPC danger thresholds must be ordered passive <= neutral <= aggressive, got {} / {} / {}",
                self.npc_spawn_passive_pct, self.npc_spawn_neutral_pct, self.npc_spawn_aggressive_pct
            )));
        }
        if self.npc_level_min > self.npc_level_max {
            return Err(RealmError::InvalidConfig(format!(
                "npc_level_min {} exceeds npc_level_max {}",
                self.npc_level_min, self.npc_level_max
            )));
        }
        if self.player_base_health <= 0 || self.resource_base <= 0 {
            return Err(RealmError::InvalidConfig(
                "player_base_health and resource_base must be positive".to_string(),
            ));
        }
        if self.progression_base_xp == 0 || self.progression_level_max == 0 {
            return Err(RealmError::InvalidConfig(
                "progression_base_xp and progression_level_max must be positive".to_string(),
            ));
        }
        if let PlayerSpawn::Fixed(positions) = &self.player_spawn {
            if positions.len() < self.player_n as usize {
                return Err(RealmError::InvalidConfig(format!(
                    "{} fixed spawn positions for {} players",
                    positions.len(),
                    self.player_n
                )));
            }
        }
        Ok(())
    }

    /// Weakness multiplier as a fixed-point factor.
    #[must_use]
    pub fn weakness_multiplier(&self) -> Fixed {
        percent(self.combat_weakness_multiplier_pct)
    }

    /// Lowest and highest playable coordinate (inclusive lower, exclusive upper).
    #[must_use]
    pub const fn playable_range(&self) -> (i32, i32) {
        (self.map_border, self.map_border + self.map_center)
    }
}
