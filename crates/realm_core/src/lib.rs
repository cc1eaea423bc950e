//! # Realm Core
//!
//! Deterministic tile-world simulation for multi-agent research.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No network
//! - No implicit randomness (every RNG is passed in)
//! - No floating-point math (uses fixed-point)
//!
//! Same seed and same actions give the same world, tick for tick.
//!
//! ## Crate Structure
//!
//! - [`map`] - Tile grid, resource regeneration, path memo
//! - [`datastore`] - Columnar entity, item and tile tables
//! - [`entity_manager`] - Spawn, update and cull of players and NPCs
//! - [`combat`] - Damage formula and attack resolution
//! - [`event_log`] - Append-only gameplay history
//! - [`realm`] - The per-tick loop that ties them together

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod action;
pub mod combat;
pub mod config;
pub mod datastore;
pub mod entity;
pub mod entity_manager;
pub mod error;
pub mod event_log;
pub mod item;
pub mod map;
pub mod material;
pub mod math;
pub mod npc;
pub mod pathfinding;
pub mod realm;
pub mod tile;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::action::{Action, Attack, Direction, Style};
    pub use crate::combat::AttackOutcome;
    pub use crate::config::{Config, PlayerSpawn};
    pub use crate::datastore::{Datastore, EntityAttr, EventAttr, Frame, ItemAttr, Schema, Table, TileAttr, TileMap};
    pub use crate::entity::{Entity, EntityId, EntityKind};
    pub use crate::entity_manager::{Culled, NpcManager, PlayerManager};
    pub use crate::error::{RealmError, Result};
    pub use crate::event_log::{EventCode, EventFields, EventLog, ItemRef};
    pub use crate::item::{ItemKind, Slot};
    pub use crate::map::Map;
    pub use crate::material::{Material, Terrain};
    pub use crate::math::{Fixed, Position};
    pub use crate::npc::Disposition;
    pub use crate::realm::{Realm, Snapshot, WorldDump};
}
