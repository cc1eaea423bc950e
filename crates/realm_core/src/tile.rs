//! A single map tile.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::datastore::{RowId, Table, TileAttr};
use crate::entity::EntityId;
use crate::material::Material;
use crate::math::Position;

/// One cell of the map.
///
/// Habitability and impassability are captured from the base material at
/// reset and only change through [`Tile::terraform`]. Occupants are stored
/// as ids; the entity managers own the entities themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pos: Position,
    material: Material,
    habitable: bool,
    impassable: bool,
    resources: u32,
    depleted: bool,
    regen_timer: u32,
    occupants: BTreeSet<EntityId>,
    row_id: Option<RowId>,
}

impl Tile {
    /// Create an unset tile at `pos`. Tiles are only meaningful after reset.
    #[must_use]
    pub fn new(pos: Position) -> Self {
        Self {
            pos,
            material: Material::Void,
            habitable: false,
            impassable: true,
            resources: 0,
            depleted: false,
            regen_timer: 0,
            occupants: BTreeSet::new(),
            row_id: None,
        }
    }

    /// Reinitialize in place for a new episode and write the tile's row.
    pub fn reset(&mut self, material: Material, table: &mut Table<TileAttr>) {
        self.material = material;
        self.habitable = material.habitable();
        self.impassable = material.impassable();
        self.resources = material.capacity();
        self.depleted = false;
        self.regen_timer = 0;
        self.occupants.clear();

        let row = table.insert();
        table.set(row, TileAttr::Row, self.pos.row);
        table.set(row, TileAttr::Col, self.pos.col);
        self.row_id = Some(row);
        self.write_material(table);
    }

    /// Position on the map.
    #[must_use]
    pub const fn pos(&self) -> Position {
        self.pos
    }

    /// Base material of the tile.
    #[must_use]
    pub const fn material(&self) -> Material {
        self.material
    }

    /// Material currently shown, accounting for depletion.
    #[must_use]
    pub fn visible_material(&self) -> Material {
        if self.depleted {
            self.material.depleted().unwrap_or(self.material)
        } else {
            self.material
        }
    }

    /// Agents may stand here.
    #[must_use]
    pub const fn habitable(&self) -> bool {
        self.habitable
    }

    /// Movement onto this tile is blocked.
    #[must_use]
    pub const fn impassable(&self) -> bool {
        self.impassable
    }

    /// Resource is exhausted and waiting to regenerate.
    #[must_use]
    pub const fn depleted(&self) -> bool {
        self.depleted
    }

    /// Remaining harvestable units.
    #[must_use]
    pub const fn resources(&self) -> u32 {
        self.resources
    }

    /// Ticks until the resource returns.
    #[must_use]
    pub const fn regen_timer(&self) -> u32 {
        self.regen_timer
    }

    /// Ids standing on this tile, ascending.
    #[must_use]
    pub fn occupants(&self) -> &BTreeSet<EntityId> {
        &self.occupants
    }

    /// Record an entity standing here.
    pub fn add_entity(&mut self, id: EntityId) {
        self.occupants.insert(id);
    }

    /// Forget an entity. Returns whether it was present.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        self.occupants.remove(&id)
    }

    /// Take one unit of resource.
    ///
    /// Returns the material harvested, or `None` if nothing is available.
    /// With `deplete`, exhausting the tile starts the regeneration timer;
    /// without it the count is left untouched (water is drunk, not used up).
    pub fn harvest(&mut self, deplete: bool, table: &mut Table<TileAttr>) -> Option<Material> {
        if self.depleted || self.resources == 0 {
            return None;
        }
        if deplete {
            self.resources -= 1;
            if self.resources == 0 {
                self.depleted = true;
                self.regen_timer = self.material.respawn_ticks();
                self.write_material(table);
            }
        }
        Some(self.material)
    }

    /// Advance regeneration by one tick. Returns true while still depleted.
    pub fn step(&mut self, table: &mut Table<TileAttr>) -> bool {
        if !self.depleted {
            return false;
        }
        self.regen_timer = self.regen_timer.saturating_sub(1);
        if self.regen_timer == 0 {
            self.depleted = false;
            self.resources = self.material.capacity();
            self.write_material(table);
        }
        self.depleted
    }

    /// Replace the base material, the one path that changes habitability.
    pub fn terraform(&mut self, material: Material, table: &mut Table<TileAttr>) {
        self.material = material;
        self.habitable = material.habitable();
        self.impassable = material.impassable();
        self.resources = material.capacity();
        self.depleted = false;
        self.regen_timer = 0;
        self.write_material(table);
    }

    fn write_material(&self, table: &mut Table<TileAttr>) {
        if let Some(row) = self.row_id {
            table.set(row, TileAttr::MaterialId, self.visible_material().index());
        }
    }
}
