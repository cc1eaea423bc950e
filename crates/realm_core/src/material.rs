//! Material catalog.
//!
//! Every tile carries one material. Materials decide whether agents may
//! stand on a tile, whether it blocks movement, and what it yields when
//! harvested. Depletion swaps the *visible* material (Foliage shows as
//! Scrub) but never the tile's habitability.

use serde::{Deserialize, Serialize};

/// Terrain material. The discriminant is the stable index written to the
/// Tile table's material column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum Material {
    /// Out-of-bounds filler beyond the playable radius.
    Void = 0,
    /// Drinkable, impassable.
    Water = 1,
    /// Baseline habitable ground.
    #[default]
    Grass = 2,
    /// Depleted foliage.
    Scrub = 3,
    /// Forageable food source.
    Foliage = 4,
    /// Impassable rock.
    Stone = 5,
    /// Depleted ore.
    Slag = 6,
    /// Mineable ore.
    Ore = 7,
    /// Depleted tree.
    Stump = 8,
    /// Harvestable tree.
    Tree = 9,
    /// Depleted crystal.
    Fragment = 10,
    /// Harvestable crystal.
    Crystal = 11,
    /// Depleted herb.
    Weeds = 12,
    /// Harvestable herb.
    Herb = 13,
    /// Depleted fishing spot.
    Ocean = 14,
    /// Fishing spot.
    Fish = 15,
}

impl Material {
    /// Every material in index order.
    pub const ALL: [Material; 16] = [
        Material::Void,
        Material::Water,
        Material::Grass,
        Material::Scrub,
        Material::Foliage,
        Material::Stone,
        Material::Slag,
        Material::Ore,
        Material::Stump,
        Material::Tree,
        Material::Fragment,
        Material::Crystal,
        Material::Weeds,
        Material::Herb,
        Material::Ocean,
        Material::Fish,
    ];

    /// Stable integer index.
    #[must_use]
    pub const fn index(self) -> i32 {
        self as i32
    }

    /// Look up a material by index.
    #[must_use]
    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Blocks movement onto the tile.
    #[must_use]
    pub const fn impassable(self) -> bool {
        matches!(
            self,
            Self::Void | Self::Water | Self::Stone | Self::Ocean | Self::Fish
        )
    }

    /// Agents may occupy the tile.
    #[must_use]
    pub const fn habitable(self) -> bool {
        !self.impassable()
    }

    /// Material shown after the resource is exhausted. `None` for materials
    /// that do not deplete.
    #[must_use]
    pub const fn depleted(self) -> Option<Self> {
        match self {
            Self::Foliage => Some(Self::Scrub),
            Self::Ore => Some(Self::Slag),
            Self::Tree => Some(Self::Stump),
            Self::Crystal => Some(Self::Fragment),
            Self::Herb => Some(Self::Weeds),
            Self::Fish => Some(Self::Ocean),
            _ => None,
        }
    }

    /// Units available before the tile depletes. Water never runs out.
    #[must_use]
    pub const fn capacity(self) -> u32 {
        match self {
            Self::Water => u32::MAX,
            Self::Foliage | Self::Herb | Self::Fish => 1,
            Self::Ore | Self::Tree | Self::Crystal => 1,
            _ => 0,
        }
    }

    /// Ticks a depleted tile waits before its resource returns.
    #[must_use]
    pub const fn respawn_ticks(self) -> u32 {
        match self {
            Self::Foliage | Self::Herb => 25,
            Self::Fish => 30,
            Self::Ore | Self::Tree | Self::Crystal => 50,
            _ => 0,
        }
    }

    /// Whether this material yields anything when harvested.
    #[must_use]
    pub const fn harvestable(self) -> bool {
        self.capacity() > 0
    }
}

/// A row-major grid of materials supplied by an external terrain generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terrain {
    rows: Vec<Vec<Material>>,
}

impl Terrain {
    /// Wrap a grid of materials.
    #[must_use]
    pub fn new(rows: Vec<Vec<Material>>) -> Self {
        Self { rows }
    }

    /// A square grid filled with one material.
    #[must_use]
    pub fn filled(size: usize, material: Material) -> Self {
        Self {
            rows: vec![vec![material; size]; size],
        }
    }

    /// Build a square grid from a per-cell function.
    pub fn from_fn(size: usize, mut f: impl FnMut(i32, i32) -> Material) -> Self {
        let rows = (0..size)
            .map(|r| (0..size).map(|c| f(r as i32, c as i32)).collect())
            .collect();
        Self { rows }
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Rows of the grid.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Material>] {
        &self.rows
    }

    /// Overwrite one cell. Out-of-range writes are ignored.
    pub fn set(&mut self, row: usize, col: usize, material: Material) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = material;
        }
    }
}
