//! Tile grid.
//!
//! The map owns a fixed `size x size` array of tiles, allocated once and
//! reset in place each episode. Depleted tiles are tracked in an ordered
//! active set so regeneration costs scale with the number of depleted
//! tiles, not the map area.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::action::Direction;
use crate::config::Config;
use crate::datastore::{Table, TileAttr};
use crate::entity::EntityId;
use crate::error::{RealmError, Result};
use crate::material::{Material, Terrain};
use crate::math::Position;
use crate::pathfinding::{self, NavGrid};
use crate::tile::Tile;

/// The world grid.
#[derive(Debug, Clone)]
pub struct Map {
    size: i32,
    tiles: Vec<Tile>,
    nav: NavGrid,
    active: BTreeSet<Position>,
    path_memo: HashMap<(Position, Position), Option<Direction>>,
    memo_capacity: usize,
}

impl Map {
    /// Allocate the tile array for `config.map_size`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let size = config.map_size.max(0);
        Self {
            size,
            tiles: allocate(size),
            nav: NavGrid::new(size),
            active: BTreeSet::new(),
            path_memo: HashMap::new(),
            memo_capacity: config.pathfinding_memo_capacity,
        }
    }

    /// Side length.
    #[must_use]
    pub const fn size(&self) -> i32 {
        self.size
    }

    /// Load a new episode's terrain.
    ///
    /// Tiles are reused when the size is unchanged. The tile table is
    /// cleared and refilled in row-major order.
    ///
    /// # Errors
    /// [`RealmError::TerrainShape`] if the terrain is not `map_size` square.
    pub fn reset(&mut self, terrain: &Terrain, config: &Config, table: &mut Table<TileAttr>) -> Result<()> {
        let expected = config.map_size.max(0) as usize;
        if terrain.height() != expected {
            return Err(RealmError::TerrainShape {
                expected,
                rows: terrain.height(),
                cols: terrain.rows().first().map_or(0, Vec::len),
            });
        }
        if let Some(row) = terrain.rows().iter().find(|row| row.len() != expected) {
            return Err(RealmError::TerrainShape {
                expected,
                rows: terrain.height(),
                cols: row.len(),
            });
        }

        if config.map_size != self.size {
            self.size = config.map_size;
            self.tiles = allocate(self.size);
        }
        self.nav = NavGrid::new(self.size);
        self.active.clear();
        self.path_memo.clear();
        self.memo_capacity = config.pathfinding_memo_capacity;
        table.clear();

        let processed = process_terrain(terrain, config);
        for tile in &mut self.tiles {
            let pos = tile.pos();
            let material = processed.rows()[pos.row as usize][pos.col as usize];
            tile.reset(material, table);
            self.nav.set_walkable(pos, tile.habitable());
        }
        debug!(size = self.size, "Map reset");
        Ok(())
    }

    /// Bounds check.
    #[must_use]
    pub const fn is_valid_pos(&self, row: i32, col: i32) -> bool {
        row >= 0 && col >= 0 && row < self.size && col < self.size
    }

    fn index(&self, row: i32, col: i32) -> Result<usize> {
        if self.is_valid_pos(row, col) {
            Ok((row as usize) * (self.size as usize) + col as usize)
        } else {
            Err(RealmError::InvalidPosition { row, col })
        }
    }

    /// Tile at a position.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] when out of bounds.
    pub fn tile(&self, row: i32, col: i32) -> Result<&Tile> {
        let index = self.index(row, col)?;
        Ok(&self.tiles[index])
    }

    fn tile_mut(&mut self, row: i32, col: i32) -> Result<&mut Tile> {
        let index = self.index(row, col)?;
        Ok(&mut self.tiles[index])
    }

    /// All tiles, row-major.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Whether an agent may stand at `(row, col)`. Out of bounds is false.
    #[must_use]
    pub fn habitable(&self, row: i32, col: i32) -> bool {
        self.nav.is_walkable(Position::new(row, col))
    }

    /// Positions of depleted tiles awaiting regeneration, ascending.
    #[must_use]
    pub fn active_tiles(&self) -> &BTreeSet<Position> {
        &self.active
    }

    /// Take one unit of resource from a tile.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] when out of bounds.
    pub fn harvest(
        &mut self,
        row: i32,
        col: i32,
        deplete: bool,
        table: &mut Table<TileAttr>,
    ) -> Result<Option<Material>> {
        let tile = self.tile_mut(row, col)?;
        let harvested = tile.harvest(deplete, table);
        if deplete && tile.depleted() {
            self.active.insert(Position::new(row, col));
        }
        Ok(harvested)
    }

    /// Advance regeneration of every depleted tile by one tick.
    pub fn step(&mut self, table: &mut Table<TileAttr>) {
        let snapshot: Vec<Position> = self.active.iter().copied().collect();
        for pos in snapshot {
            let index = (pos.row as usize) * (self.size as usize) + pos.col as usize;
            if !self.tiles[index].step(table) {
                self.active.remove(&pos);
            }
        }
    }

    /// Replace a tile's base material, updating habitability.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] when out of bounds.
    pub fn terraform(&mut self, row: i32, col: i32, material: Material, table: &mut Table<TileAttr>) -> Result<()> {
        let tile = self.tile_mut(row, col)?;
        tile.terraform(material, table);
        let habitable = tile.habitable();
        let pos = Position::new(row, col);
        self.active.remove(&pos);
        self.nav.set_walkable(pos, habitable);
        self.path_memo.clear();
        Ok(())
    }

    /// Record an entity standing on a tile.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] when out of bounds.
    pub fn add_entity(&mut self, pos: Position, id: EntityId) -> Result<()> {
        self.tile_mut(pos.row, pos.col)?.add_entity(id);
        Ok(())
    }

    /// Remove an entity from a tile. Returns whether it was present.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] when out of bounds.
    pub fn remove_entity(&mut self, pos: Position, id: EntityId) -> Result<bool> {
        Ok(self.tile_mut(pos.row, pos.col)?.remove_entity(id))
    }

    /// Move an occupant id between tiles.
    ///
    /// # Errors
    /// [`RealmError::InvalidPosition`] when either position is out of bounds.
    pub fn move_entity(&mut self, id: EntityId, from: Position, to: Position) -> Result<()> {
        self.index(to.row, to.col)?;
        self.remove_entity(from, id)?;
        self.add_entity(to, id)
    }

    /// First step from `start` toward `goal` over habitable tiles.
    ///
    /// Results are memoized until the next reset or terraform, since paths
    /// only depend on habitability. The memo holds at most
    /// `pathfinding_memo_capacity` entries and is flushed when full.
    pub fn next_step(&mut self, start: Position, goal: Position, budget: u32) -> Option<Direction> {
        if let Some(step) = self.path_memo.get(&(start, goal)) {
            return *step;
        }
        let step = pathfinding::next_step(&self.nav, start, goal, budget);
        if self.memo_capacity > 0 {
            if self.path_memo.len() >= self.memo_capacity {
                debug!(entries = self.path_memo.len(), "Path memo full, flushing");
                self.path_memo.clear();
            }
            self.path_memo.insert((start, goal), step);
        }
        step
    }

    /// First orthogonal neighbor of `pos` whose base material matches.
    #[must_use]
    pub fn find_adjacent(&self, pos: Position, material: Material) -> Option<Position> {
        Direction::ALL
            .into_iter()
            .map(|d| pos.offset(d.delta()))
            .find(|next| {
                self.tile(next.row, next.col)
                    .is_ok_and(|tile| tile.material() == material)
            })
    }
}

fn allocate(size: i32) -> Vec<Tile> {
    let mut tiles = Vec::with_capacity((size as usize) * (size as usize));
    for row in 0..size {
        for col in 0..size {
            tiles.push(Tile::new(Position::new(row, col)));
        }
    }
    tiles
}

/// Apply config-driven rewrites to the supplied terrain.
fn process_terrain(terrain: &Terrain, config: &Config) -> Terrain {
    let size = config.map_size;
    let border = config.map_border;
    let half = size / 2;
    Terrain::from_fn(size as usize, |row, col| {
        let mut material = if config.terrain_system_enabled {
            terrain.rows()[row as usize][col as usize]
        } else {
            Material::Grass
        };
        if config.terrain_system_enabled && config.terrain_disable_stone && material == Material::Stone {
            material = Material::Grass;
        }

        let linf = (row - half).abs().max((col - half).abs());
        // Doubled to compare against size/2 - border without rounding.
        let ring = size - 2 * border;
        if 2 * linf > ring {
            material = Material::Void;
        } else if 2 * linf == ring {
            material = Material::Grass;
        } else if config.terrain_system_enabled
            && linf == half - border - 1
            && matches!(material, Material::Stone | Material::Grass)
        {
            material = Material::Foliage;
        }
        material
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> Config {
        Config::default().with_map(16, 8)
    }

    fn reset_map(terrain: &Terrain, config: &Config) -> (Map, Table<TileAttr>) {
        let mut table = Table::new();
        let mut map = Map::new(config);
        map.reset(terrain, config, &mut table).expect("valid terrain");
        (map, table)
    }

    #[test]
    fn test_terrain_shape_is_checked() {
        let config = small_config();
        let mut map = Map::new(&config);
        let mut table = Table::new();
        let err = map
            .reset(&Terrain::filled(31, Material::Grass), &config, &mut table)
            .unwrap_err();
        assert!(matches!(err, RealmError::TerrainShape { expected: 32, rows: 31, .. }));
    }

    #[test]
    fn test_border_processing() {
        let config = small_config();
        let (map, table) = reset_map(&Terrain::filled(32, Material::Stone), &config);

        // Outside the ring is void.
        assert_eq!(map.tile(0, 0).unwrap().material(), Material::Void);
        assert_eq!(map.tile(7, 16).unwrap().material(), Material::Void);
        // The ring itself is grass.
        assert_eq!(map.tile(8, 16).unwrap().material(), Material::Grass);
        assert_eq!(map.tile(24, 24).unwrap().material(), Material::Grass);
        // Stone just inside the ring becomes foliage.
        assert_eq!(map.tile(9, 16).unwrap().material(), Material::Foliage);
        // Interior stone is untouched.
        assert_eq!(map.tile(16, 16).unwrap().material(), Material::Stone);
        assert!(!map.habitable(16, 16));
        assert_eq!(table.len(), 32 * 32);
    }

    #[test]
    fn test_terrain_disabled_is_all_grass() {
        let config = Config {
            terrain_system_enabled: false,
            ..small_config()
        };
        let (map, _) = reset_map(&Terrain::filled(32, Material::Water), &config);
        assert_eq!(map.tile(16, 16).unwrap().material(), Material::Grass);
        assert_eq!(map.tile(10, 10).unwrap().material(), Material::Grass);
        assert_eq!(map.tile(0, 0).unwrap().material(), Material::Void);
    }

    #[test]
    fn test_disable_stone() {
        let config = Config {
            terrain_disable_stone: true,
            ..small_config()
        };
        let (map, _) = reset_map(&Terrain::filled(32, Material::Stone), &config);
        assert_eq!(map.tile(16, 16).unwrap().material(), Material::Grass);
    }

    #[test]
    fn test_harvest_registers_active_tile() {
        let config = small_config();
        let (mut map, mut table) = reset_map(&Terrain::filled(32, Material::Foliage), &config);
        assert_eq!(
            map.harvest(16, 16, true, &mut table).unwrap(),
            Some(Material::Foliage)
        );
        assert!(map.active_tiles().contains(&Position::new(16, 16)));
        assert!(map.habitable(16, 16));

        for _ in 0..Material::Foliage.respawn_ticks() {
            map.step(&mut table);
        }
        assert!(map.active_tiles().is_empty());
        assert!(!map.tile(16, 16).unwrap().depleted());
    }

    #[test]
    fn test_non_depleting_harvest_never_registers() {
        let config = small_config();
        let mut terrain = Terrain::filled(32, Material::Grass);
        terrain.set(16, 17, Material::Water);
        let (mut map, mut table) = reset_map(&terrain, &config);
        assert_eq!(map.harvest(16, 17, false, &mut table).unwrap(), Some(Material::Water));
        assert!(map.active_tiles().is_empty());
        assert_eq!(
            map.find_adjacent(Position::new(16, 16), Material::Water),
            Some(Position::new(16, 17))
        );
    }

    #[test]
    fn test_out_of_bounds() {
        let config = small_config();
        let (mut map, mut table) = reset_map(&Terrain::filled(32, Material::Grass), &config);
        assert!(map.tile(-1, 0).is_err());
        assert!(matches!(
            map.harvest(32, 0, true, &mut table),
            Err(RealmError::InvalidPosition { row: 32, col: 0 })
        ));
        assert!(!map.habitable(40, 40));
    }

    #[test]
    fn test_terraform_changes_habitability_and_memo() {
        let config = small_config();
        let (mut map, mut table) = reset_map(&Terrain::filled(32, Material::Grass), &config);
        let start = Position::new(16, 12);
        let goal = Position::new(16, 20);
        assert_eq!(map.next_step(start, goal, 64), Some(Direction::East));

        map.terraform(16, 13, Material::Stone, &mut table).unwrap();
        assert!(!map.habitable(16, 13));
        assert_ne!(map.next_step(start, goal, 64), Some(Direction::East));
    }

    #[test]
    fn test_path_memo_is_bounded() {
        let config = Config {
            pathfinding_memo_capacity: 8,
            ..small_config()
        };
        let (mut map, _) = reset_map(&Terrain::filled(32, Material::Grass), &config);
        let goal = Position::new(16, 20);
        for col in 8..24 {
            for row in 8..24 {
                let expected = pathfinding::next_step(&map.nav, Position::new(row, col), goal, 64);
                assert_eq!(map.next_step(Position::new(row, col), goal, 64), expected);
                assert!(map.path_memo.len() <= 8);
            }
        }

        let config = Config {
            pathfinding_memo_capacity: 0,
            ..small_config()
        };
        let (mut map, _) = reset_map(&Terrain::filled(32, Material::Grass), &config);
        assert_eq!(map.next_step(Position::new(16, 12), goal, 64), Some(Direction::East));
        assert!(map.path_memo.is_empty());
    }
}
