//! Columnar entity-state store.
//!
//! Every kind of state (entities, items, tiles, events) lives in a
//! fixed-width `i32` table with one row per live record. Column sets are
//! schema enums whose discriminant is the column index, so readers and
//! writers share one compile-time contract.
//!
//! Queries return [`Frame`]s: owned copies of the matching rows. A record
//! stays visible to every query until its row is deleted, so entity
//! removal must always go through [`Table::delete`].

use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Index of a row within a table.
pub type RowId = usize;

/// A column set.
pub trait Schema: Copy + Eq + Hash + std::fmt::Debug + 'static {
    /// Table name.
    const NAME: &'static str;
    /// Every column in index order.
    const COLUMNS: &'static [Self];

    /// Column index.
    fn index(self) -> usize;

    /// Number of columns.
    #[must_use]
    fn width() -> usize {
        Self::COLUMNS.len()
    }
}

/// Entity table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EntityAttr {
    Id,
    /// 0 for players, otherwise the NPC disposition code.
    NpcType,
    Row,
    Col,
    Health,
    Food,
    Water,
    Gold,
    MeleeLevel,
    MeleeExp,
    RangeLevel,
    RangeExp,
    MageLevel,
    MageExp,
    /// Damage taken on the latest hit.
    Damage,
    TimeAlive,
    AttackerId,
    LatestCombatTick,
    /// Sum of equipped item levels.
    ItemLevel,
}

impl Schema for EntityAttr {
    const NAME: &'static str = "Entity";
    const COLUMNS: &'static [Self] = &[
        Self::Id,
        Self::NpcType,
        Self::Row,
        Self::Col,
        Self::Health,
        Self::Food,
        Self::Water,
        Self::Gold,
        Self::MeleeLevel,
        Self::MeleeExp,
        Self::RangeLevel,
        Self::RangeExp,
        Self::MageLevel,
        Self::MageExp,
        Self::Damage,
        Self::TimeAlive,
        Self::AttackerId,
        Self::LatestCombatTick,
        Self::ItemLevel,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Item table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ItemAttr {
    Id,
    TypeId,
    OwnerId,
    Quantity,
    Level,
    MeleeAttack,
    RangeAttack,
    MageAttack,
    MeleeDefense,
    RangeDefense,
    MageDefense,
    Equipped,
    ListedPrice,
}

impl Schema for ItemAttr {
    const NAME: &'static str = "Item";
    const COLUMNS: &'static [Self] = &[
        Self::Id,
        Self::TypeId,
        Self::OwnerId,
        Self::Quantity,
        Self::Level,
        Self::MeleeAttack,
        Self::RangeAttack,
        Self::MageAttack,
        Self::MeleeDefense,
        Self::RangeDefense,
        Self::MageDefense,
        Self::Equipped,
        Self::ListedPrice,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Tile table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum TileAttr {
    Row,
    Col,
    /// Index of the visible material.
    MaterialId,
}

impl TileAttr {
    /// Number of tile columns.
    pub const COUNT: usize = 3;
}

impl Schema for TileAttr {
    const NAME: &'static str = "Tile";
    const COLUMNS: &'static [Self] = &[Self::Row, Self::Col, Self::MaterialId];

    fn index(self) -> usize {
        self as usize
    }
}

/// Event table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EventAttr {
    Id,
    EntId,
    Tick,
    Event,
    Type,
    Level,
    Number,
    Gold,
    TargetEnt,
}

impl Schema for EventAttr {
    const NAME: &'static str = "Event";
    const COLUMNS: &'static [Self] = &[
        Self::Id,
        Self::EntId,
        Self::Tick,
        Self::Event,
        Self::Type,
        Self::Level,
        Self::Number,
        Self::Gold,
        Self::TargetEnt,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Fixed-width integer table with a free list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Table<S: Schema> {
    data: Vec<i32>,
    live: Vec<bool>,
    free: Vec<RowId>,
    #[serde(skip)]
    schema: PhantomData<S>,
}

impl<S: Schema> Default for Table<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> Table<S> {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            live: Vec::new(),
            free: Vec::new(),
            schema: PhantomData,
        }
    }

    /// Claim a zeroed row.
    pub fn insert(&mut self) -> RowId {
        if let Some(row) = self.free.pop() {
            self.live[row] = true;
            return row;
        }
        let row = self.live.len();
        self.live.push(true);
        self.data.resize(self.data.len() + S::width(), 0);
        row
    }

    /// Write a cell. Writes to released rows are ignored.
    pub fn set(&mut self, row: RowId, attr: S, value: i32) {
        if self.is_live(row) {
            self.data[row * S::width() + attr.index()] = value;
        }
    }

    /// Read a cell. Released rows read as zero.
    #[must_use]
    pub fn get(&self, row: RowId, attr: S) -> i32 {
        if self.is_live(row) {
            self.data[row * S::width() + attr.index()]
        } else {
            0
        }
    }

    /// Overwrite a whole row. `values` shorter than the width leave the
    /// remaining cells untouched.
    pub fn set_row(&mut self, row: RowId, values: &[i32]) {
        if self.is_live(row) {
            let start = row * S::width();
            for (cell, value) in self.data[start..start + S::width()].iter_mut().zip(values) {
                *cell = *value;
            }
        }
    }

    /// Zero a row and release it for reuse.
    pub fn delete(&mut self, row: RowId) {
        if self.is_live(row) {
            let start = row * S::width();
            self.data[start..start + S::width()].fill(0);
            self.live[row] = false;
            self.free.push(row);
        }
    }

    /// Drop every row.
    pub fn clear(&mut self) {
        self.data.clear();
        self.live.clear();
        self.free.clear();
    }

    /// Whether the row holds a record.
    #[must_use]
    pub fn is_live(&self, row: RowId) -> bool {
        self.live.get(row).copied().unwrap_or(false)
    }

    /// Number of live rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len() - self.free.len()
    }

    /// No live rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rows(&self) -> impl Iterator<Item = &[i32]> {
        self.data
            .chunks_exact(S::width())
            .zip(&self.live)
            .filter_map(|(row, live)| live.then_some(row))
    }

    /// Live rows matching a predicate, in row order.
    pub fn select(&self, predicate: impl Fn(&[i32]) -> bool) -> Frame<S> {
        let mut frame = Frame::empty();
        for row in self.rows().filter(|row| predicate(row)) {
            frame.push(row);
        }
        frame
    }

    /// Every live row.
    #[must_use]
    pub fn all(&self) -> Frame<S> {
        self.select(|_| true)
    }

    /// Rows where `attr == value`.
    #[must_use]
    pub fn where_eq(&self, attr: S, value: i32) -> Frame<S> {
        let index = attr.index();
        self.select(|row| row[index] == value)
    }

    /// Rows where `attr != value`.
    #[must_use]
    pub fn where_neq(&self, attr: S, value: i32) -> Frame<S> {
        let index = attr.index();
        self.select(|row| row[index] != value)
    }

    /// Rows where `attr` is one of `values`.
    #[must_use]
    pub fn where_in(&self, attr: S, values: &[i32]) -> Frame<S> {
        let index = attr.index();
        self.select(|row| values.contains(&row[index]))
    }

    /// Rows where `attr` falls in an inclusive range.
    #[must_use]
    pub fn where_range(&self, attr: S, range: RangeInclusive<i32>) -> Frame<S> {
        let index = attr.index();
        self.select(|row| range.contains(&row[index]))
    }
}

/// Owned copy of selected rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Frame<S: Schema> {
    data: Vec<i32>,
    #[serde(skip)]
    schema: PhantomData<S>,
}

impl<S: Schema> Frame<S> {
    /// A frame with no rows.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            schema: PhantomData,
        }
    }

    fn push(&mut self, row: &[i32]) {
        self.data.extend_from_slice(row);
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / S::width()
    }

    /// No rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// One row, if present.
    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[i32]> {
        let start = i * S::width();
        self.data.get(start..start + S::width())
    }

    /// One cell. Missing rows read as zero.
    #[must_use]
    pub fn get(&self, i: usize, attr: S) -> i32 {
        self.data
            .get(i * S::width() + attr.index())
            .copied()
            .unwrap_or(0)
    }

    /// All values of one column.
    #[must_use]
    pub fn column(&self, attr: S) -> Vec<i32> {
        self.iter_rows().map(|row| row[attr.index()]).collect()
    }

    /// Rows matching a predicate.
    #[must_use]
    pub fn filter(&self, predicate: impl Fn(&[i32]) -> bool) -> Self {
        let mut frame = Self::empty();
        for row in self.iter_rows().filter(|row| predicate(row)) {
            frame.push(row);
        }
        frame
    }

    /// Iterate rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[i32]> {
        self.data.chunks_exact(S::width())
    }
}

/// Dense `size x size x TileAttr::COUNT` copy of the tile table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileMap {
    size: i32,
    data: Vec<i32>,
}

impl TileMap {
    /// Side length.
    #[must_use]
    pub const fn size(&self) -> i32 {
        self.size
    }

    /// One tile attribute. Out-of-range cells read as zero (void).
    #[must_use]
    pub fn get(&self, row: i32, col: i32, attr: TileAttr) -> i32 {
        if row < 0 || col < 0 || row >= self.size || col >= self.size {
            return 0;
        }
        let cell = (row as usize) * (self.size as usize) + col as usize;
        self.data[cell * TileAttr::COUNT + attr.index()]
    }

    /// Square slice of side `2 * radius + 1` centered on `(row, col)`.
    /// Cells past the map edge are zero.
    #[must_use]
    pub fn window(&self, row: i32, col: i32, radius: i32) -> Self {
        let side = 2 * radius.max(0) + 1;
        let mut data = Vec::with_capacity((side * side) as usize * TileAttr::COUNT);
        for r in row - radius..=row + radius {
            for c in col - radius..=col + radius {
                for attr in TileAttr::COLUMNS {
                    data.push(self.get(r, c, *attr));
                }
            }
        }
        Self { size: side, data }
    }
}

/// The entity, item and tile tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Datastore {
    /// One row per live entity.
    pub entities: Table<EntityAttr>,
    /// One row per existing item.
    pub items: Table<ItemAttr>,
    /// One row per tile, written at reset.
    pub tiles: Table<TileAttr>,
    next_item_id: i32,
}

impl Datastore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every row and restart item ids.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.items.clear();
        self.tiles.clear();
        self.next_item_id = 0;
    }

    /// Allocate the next item id (1, 2, ...).
    pub fn next_item_id(&mut self) -> i32 {
        self.next_item_id += 1;
        self.next_item_id
    }

    /// Row of an entity id. Empty frame when absent.
    #[must_use]
    pub fn entity_by_id(&self, id: EntityId) -> Frame<EntityAttr> {
        self.entities.where_eq(EntityAttr::Id, id)
    }

    /// All entity rows inside the inclusive square of `radius` around
    /// `(row, col)`.
    #[must_use]
    pub fn window(&self, row: i32, col: i32, radius: i32) -> Frame<EntityAttr> {
        let r = EntityAttr::Row.index();
        let c = EntityAttr::Col.index();
        self.entities.select(|cells| {
            (cells[r] - row).abs() <= radius && (cells[c] - col).abs() <= radius
        })
    }

    /// Materialize the tile table as a dense grid.
    #[must_use]
    pub fn get_map(&self, size: i32) -> TileMap {
        let size = size.max(0);
        let mut data = vec![0; (size as usize) * (size as usize) * TileAttr::COUNT];
        for row in self.tiles.rows() {
            let (r, c) = (row[TileAttr::Row.index()], row[TileAttr::Col.index()]);
            if r < 0 || c < 0 || r >= size || c >= size {
                continue;
            }
            let start = ((r as usize) * (size as usize) + c as usize) * TileAttr::COUNT;
            data[start..start + TileAttr::COUNT].copy_from_slice(row);
        }
        TileMap { size, data }
    }

    /// Items whose owner is `owner`.
    #[must_use]
    pub fn items_owned_by(&self, owner: EntityId) -> Frame<ItemAttr> {
        self.items.where_eq(ItemAttr::OwnerId, owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_row(table: &mut Table<EntityAttr>, id: i32, row: i32, col: i32) -> RowId {
        let r = table.insert();
        table.set(r, EntityAttr::Id, id);
        table.set(r, EntityAttr::Row, row);
        table.set(r, EntityAttr::Col, col);
        r
    }

    #[test]
    fn test_column_indices_match_discriminants() {
        for (i, attr) in EntityAttr::COLUMNS.iter().enumerate() {
            assert_eq!(attr.index(), i);
        }
        for (i, attr) in EventAttr::COLUMNS.iter().enumerate() {
            assert_eq!(attr.index(), i);
        }
        assert_eq!(TileAttr::COLUMNS.len(), TileAttr::COUNT);
    }

    #[test]
    fn test_insert_delete_reuses_rows() {
        let mut table: Table<EntityAttr> = Table::new();
        let a = entity_row(&mut table, 1, 0, 0);
        let b = entity_row(&mut table, 2, 0, 0);
        assert_eq!(table.len(), 2);

        table.delete(a);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(a, EntityAttr::Id), 0);

        let c = table.insert();
        assert_eq!(c, a);
        assert_eq!(table.get(c, EntityAttr::Id), 0);
        assert_eq!(table.get(b, EntityAttr::Id), 2);
    }

    #[test]
    fn test_filters() {
        let mut table: Table<EntityAttr> = Table::new();
        for id in 1..=5 {
            entity_row(&mut table, id, id * 2, 0);
        }
        assert_eq!(table.where_eq(EntityAttr::Id, 3).len(), 1);
        assert_eq!(table.where_neq(EntityAttr::Id, 3).len(), 4);
        assert_eq!(
            table.where_in(EntityAttr::Id, &[1, 5, 9]).column(EntityAttr::Id),
            vec![1, 5]
        );
        assert_eq!(
            table.where_range(EntityAttr::Row, 4..=8).column(EntityAttr::Id),
            vec![2, 3, 4]
        );
        let frame = table.all().filter(|row| row[EntityAttr::Id.index()] % 2 == 0);
        assert_eq!(frame.column(EntityAttr::Id), vec![2, 4]);
    }

    #[test]
    fn test_entity_by_id_absent_is_empty() {
        let ds = Datastore::new();
        assert!(ds.entity_by_id(7).is_empty());
        assert_eq!(ds.entity_by_id(7).row(0), None);
    }

    #[test]
    fn test_window_is_inclusive() {
        let mut ds = Datastore::new();
        entity_row(&mut ds.entities, 1, 10, 10);
        entity_row(&mut ds.entities, 2, 13, 7);
        entity_row(&mut ds.entities, 3, 14, 10);
        let ids = ds.window(10, 10, 3).column(EntityAttr::Id);
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_stale_row_stays_visible_until_deleted() {
        let mut ds = Datastore::new();
        let row = entity_row(&mut ds.entities, 4, 20, 20);
        // An entity dropped from its manager without deleting its row is
        // still returned by spatial queries.
        assert_eq!(ds.window(20, 20, 1).column(EntityAttr::Id), vec![4]);
        ds.entities.delete(row);
        assert!(ds.window(20, 20, 1).is_empty());
    }

    #[test]
    fn test_get_map_and_window() {
        let mut ds = Datastore::new();
        for r in 0..4 {
            for c in 0..4 {
                let row = ds.tiles.insert();
                ds.tiles.set(row, TileAttr::Row, r);
                ds.tiles.set(row, TileAttr::Col, c);
                ds.tiles.set(row, TileAttr::MaterialId, r * 4 + c);
            }
        }
        let map = ds.get_map(4);
        assert_eq!(map.get(2, 3, TileAttr::MaterialId), 11);

        let window = map.window(0, 0, 1);
        assert_eq!(window.size(), 3);
        // Top-left cell of the window is off the map.
        assert_eq!(window.get(0, 0, TileAttr::MaterialId), 0);
        assert_eq!(window.get(1, 1, TileAttr::Row), 0);
        assert_eq!(window.get(2, 2, TileAttr::MaterialId), 5);
    }

    #[test]
    fn test_item_ids_are_monotonic() {
        let mut ds = Datastore::new();
        assert_eq!(ds.next_item_id(), 1);
        assert_eq!(ds.next_item_id(), 2);
        ds.clear();
        assert_eq!(ds.next_item_id(), 1);
    }
}
