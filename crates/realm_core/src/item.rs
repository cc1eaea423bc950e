//! Items and equipment.
//!
//! Every item has a row in the Item table for as long as it exists.
//! Offense and defense derive from the item kind, its level, and the
//! equipment parameters in [`Config`].

use serde::{Deserialize, Serialize};

use crate::action::Style;
use crate::config::Config;
use crate::datastore::{Datastore, ItemAttr, RowId};
use crate::entity::EntityId;

/// Equipment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Slot {
    /// Head armor.
    Hat,
    /// Body armor.
    Top,
    /// Leg armor.
    Bottom,
    /// Held weapon.
    Weapon,
    /// Consumed on every attack.
    Ammunition,
}

impl Slot {
    /// Number of slots.
    pub const COUNT: usize = 5;

    const fn index(self) -> usize {
        match self {
            Self::Hat => 0,
            Self::Top => 1,
            Self::Bottom => 2,
            Self::Weapon => 3,
            Self::Ammunition => 4,
        }
    }
}

/// Item catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemKind {
    /// Head armor.
    Hat,
    /// Body armor.
    Top,
    /// Leg armor.
    Bottom,
    /// Melee weapon.
    Spear,
    /// Range weapon.
    Bow,
    /// Mage weapon.
    Wand,
    /// Melee ammunition.
    Whetstone,
    /// Range ammunition.
    Arrow,
    /// Mage ammunition.
    Runes,
}

impl ItemKind {
    /// Stable type id written to the Item table.
    #[must_use]
    pub const fn type_id(self) -> i32 {
        match self {
            Self::Hat => 2,
            Self::Top => 3,
            Self::Bottom => 4,
            Self::Spear => 5,
            Self::Bow => 6,
            Self::Wand => 7,
            Self::Whetstone => 13,
            Self::Arrow => 14,
            Self::Runes => 15,
        }
    }

    /// Slot the item occupies when equipped.
    #[must_use]
    pub const fn slot(self) -> Slot {
        match self {
            Self::Hat => Slot::Hat,
            Self::Top => Slot::Top,
            Self::Bottom => Slot::Bottom,
            Self::Spear | Self::Bow | Self::Wand => Slot::Weapon,
            Self::Whetstone | Self::Arrow | Self::Runes => Slot::Ammunition,
        }
    }

    /// Style boosted by a weapon or ammunition. Armor has none.
    #[must_use]
    pub const fn style(self) -> Option<Style> {
        match self {
            Self::Spear | Self::Whetstone => Some(Style::Melee),
            Self::Bow | Self::Arrow => Some(Style::Range),
            Self::Wand | Self::Runes => Some(Style::Mage),
            Self::Hat | Self::Top | Self::Bottom => None,
        }
    }

    /// Weapon for a combat style.
    #[must_use]
    pub const fn weapon_for(style: Style) -> Self {
        match style {
            Style::Melee => Self::Spear,
            Style::Range => Self::Bow,
            Style::Mage => Self::Wand,
        }
    }

    /// Ammunition for a combat style.
    #[must_use]
    pub const fn ammunition_for(style: Style) -> Self {
        match style {
            Style::Melee => Self::Whetstone,
            Style::Range => Self::Arrow,
            Style::Mage => Self::Runes,
        }
    }
}

/// One item instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    id: i32,
    kind: ItemKind,
    level: u32,
    quantity: u32,
    row: RowId,
}

impl Item {
    /// Create an item and write its row.
    pub fn create(
        ds: &mut Datastore,
        config: &Config,
        kind: ItemKind,
        level: u32,
        quantity: u32,
        owner: EntityId,
    ) -> Self {
        let id = ds.next_item_id();
        let row = ds.items.insert();
        let item = Self {
            id,
            kind,
            level,
            quantity,
            row,
        };

        let table = &mut ds.items;
        table.set(row, ItemAttr::Id, id);
        table.set(row, ItemAttr::TypeId, kind.type_id());
        table.set(row, ItemAttr::OwnerId, owner);
        table.set(row, ItemAttr::Quantity, quantity as i32);
        table.set(row, ItemAttr::Level, level as i32);
        table.set(row, ItemAttr::MeleeAttack, item.attack(Style::Melee, config));
        table.set(row, ItemAttr::RangeAttack, item.attack(Style::Range, config));
        table.set(row, ItemAttr::MageAttack, item.attack(Style::Mage, config));
        table.set(row, ItemAttr::MeleeDefense, item.defense(config));
        table.set(row, ItemAttr::RangeDefense, item.defense(config));
        table.set(row, ItemAttr::MageDefense, item.defense(config));
        item
    }

    /// Item id.
    #[must_use]
    pub const fn id(&self) -> i32 {
        self.id
    }

    /// Catalog entry.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Item level.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Remaining stack size.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Offense added to attacks of `style`.
    #[must_use]
    pub fn attack(&self, style: Style, config: &Config) -> i32 {
        if self.kind.style() != Some(style) {
            return 0;
        }
        let level = self.level as i32;
        match self.kind.slot() {
            Slot::Weapon => {
                config.equipment_weapon_base_damage + config.equipment_weapon_level_damage * level
            }
            Slot::Ammunition => {
                config.equipment_ammunition_base_damage
                    + config.equipment_ammunition_level_damage * level
            }
            Slot::Hat | Slot::Top | Slot::Bottom => 0,
        }
    }

    /// Defense against every style. Only armor defends.
    #[must_use]
    pub fn defense(&self, config: &Config) -> i32 {
        match self.kind.slot() {
            Slot::Hat | Slot::Top | Slot::Bottom => {
                config.equipment_armor_base_defense
                    + config.equipment_armor_level_defense * self.level as i32
            }
            Slot::Weapon | Slot::Ammunition => 0,
        }
    }

    /// Delete the item's row.
    pub fn destroy(self, ds: &mut Datastore) {
        ds.items.delete(self.row);
    }
}

/// Equipped items, one per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Equipment {
    slots: [Option<Item>; Slot::COUNT],
}

impl Equipment {
    /// Equip an item, returning whatever it replaced.
    pub fn equip(&mut self, item: Item, ds: &mut Datastore) -> Option<Item> {
        ds.items.set(item.row, ItemAttr::Equipped, 1);
        let replaced = self.slots[item.kind.slot().index()].replace(item);
        if let Some(old) = &replaced {
            ds.items.set(old.row, ItemAttr::Equipped, 0);
        }
        replaced
    }

    /// Item in a slot.
    #[must_use]
    pub fn get(&self, slot: Slot) -> Option<&Item> {
        self.slots[slot.index()].as_ref()
    }

    /// Equipped items in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.slots.iter().flatten()
    }

    /// Total offense for `style`.
    #[must_use]
    pub fn offense(&self, style: Style, config: &Config) -> i32 {
        self.iter().map(|item| item.attack(style, config)).sum()
    }

    /// Total defense.
    #[must_use]
    pub fn defense(&self, config: &Config) -> i32 {
        self.iter().map(|item| item.defense(config)).sum()
    }

    /// Sum of equipped item levels.
    #[must_use]
    pub fn item_level(&self) -> i32 {
        self.iter().map(|item| item.level as i32).sum()
    }

    /// Spend one unit of ammunition, if any is equipped. The stack is
    /// destroyed when it reaches zero. Returns whether a unit was spent.
    pub fn fire_ammunition(&mut self, ds: &mut Datastore) -> bool {
        let slot = &mut self.slots[Slot::Ammunition.index()];
        let Some(ammunition) = slot.as_mut() else {
            return false;
        };
        ammunition.quantity = ammunition.quantity.saturating_sub(1);
        ds.items
            .set(ammunition.row, ItemAttr::Quantity, ammunition.quantity as i32);
        if ammunition.quantity == 0 {
            if let Some(spent) = slot.take() {
                spent.destroy(ds);
            }
        }
        true
    }

    /// Destroy every equipped item.
    pub fn destroy_all(&mut self, ds: &mut Datastore) {
        for slot in &mut self.slots {
            if let Some(item) = slot.take() {
                item.destroy(ds);
            }
        }
    }
}

/// Gold and equipment carried by an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Inventory {
    /// Gold held.
    pub gold: i32,
    /// Equipped items.
    pub equipment: Equipment,
}

impl Inventory {
    /// Destroy all items. Gold is kept for looting.
    pub fn destroy(&mut self, ds: &mut Datastore) {
        self.equipment.destroy_all(ds);
    }
}
