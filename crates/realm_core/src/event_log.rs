//! Append-only log of gameplay events.
//!
//! Each event code has a fixed payload shape. [`EventLog::record`] checks
//! the supplied fields against that shape before anything is written, so
//! every row in the table is well formed. The log is the only read path
//! into gameplay history.

use serde::{Deserialize, Serialize};

use crate::action::Style;
use crate::datastore::{EventAttr, Frame, Schema, Table};
use crate::entity::EntityId;
use crate::error::{RealmError, Result};

/// Event codes. The discriminant is written to the event column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum EventCode {
    /// Foraged food.
    EatFood = 1,
    /// Drank water.
    DrinkWater = 2,
    /// Reached a new maximum distance from spawn.
    GoFarthest = 3,
    /// Landed a hit.
    ScoreHit = 11,
    /// Killed an entity.
    PlayerKill = 12,
    /// Consumed an item.
    ConsumeItem = 21,
    /// Gave an item away.
    GiveItem = 22,
    /// Destroyed an item.
    DestroyItem = 23,
    /// Harvested an item from a tile.
    HarvestItem = 24,
    /// Equipped an item.
    EquipItem = 25,
    /// Looted an item.
    LootItem = 26,
    /// Gave gold away.
    GiveGold = 31,
    /// Listed an item for sale.
    ListItem = 32,
    /// Received gold.
    EarnGold = 33,
    /// Bought an item.
    BuyItem = 34,
    /// Gained a skill level.
    LevelUp = 41,
}

impl EventCode {
    /// Every code, ascending.
    pub const ALL: [EventCode; 16] = [
        Self::EatFood,
        Self::DrinkWater,
        Self::GoFarthest,
        Self::ScoreHit,
        Self::PlayerKill,
        Self::ConsumeItem,
        Self::GiveItem,
        Self::DestroyItem,
        Self::HarvestItem,
        Self::EquipItem,
        Self::LootItem,
        Self::GiveGold,
        Self::ListItem,
        Self::EarnGold,
        Self::BuyItem,
        Self::LevelUp,
    ];

    /// Integer code.
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Upper-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::EatFood => "EAT_FOOD",
            Self::DrinkWater => "DRINK_WATER",
            Self::GoFarthest => "GO_FARTHEST",
            Self::ScoreHit => "SCORE_HIT",
            Self::PlayerKill => "PLAYER_KILL",
            Self::ConsumeItem => "CONSUME_ITEM",
            Self::GiveItem => "GIVE_ITEM",
            Self::DestroyItem => "DESTROY_ITEM",
            Self::HarvestItem => "HARVEST_ITEM",
            Self::EquipItem => "EQUIP_ITEM",
            Self::LootItem => "LOOT_ITEM",
            Self::GiveGold => "GIVE_GOLD",
            Self::ListItem => "LIST_ITEM",
            Self::EarnGold => "EARN_GOLD",
            Self::BuyItem => "BUY_ITEM",
            Self::LevelUp => "LEVEL_UP",
        }
    }

    /// Look up a code by integer.
    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    fn shape(self) -> &'static [Field] {
        match self {
            Self::EatFood | Self::DrinkWater | Self::GiveItem | Self::DestroyItem | Self::GiveGold => &[],
            Self::GoFarthest => &[Field::Distance],
            Self::ScoreHit => &[Field::CombatStyle, Field::Damage],
            Self::PlayerKill => &[Field::Target],
            Self::ConsumeItem | Self::HarvestItem | Self::EquipItem | Self::LootItem => &[Field::Item],
            Self::ListItem | Self::BuyItem => &[Field::Item, Field::Price],
            Self::EarnGold => &[Field::Amount],
            Self::LevelUp => &[Field::Skill, Field::Level],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Distance,
    CombatStyle,
    Damage,
    Target,
    Item,
    Price,
    Amount,
    Skill,
    Level,
}

impl Field {
    const ALL: [Field; 9] = [
        Field::Distance,
        Field::CombatStyle,
        Field::Damage,
        Field::Target,
        Field::Item,
        Field::Price,
        Field::Amount,
        Field::Skill,
        Field::Level,
    ];

    const fn name(self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::CombatStyle => "combat_style",
            Self::Damage => "damage",
            Self::Target => "target",
            Self::Item => "item",
            Self::Price => "price",
            Self::Amount => "amount",
            Self::Skill => "skill",
            Self::Level => "level",
        }
    }
}

/// Reference to an item in an event payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    /// Catalog type id.
    pub type_id: i32,
    /// Item level.
    pub level: i32,
    /// Stack size.
    pub quantity: i32,
}

/// Optional payload fields for an event.
///
/// Values are wide signed integers so out-of-range input reaches
/// validation instead of wrapping silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    distance: Option<i64>,
    combat_style: Option<Style>,
    damage: Option<i64>,
    target: Option<(EntityId, i64)>,
    item: Option<ItemRef>,
    price: Option<i64>,
    amount: Option<i64>,
    skill: Option<Style>,
    level: Option<i64>,
}

impl EventFields {
    /// No fields.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            distance: None,
            combat_style: None,
            damage: None,
            target: None,
            item: None,
            price: None,
            amount: None,
            skill: None,
            level: None,
        }
    }

    /// Distance travelled.
    #[must_use]
    pub const fn with_distance(mut self, distance: i64) -> Self {
        self.distance = Some(distance);
        self
    }

    /// Style of a hit.
    #[must_use]
    pub const fn with_combat_style(mut self, style: Style) -> Self {
        self.combat_style = Some(style);
        self
    }

    /// Damage dealt.
    #[must_use]
    pub const fn with_damage(mut self, damage: i64) -> Self {
        self.damage = Some(damage);
        self
    }

    /// Entity affected and its level.
    #[must_use]
    pub const fn with_target(mut self, target: EntityId, level: i64) -> Self {
        self.target = Some((target, level));
        self
    }

    /// Item involved.
    #[must_use]
    pub const fn with_item(mut self, item: ItemRef) -> Self {
        self.item = Some(item);
        self
    }

    /// Sale price.
    #[must_use]
    pub const fn with_price(mut self, price: i64) -> Self {
        self.price = Some(price);
        self
    }

    /// Gold amount.
    #[must_use]
    pub const fn with_amount(mut self, amount: i64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Skill involved.
    #[must_use]
    pub const fn with_skill(mut self, skill: Style) -> Self {
        self.skill = Some(skill);
        self
    }

    /// New level.
    #[must_use]
    pub const fn with_level(mut self, level: i64) -> Self {
        self.level = Some(level);
        self
    }

    const fn has(&self, field: Field) -> bool {
        match field {
            Field::Distance => self.distance.is_some(),
            Field::CombatStyle => self.combat_style.is_some(),
            Field::Damage => self.damage.is_some(),
            Field::Target => self.target.is_some(),
            Field::Item => self.item.is_some(),
            Field::Price => self.price.is_some(),
            Field::Amount => self.amount.is_some(),
            Field::Skill => self.skill.is_some(),
            Field::Level => self.level.is_some(),
        }
    }
}

/// Columns of one event row, besides id/entity/tick/code.
#[derive(Debug, Default)]
struct Payload {
    kind: i32,
    level: i32,
    number: i32,
    gold: i32,
    target: i32,
}

fn malformed(code: EventCode, reason: impl Into<String>) -> RealmError {
    RealmError::MalformedEvent {
        code: code.name(),
        reason: reason.into(),
    }
}

fn narrow(code: EventCode, field: &str, value: i64) -> Result<i32> {
    i32::try_from(value).map_err(|_| malformed(code, format!("{field} {value} out of range")))
}

/// Check `fields` against the shape of `code` and lay out the row payload.
fn validate(code: EventCode, fields: &EventFields) -> Result<Payload> {
    let shape = code.shape();
    for field in Field::ALL {
        let required = shape.contains(&field);
        let present = fields.has(field);
        if required && !present {
            return Err(malformed(code, format!("missing {}", field.name())));
        }
        if present && !required {
            return Err(malformed(code, format!("unexpected {}", field.name())));
        }
    }

    let mut payload = Payload::default();
    match code {
        EventCode::EatFood
        | EventCode::DrinkWater
        | EventCode::GiveItem
        | EventCode::DestroyItem
        | EventCode::GiveGold => {}
        EventCode::GoFarthest => {
            let distance = fields.distance.unwrap_or_default();
            if distance < 0 {
                return Err(malformed(code, format!("distance {distance} is negative")));
            }
            payload.number = narrow(code, "distance", distance)?;
        }
        EventCode::ScoreHit => {
            let damage = fields.damage.unwrap_or_default();
            if damage < 0 {
                return Err(malformed(code, format!("damage {damage} is negative")));
            }
            payload.kind = fields.combat_style.map_or(0, Style::event_type);
            payload.number = narrow(code, "damage", damage)?;
        }
        EventCode::PlayerKill => {
            let (target, level) = fields.target.unwrap_or_default();
            payload.target = target;
            payload.level = narrow(code, "level", level)?;
        }
        EventCode::ConsumeItem
        | EventCode::HarvestItem
        | EventCode::EquipItem
        | EventCode::LootItem
        | EventCode::ListItem
        | EventCode::BuyItem => {
            let item = fields.item.unwrap_or(ItemRef {
                type_id: 0,
                level: 0,
                quantity: 0,
            });
            payload.kind = item.type_id;
            payload.level = item.level;
            payload.number = item.quantity;
            if matches!(code, EventCode::ListItem | EventCode::BuyItem) {
                let price = fields.price.unwrap_or_default();
                if price <= 0 {
                    return Err(malformed(code, format!("price {price} must be positive")));
                }
                payload.gold = narrow(code, "price", price)?;
            }
        }
        EventCode::EarnGold => {
            let amount = fields.amount.unwrap_or_default();
            if amount <= 0 {
                return Err(malformed(code, format!("amount {amount} must be positive")));
            }
            payload.gold = narrow(code, "amount", amount)?;
        }
        EventCode::LevelUp => {
            let level = fields.level.unwrap_or_default();
            if level <= 0 {
                return Err(malformed(code, format!("level {level} must be positive")));
            }
            payload.kind = fields.skill.map_or(0, Style::event_type);
            payload.level = narrow(code, "level", level)?;
        }
    }
    Ok(payload)
}

/// Per-episode event table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EventLog {
    table: Table<EventAttr>,
    next_id: i32,
}

impl EventLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every event and restart ids at 1.
    pub fn reset(&mut self) {
        self.table.clear();
        self.next_id = 0;
    }

    /// Append an event.
    ///
    /// # Errors
    /// [`RealmError::MalformedEvent`] if `fields` do not match the shape of
    /// `code`. Nothing is written in that case.
    pub fn record(&mut self, tick: u64, code: EventCode, entity: EntityId, fields: EventFields) -> Result<()> {
        let payload = validate(code, &fields)?;
        let tick = i32::try_from(tick).map_err(|_| malformed(code, format!("tick {tick} out of range")))?;

        self.next_id += 1;
        let mut row = vec![0; EventAttr::width()];
        row[EventAttr::Id.index()] = self.next_id;
        row[EventAttr::EntId.index()] = entity;
        row[EventAttr::Tick.index()] = tick;
        row[EventAttr::Event.index()] = code.code();
        row[EventAttr::Type.index()] = payload.kind;
        row[EventAttr::Level.index()] = payload.level;
        row[EventAttr::Number.index()] = payload.number;
        row[EventAttr::Gold.index()] = payload.gold;
        row[EventAttr::TargetEnt.index()] = payload.target;

        let id = self.table.insert();
        self.table.set_row(id, &row);
        Ok(())
    }

    /// Events filtered by code and/or source entity, in insertion order.
    #[must_use]
    pub fn get_data(&self, event_code: Option<EventCode>, agents: Option<&[EntityId]>) -> Frame<EventAttr> {
        let event = EventAttr::Event.index();
        let ent = EventAttr::EntId.index();
        self.table.select(|row| {
            event_code.map_or(true, |code| row[event] == code.code())
                && agents.map_or(true, |agents| agents.contains(&row[ent]))
        })
    }

    /// Number of events recorded this episode.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// No events recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Underlying table.
    #[must_use]
    pub fn table(&self) -> &Table<EventAttr> {
        &self.table
    }
}
