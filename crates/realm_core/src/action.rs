//! Per-entity intents for one tick.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::entity::EntityId;
use crate::math::Position;

/// Cardinal movement direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Row - 1.
    North,
    /// Row + 1.
    South,
    /// Col + 1.
    East,
    /// Col - 1.
    West,
}

impl Direction {
    /// All directions in a fixed order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Row/column delta of one step.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (-1, 0),
            Self::South => (1, 0),
            Self::East => (0, 1),
            Self::West => (0, -1),
        }
    }

    /// Direction of a single orthogonal step from `from` to `to`.
    #[must_use]
    pub fn between(from: Position, to: Position) -> Option<Self> {
        let delta = (to.row - from.row, to.col - from.col);
        Self::ALL.into_iter().find(|d| d.delta() == delta)
    }
}

/// Combat style.
///
/// Styles form a fixed cycle: Melee beats Range, Range beats Mage, Mage
/// beats Melee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Style {
    /// Close combat.
    Melee,
    /// Ranged combat.
    Range,
    /// Magic.
    Mage,
}

impl Style {
    /// All styles, in skill-table order.
    pub const ALL: [Style; 3] = [Style::Melee, Style::Range, Style::Mage];

    /// Index into per-style arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Melee => 0,
            Self::Range => 1,
            Self::Mage => 2,
        }
    }

    /// Value written to an event's type column.
    #[must_use]
    pub const fn event_type(self) -> i32 {
        self.index() as i32 + 1
    }

    /// The style this one is weak against.
    #[must_use]
    pub const fn weakness(self) -> Self {
        match self {
            Self::Melee => Self::Mage,
            Self::Range => Self::Melee,
            Self::Mage => Self::Range,
        }
    }

    /// Attack reach in tiles (L-infinity).
    #[must_use]
    pub const fn reach(self, config: &Config) -> i32 {
        match self {
            Self::Melee => config.combat_melee_reach,
            Self::Range => config.combat_range_reach,
            Self::Mage => config.combat_mage_reach,
        }
    }

    /// Damage before any level scaling.
    #[must_use]
    pub const fn base_damage(self, config: &Config) -> i32 {
        match self {
            Self::Melee => config.combat_melee_base_damage,
            Self::Range => config.combat_range_base_damage,
            Self::Mage => config.combat_mage_base_damage,
        }
    }

    /// Damage added per attacker level.
    #[must_use]
    pub const fn level_damage(self, config: &Config) -> i32 {
        match self {
            Self::Melee => config.progression_melee_damage,
            Self::Range => config.progression_range_damage,
            Self::Mage => config.progression_mage_damage,
        }
    }
}

impl std::fmt::Display for Style {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Melee => "melee",
            Self::Range => "range",
            Self::Mage => "mage",
        };
        f.write_str(name)
    }
}

/// An attack intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attack {
    /// Style used.
    pub style: Style,
    /// Target entity id.
    pub target: EntityId,
}

/// Everything one entity wants to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Action {
    /// Step in a direction.
    pub movement: Option<Direction>,
    /// Attack a target.
    pub attack: Option<Attack>,
}

impl Action {
    /// Do nothing.
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            movement: None,
            attack: None,
        }
    }

    /// Move one tile.
    #[must_use]
    pub const fn step(direction: Direction) -> Self {
        Self {
            movement: Some(direction),
            attack: None,
        }
    }

    /// Attack a target.
    #[must_use]
    pub const fn attack(target: EntityId, style: Style) -> Self {
        Self {
            movement: None,
            attack: Some(Attack { style, target }),
        }
    }

    /// Add a movement to this action.
    #[must_use]
    pub const fn with_movement(mut self, direction: Direction) -> Self {
        self.movement = Some(direction);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weakness_is_a_cycle() {
        for style in Style::ALL {
            assert_ne!(style.weakness(), style);
            assert_eq!(style.weakness().weakness().weakness(), style);
        }
    }

    #[test]
    fn test_direction_between() {
        let origin = Position::new(5, 5);
        for direction in Direction::ALL {
            let next = origin.offset(direction.delta());
            assert_eq!(Direction::between(origin, next), Some(direction));
        }
        assert_eq!(Direction::between(origin, Position::new(6, 6)), None);
    }

    #[test]
    fn test_event_types() {
        assert_eq!(Style::Melee.event_type(), 1);
        assert_eq!(Style::Range.event_type(), 2);
        assert_eq!(Style::Mage.event_type(), 3);
    }
}
