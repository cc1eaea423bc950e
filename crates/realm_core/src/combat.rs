//! Combat resolution.
//!
//! Damage is `multiplier * (offense - defense)`, floored and clamped at
//! zero:
//! - offense: style base damage, per-level scaling of the attacker's style
//!   skill, and equipped weapon/ammunition for that style
//! - defense: per-level scaling of the target's highest skill level and
//!   equipped armor
//! - multiplier: the configured weakness multiplier when the attacker's
//!   style is the weakness of the target's most practiced style, else 1

use serde::{Deserialize, Serialize};

use crate::action::Style;
use crate::config::Config;
use crate::datastore::Datastore;
use crate::entity::Entity;
use crate::math::Fixed;

/// Result of one resolved attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    /// Damage dealt. Never negative.
    pub damage: u32,
    /// The hit killed the target.
    pub killed: bool,
    /// Attacker's new style level, on a level up.
    pub level_up: Option<u32>,
}

/// Damage multiplier of `style` against `target`.
///
/// Exactly one when the target's three experiences are equal.
#[must_use]
pub fn damage_multiplier(config: &Config, style: Style, target: &Entity) -> Fixed {
    match target.skills.dominant() {
        Some(dominant) if dominant.weakness() == style => config.weakness_multiplier(),
        _ => Fixed::ONE,
    }
}

/// Damage `attacker` would deal to `target` with `style`. Pure.
#[must_use]
pub fn damage(config: &Config, attacker: &Entity, target: &Entity, style: Style) -> u32 {
    let attacker_level = attacker.skills.level(style) as i32;
    let target_level = target.combat_level() as i32;

    let offense = style.base_damage(config)
        + style.level_damage(config) * attacker_level
        + attacker.inventory.equipment.offense(style, config);
    let defense =
        config.progression_defense * target_level + target.inventory.equipment.defense(config);

    let raw = offense - defense;
    if raw <= 0 {
        return 0;
    }
    let scaled = damage_multiplier(config, style, target) * Fixed::from_num(raw);
    scaled.floor().to_num::<i64>().max(0) as u32
}

/// Resolve an attack and apply its side effects.
///
/// Equipped ammunition is spent before damage is computed, whether or not
/// the hit lands, so a stack's last unit adds nothing to its own shot. The
/// attacker gains experience in `style`; the target takes damage through
/// its own intake path and, if it dies, records the attacker as its killer.
pub fn attack(
    config: &Config,
    ds: &mut Datastore,
    attacker: &mut Entity,
    target: &mut Entity,
    style: Style,
    tick: u64,
) -> AttackOutcome {
    attacker.inventory.equipment.fire_ammunition(ds);
    let dealt = damage(config, attacker, target, style);

    let level_up = attacker.gain_exp(style, dealt, config, &mut ds.entities);
    let killed = target.receive_damage(attacker.id(), dealt, tick, config, &mut ds.entities);
    if killed {
        attacker.history.kills += 1;
        attacker.commit(&mut ds.entities);
    }

    AttackOutcome {
        damage: dealt,
        killed,
        level_up,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::ItemAttr;
    use crate::item::{Item, ItemKind, Slot};
    use crate::math::Position;
    use proptest::prelude::*;

    fn pair(config: &Config) -> (Entity, Entity) {
        (
            Entity::player(1, Position::new(20, 20), config),
            Entity::player(2, Position::new(20, 21), config),
        )
    }

    #[test]
    fn test_base_damage() {
        let config = Config::default();
        let (attacker, target) = pair(&config);
        // 30 + 5 * 1 - 5 * 1
        assert_eq!(damage(&config, &attacker, &target, Style::Melee), 30);
    }

    #[test]
    fn test_tie_multiplier_is_one() {
        let config = Config::default();
        let (_, mut target) = pair(&config);
        for style in Style::ALL {
            assert_eq!(damage_multiplier(&config, style, &target), Fixed::ONE);
        }
        for style in Style::ALL {
            target.skills.add_exp(style, 40, &config);
        }
        for style in Style::ALL {
            assert_eq!(damage_multiplier(&config, style, &target), Fixed::ONE);
        }
    }

    #[test]
    fn test_weakness_multiplier_applies() {
        let config = Config::default();
        let (attacker, mut target) = pair(&config);
        target.skills.add_exp(Style::Melee, 5, &config);
        assert_eq!(
            damage_multiplier(&config, Style::Melee.weakness(), &target),
            config.weakness_multiplier()
        );
        assert_eq!(damage_multiplier(&config, Style::Melee, &target), Fixed::ONE);
        // 1.5 * 30
        assert_eq!(damage(&config, &attacker, &target, Style::Mage), 45);
    }

    #[test]
    fn test_armor_clamps_to_zero() {
        let config = Config::default();
        let mut ds = Datastore::new();
        let (attacker, mut target) = pair(&config);
        for kind in [ItemKind::Hat, ItemKind::Top, ItemKind::Bottom] {
            let item = Item::create(&mut ds, &config, kind, 5, 1, 2);
            target.inventory.equipment.equip(item, &mut ds);
        }
        assert_eq!(damage(&config, &attacker, &target, Style::Range), 0);
    }

    #[test]
    fn test_attack_side_effects() {
        let config = Config::default();
        let mut ds = Datastore::new();
        let (mut attacker, mut target) = pair(&config);
        attacker.insert_row(&mut ds.entities);
        target.insert_row(&mut ds.entities);
        let arrows = Item::create(&mut ds, &config, ItemKind::Arrow, 0, 3, 1);
        attacker.inventory.equipment.equip(arrows, &mut ds);

        let outcome = attack(&config, &mut ds, &mut attacker, &mut target, Style::Range, 3);
        // 30 + 5 + 10 arrows - 5
        assert_eq!(outcome.damage, 40);
        assert!(!outcome.killed);
        assert_eq!(outcome.level_up, Some(3));
        assert_eq!(target.resources.health, 60);
        assert_eq!(target.history.attacker, Some(1));
        assert_eq!(attacker.skills.exp(Style::Range), 40);
        assert_eq!(
            attacker
                .inventory
                .equipment
                .get(Slot::Ammunition)
                .map(Item::quantity),
            Some(2)
        );
        assert_eq!(ds.items.all().get(0, ItemAttr::Quantity), 2);
    }

    #[test]
    fn test_last_arrow_spent_before_hit() {
        let config = Config::default();
        let mut ds = Datastore::new();
        let (mut attacker, mut target) = pair(&config);
        attacker.insert_row(&mut ds.entities);
        target.insert_row(&mut ds.entities);
        let arrows = Item::create(&mut ds, &config, ItemKind::Arrow, 0, 1, 1);
        attacker.inventory.equipment.equip(arrows, &mut ds);
        assert_eq!(damage(&config, &attacker, &target, Style::Range), 40);

        let outcome = attack(&config, &mut ds, &mut attacker, &mut target, Style::Range, 1);
        // 30 + 5 - 5, the stack is gone
        assert_eq!(outcome.damage, 30);
        assert!(attacker.inventory.equipment.get(Slot::Ammunition).is_none());
        assert!(ds.items.is_empty());
    }

    #[test]
    fn test_killing_blow() {
        let config = Config::default();
        let mut ds = Datastore::new();
        let (mut attacker, mut target) = pair(&config);
        target.resources.health = 10;
        let outcome = attack(&config, &mut ds, &mut attacker, &mut target, Style::Melee, 1);
        assert!(outcome.killed);
        assert_eq!(attacker.history.kills, 1);
        assert_eq!(target.history.killed_by, Some(1));
    }

    proptest! {
        #[test]
        fn prop_damage_never_negative(
            exp in proptest::array::uniform3(0u32..2_000),
            armor in 0u32..10,
            level in 1u32..10,
            style_index in 0usize..3,
        ) {
            let config = Config::default();
            let mut ds = Datastore::new();
            let (mut attacker, mut target) = pair(&config);
            let style = Style::ALL[style_index];
            attacker.skills.set_level(style, level, &config);
            for (s, e) in Style::ALL.into_iter().zip(exp) {
                target.skills.add_exp(s, e, &config);
            }
            let hat = Item::create(&mut ds, &config, ItemKind::Hat, armor, 1, 2);
            target.inventory.equipment.equip(hat, &mut ds);

            let dealt = damage(&config, &attacker, &target, style);
            let outcome = attack(&config, &mut ds, &mut attacker, &mut target, style, 1);
            prop_assert_eq!(outcome.damage, dealt);
            prop_assert!(target.resources.health <= config.player_base_health);
        }
    }
}
