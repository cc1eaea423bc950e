//! Proptest strategies for realm testing.
//!
//! These strategies generate random but reproducible inputs for
//! property-based tests of spawn rules and determinism.

use std::collections::BTreeMap;

use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use realm_core::prelude::*;

/// Any movement direction.
pub fn arb_direction() -> impl Strategy<Value = Direction> {
    prop::sample::select(Direction::ALL.to_vec())
}

/// Any combat style.
pub fn arb_style() -> impl Strategy<Value = Style> {
    prop::sample::select(Style::ALL.to_vec())
}

/// A position inside the playable area of `config`.
pub fn arb_interior_position(config: &Config) -> impl Strategy<Value = Position> {
    let (low, high) = config.playable_range();
    (low..high, low..high).prop_map(|(row, col)| Position::new(row, col))
}

/// An action that may move and may attack one of `targets`.
pub fn arb_action(targets: Vec<EntityId>) -> impl Strategy<Value = Action> {
    let attack = if targets.is_empty() {
        Just(None).boxed()
    } else {
        prop::option::of((prop::sample::select(targets), arb_style()).prop_map(|(target, style)| Attack { style, target }))
            .boxed()
    };
    (prop::option::of(arb_direction()), attack).prop_map(|(movement, attack)| Action { movement, attack })
}

/// Actions for a subset of players `1..=player_n`, possibly attacking each
/// other.
pub fn arb_actions(player_n: u32) -> impl Strategy<Value = BTreeMap<EntityId, Action>> {
    let ids: Vec<EntityId> = (1..=player_n as EntityId).collect();
    let max = player_n as usize;
    btree_map(prop::sample::select(ids.clone()), arb_action(ids), 0..=max)
}

/// A script of per-tick action maps.
pub fn arb_action_script(player_n: u32, ticks: usize) -> impl Strategy<Value = Vec<BTreeMap<EntityId, Action>>> {
    vec(arb_actions(player_n), ticks)
}

/// A small valid configuration with some systems toggled. Map centers
/// vary, so most of them do not divide danger exactly.
pub fn arb_config() -> impl Strategy<Value = Config> {
    (
        (20i32..48, 8i32..13),
        2u32..10,
        0u32..12,
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|((center, border), players, npcs, resources, items, npc_fights)| {
            let mut config = Config::small()
                .with_map(center, border)
                .with_players(players)
                .with_npcs(npcs);
            config.resource_system_enabled = resources;
            config.item_system_enabled = items;
            config.equipment_system_enabled = items;
            config.npc_allow_attack_other_npcs = npc_fights;
            config
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_interior_positions_are_playable(pos in arb_interior_position(&Config::small())) {
            let (low, high) = Config::small().playable_range();
            prop_assert!(pos.row >= low && pos.row < high);
            prop_assert!(pos.col >= low && pos.col < high);
        }

        #[test]
        fn prop_actions_address_players(actions in arb_actions(4)) {
            for (id, action) in &actions {
                prop_assert!((1..=4).contains(id));
                if let Some(attack) = action.attack {
                    prop_assert!((1..=4).contains(&attack.target));
                }
            }
        }

        #[test]
        fn prop_configs_validate(config in arb_config()) {
            prop_assert!(config.validate().is_ok());
        }
    }
}
