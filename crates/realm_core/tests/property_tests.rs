//! Property tests over generated configurations and action scripts.

use std::collections::BTreeMap;

use proptest::prelude::*;
use rand::rngs::StdRng;
use realm_core::npc::{danger, edge_distance, level_for_distance, spawn_position};
use realm_core::prelude::*;
use realm_test_utils::fixtures::{resource_terrain, seeded_rng};
use realm_test_utils::strategies::{arb_action_script, arb_config, arb_interior_position};

fn config_and_script(ticks: usize) -> impl Strategy<Value = (Config, Vec<BTreeMap<EntityId, Action>>)> {
    arb_config().prop_flat_map(move |config| {
        let script = arb_action_script(config.player_n, ticks);
        (Just(config), script)
    })
}

fn config_and_position() -> impl Strategy<Value = (Config, Position)> {
    arb_config().prop_flat_map(|config| {
        let pos = arb_interior_position(&config);
        (Just(config), pos)
    })
}

fn reset(config: &Config, terrain: &Terrain, seed: u64) -> (Realm, StdRng) {
    let mut rng = seeded_rng(seed);
    let mut realm = Realm::new(config.clone()).unwrap();
    realm.reset(terrain, &mut rng).unwrap();
    (realm, rng)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_action_script_replays_identically(
        (config, script) in config_and_script(25),
        seed in any::<u64>(),
    ) {
        let terrain = resource_terrain(&config);
        let (mut a, mut rng_a) = reset(&config, &terrain, seed);
        let (mut b, mut rng_b) = reset(&config, &terrain, seed);
        prop_assert_eq!(a.state_hash(), b.state_hash());

        for actions in &script {
            let culled_a = a.step(actions, &mut rng_a).unwrap();
            let culled_b = b.step(actions, &mut rng_b).unwrap();
            prop_assert_eq!(culled_a, culled_b);
            prop_assert_eq!(a.state_hash(), b.state_hash(), "tick {}", a.tick());
            prop_assert_eq!(a.snapshot(), b.snapshot());
        }
    }

    #[test]
    fn prop_respawn_lands_on_queued_danger(
        (config, pos) in config_and_position(),
        seed in any::<u64>(),
    ) {
        let queued = danger(&config, pos);
        let mut rng = seeded_rng(seed);
        for _ in 0..4 {
            let spawned = spawn_position(&config, queued, &mut rng);
            prop_assert_eq!(danger(&config, spawned), queued, "{} respawned at {}", pos, spawned);
            prop_assert_eq!(edge_distance(&config, spawned), edge_distance(&config, pos));
        }
    }

    #[test]
    fn prop_level_matches_exact_danger((config, pos) in config_and_position()) {
        let dist = i64::from(edge_distance(&config, pos));
        let min = i64::from(config.npc_level_min);
        let max = i64::from(config.npc_level_max);
        let center = i64::from(config.map_center);
        // floor(2 * dist / center * (max - min) + min) with exact rationals
        let expected = (2 * dist * (max - min) + min * center) / center;
        prop_assert_eq!(i64::from(level_for_distance(edge_distance(&config, pos), &config)), expected);
    }
}
