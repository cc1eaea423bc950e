//! End-to-end realm tests.
//!
//! These drive whole episodes through [`Realm::step`] and check the
//! world-level guarantees: reproducibility, tile/entity bookkeeping,
//! cull semantics and event history.

use std::collections::BTreeMap;

use realm_core::prelude::*;
use realm_test_utils::determinism::{find_first_divergence, run_parallel_realms, verify_realm_determinism};
use realm_test_utils::fixtures::{grass_terrain, realm_with_players, seeded_rng, test_config, Episode};

// =============================================================================
// Helpers
// =============================================================================

fn assert_tiles_consistent(realm: &Realm) {
    let alive = realm.alive_ids();
    for &id in &alive {
        let entity = realm.entity(id).expect("live id resolves");
        let pos = entity.pos();
        let tile = realm.map().tile(pos.row, pos.col).expect("entity on map");
        assert!(
            tile.occupants().contains(&id),
            "tick {}: entity {id} missing from tile {pos}",
            realm.tick()
        );
    }
    for tile in realm.map().tiles() {
        for &id in tile.occupants() {
            let entity = realm.entity(id);
            assert!(entity.is_some(), "tick {}: tile {} lists dead id {id}", realm.tick(), tile.pos());
            assert_eq!(entity.map(Entity::pos), Some(tile.pos()));
        }
    }
}

fn fixed_players(positions: Vec<(i32, i32)>) -> Config {
    Config {
        player_n: positions.len() as u32,
        player_spawn: PlayerSpawn::Fixed(positions),
        ..Config::small().with_npcs(0)
    }
}

fn reset(config: Config, terrain: &Terrain, seed: u64) -> (Realm, rand::rngs::StdRng) {
    let mut rng = seeded_rng(seed);
    let mut realm = Realm::new(config).unwrap();
    realm.reset(terrain, &mut rng).unwrap();
    (realm, rng)
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_same_seed_same_history() {
    assert!(verify_realm_determinism(|| Episode::standard(42), 80));
    assert_eq!(find_first_divergence(|| Episode::standard(42), 80), None);
}

#[test]
fn test_event_logs_match_every_tick() {
    let mut a = Episode::standard(7);
    let mut b = Episode::standard(7);
    for _ in 0..60 {
        a.step();
        b.step();
        assert_eq!(a.realm.event_log(), b.realm.event_log());
        assert_eq!(a.realm.snapshot(), b.realm.snapshot());
    }
}

#[test]
fn test_parallel_realms_agree() {
    run_parallel_realms(|| Episode::standard(99), 4, 40).assert_deterministic();
}

#[test]
fn test_different_seeds_diverge() {
    let mut a = Episode::standard(1);
    let mut b = Episode::standard(2);
    for _ in 0..10 {
        a.step();
        b.step();
    }
    assert_ne!(a.realm.state_hash(), b.realm.state_hash());
}

// =============================================================================
// World bookkeeping
// =============================================================================

#[test]
fn test_tiles_match_entities_after_every_cull() {
    let mut episode = Episode::standard(21);
    assert_tiles_consistent(&episode.realm);
    for _ in 0..120 {
        let culled = episode.step();
        for id in culled.ids() {
            assert!(episode.realm.entity(id).is_none());
        }
        assert_tiles_consistent(&episode.realm);
        assert_eq!(episode.realm.datastore().entities.len(), episode.realm.alive_ids().len());
    }
}

#[test]
fn test_habitability_fixed_during_episode() {
    let mut episode = Episode::standard(5);
    let flags = |realm: &Realm| -> Vec<(bool, bool)> {
        realm
            .map()
            .tiles()
            .iter()
            .map(|tile| (tile.habitable(), tile.impassable()))
            .collect()
    };
    let initial = flags(&episode.realm);
    for tick in 0..100 {
        // Idle ticks leave players standing on resources.
        if tick % 2 == 0 {
            episode.step();
        } else {
            episode.idle_step();
        }
    }
    assert_eq!(flags(&episode.realm), initial);
}

#[test]
fn test_ids_never_reused() {
    let mut episode = Episode::new(
        Config {
            npc_allow_attack_other_npcs: true,
            ..test_config().with_npcs(12)
        },
        &grass_terrain(&test_config()),
        17,
    );
    let mut seen: Vec<EntityId> = episode.realm.npcs().ids();
    for _ in 0..150 {
        episode.step();
        for id in episode.realm.npcs().ids() {
            if !seen.contains(&id) {
                assert!(id < *seen.iter().min().unwrap_or(&0));
                seen.push(id);
            }
        }
    }
}

#[test]
fn test_foliage_regrows() {
    let config = Config {
        resource_depletion_rate: 1,
        ..fixed_players(vec![(20, 20)])
    };
    let mut terrain = grass_terrain(&config);
    terrain.set(20, 20, Material::Foliage);
    terrain.set(20, 21, Material::Water);
    let (mut realm, mut rng) = reset(config, &terrain, 3);

    realm.step(&BTreeMap::new(), &mut rng).unwrap();
    assert!(realm.map().tile(20, 20).unwrap().depleted());
    assert!(realm.map().active_tiles().contains(&Position::new(20, 20)));
    assert_eq!(realm.map().tile(20, 20).unwrap().visible_material(), Material::Scrub);

    for _ in 1..40 {
        realm.step(&BTreeMap::new(), &mut rng).unwrap();
    }
    let eaten = realm.event_log().get_data(Some(EventCode::EatFood), Some(&[1]));
    assert_eq!(eaten.len(), 2);
    let drunk = realm.event_log().get_data(Some(EventCode::DrinkWater), Some(&[1]));
    assert_eq!(drunk.len(), 40);
    assert_eq!(realm.map().tile(20, 21).unwrap().material(), Material::Water);
}

// =============================================================================
// Cull semantics
// =============================================================================

#[test]
fn test_killed_entity_culled_once() {
    let (mut realm, mut rng) = reset(
        fixed_players(vec![(20, 20), (20, 21)]),
        &grass_terrain(&Config::small()),
        8,
    );
    realm.entity_mut(2).unwrap().resources.health = 10;
    assert_eq!(realm.datastore().window(20, 20, 1).len(), 2);

    let actions = BTreeMap::from([(1, Action::attack(2, Style::Melee))]);
    let culled = realm.step(&actions, &mut rng).unwrap();
    realm.check_culled(&culled).unwrap();
    assert_eq!(culled.ids().collect::<Vec<_>>(), vec![2]);
    let last = culled.get(2).unwrap();
    assert!(!last.alive());
    assert_eq!(last.history.killed_by, Some(1));

    assert!(realm.entity(2).is_none());
    assert!(!realm.map().tile(20, 21).unwrap().occupants().contains(&2));
    assert!(realm.datastore().entity_by_id(2).is_empty());
    assert_eq!(realm.datastore().window(20, 20, 1).len(), 1);

    let next = realm.step(&actions, &mut rng).unwrap();
    assert!(!next.contains(2));
    assert!(realm.check_culled(&culled).is_err());

    let kills = realm.event_log().get_data(Some(EventCode::PlayerKill), Some(&[1]));
    assert_eq!(kills.len(), 1);
    assert_eq!(kills.get(0, EventAttr::TargetEnt), 2);
}

#[test]
fn test_dead_target_not_hit_twice() {
    let (mut realm, mut rng) = reset(
        fixed_players(vec![(20, 20), (20, 22), (20, 21)]),
        &grass_terrain(&Config::small()),
        9,
    );
    realm.entity_mut(3).unwrap().resources.health = 10;
    let actions = BTreeMap::from([
        (1, Action::attack(3, Style::Melee)),
        (2, Action::attack(3, Style::Melee)),
    ]);
    realm.step(&actions, &mut rng).unwrap();
    let hits = realm.event_log().get_data(Some(EventCode::ScoreHit), None);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits.get(0, EventAttr::EntId), 1);
}

#[test]
fn test_npcs_respawn_after_cull() {
    let config = Config {
        npc_allow_attack_other_npcs: true,
        ..test_config().with_npcs(4)
    };
    let (mut realm, mut rng) = reset(config.clone(), &grass_terrain(&config), 10);
    assert_eq!(realm.npcs().len(), 4);
    let victim = realm.npcs().ids()[0];
    realm.entity_mut(victim).unwrap().resources.health = 0;

    let culled = realm.step(&BTreeMap::new(), &mut rng).unwrap();
    assert!(culled.contains(victim));
    assert_eq!(realm.npcs().len(), 4);
    assert!(!realm.npcs().contains(victim));
}

#[test]
fn test_respawn_keeps_danger_on_uneven_map() {
    // 2 * dist / 36 is inexact for most rings.
    let config = test_config().with_map(36, 10).with_npcs(4);
    let (mut realm, mut rng) = reset(config.clone(), &grass_terrain(&config), 12);
    for victim in realm.npcs().ids() {
        let before = realm.entity(victim).unwrap();
        let danger = before.spawn_danger();
        let dist = realm_core::npc::distance_for_danger(&config, danger);
        let replacement = realm.npcs().next_id();
        realm.entity_mut(victim).unwrap().resources.health = 0;

        let culled = realm.step(&BTreeMap::new(), &mut rng).unwrap();
        assert!(culled.contains(victim));
        let after = realm.entity(replacement).expect("respawned from queued danger");
        assert_eq!(after.spawn_danger(), danger);
        assert_eq!(realm_core::npc::danger(&config, after.pos()), danger);
        assert_eq!(realm_core::npc::edge_distance(&config, after.pos()), dist);
    }
}

// =============================================================================
// Event log
// =============================================================================

#[test]
fn test_earn_gold_filtered_by_agent() {
    let (mut realm, _) = realm_with_players(6, 1);
    assert_eq!(realm.players().len(), 6);

    realm
        .record_event(EventCode::EarnGold, 1, EventFields::new().with_amount(5))
        .unwrap();
    realm
        .record_event(EventCode::EarnGold, 1, EventFields::new().with_amount(3))
        .unwrap();
    realm
        .record_event(EventCode::EarnGold, 2, EventFields::new().with_amount(4))
        .unwrap();

    let rows = realm.event_log().get_data(Some(EventCode::EarnGold), Some(&[1]));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.column(EventAttr::Gold).iter().sum::<i32>(), 8);
}

#[test]
fn test_malformed_hit_rejected() {
    let (mut realm, _) = realm_with_players(2, 2);
    let bad = realm.record_event(
        EventCode::ScoreHit,
        1,
        EventFields::new().with_combat_style(Style::Melee).with_damage(-1),
    );
    assert!(matches!(bad, Err(RealmError::MalformedEvent { .. })));
    assert!(realm.event_log().is_empty());

    realm
        .record_event(
            EventCode::ScoreHit,
            1,
            EventFields::new().with_combat_style(Style::Melee).with_damage(5),
        )
        .unwrap();
    let hits = realm.event_log().get_data(Some(EventCode::ScoreHit), None);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits.get(0, EventAttr::Number), 5);
    assert_eq!(hits.get(0, EventAttr::Id), 1);
}

#[test]
fn test_reset_clears_history() {
    let mut episode = Episode::standard(30);
    for _ in 0..30 {
        episode.step();
    }
    assert!(!episode.realm.event_log().is_empty());

    let terrain = grass_terrain(episode.realm.config());
    episode.realm.reset(&terrain, &mut episode.rng).unwrap();
    assert_eq!(episode.realm.tick(), 0);
    assert!(episode.realm.event_log().is_empty());
    assert_eq!(episode.realm.datastore().entities.len(), episode.realm.alive_ids().len());
    assert!(episode.realm.npcs().ids().iter().all(|&id| id >= -(test_config().npc_n as i32)));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_terrain_shape_mismatch() {
    let config = Config::small();
    let mut realm = Realm::new(config).unwrap();
    let mut rng = seeded_rng(0);
    let err = realm
        .reset(&Terrain::filled(10, Material::Grass), &mut rng)
        .unwrap_err();
    assert!(matches!(err, RealmError::TerrainShape { expected: 52, rows: 10, .. }));
}

#[test]
fn test_inconsistent_config_rejected() {
    let config = Config {
        map_size: 60,
        ..Config::small()
    };
    assert!(matches!(Realm::new(config), Err(RealmError::InvalidConfig(_))));
}
