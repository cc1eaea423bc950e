//! Test fixtures and helpers.
//!
//! Pre-built terrains, configurations and episodes for consistent testing.
//! Every random choice is drawn from an explicitly seeded RNG.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realm_core::prelude::*;

/// Seeded episode RNG.
#[must_use]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Small map, few NPCs, every system enabled.
#[must_use]
pub fn test_config() -> Config {
    Config::small().with_npcs(8)
}

/// All-grass terrain sized for `config`.
#[must_use]
pub fn grass_terrain(config: &Config) -> Terrain {
    Terrain::filled(config.map_size as usize, Material::Grass)
}

/// Grass with a checkerboard of water, forest and ore patches, so players
/// can drink and tiles deplete.
#[must_use]
pub fn resource_terrain(config: &Config) -> Terrain {
    Terrain::from_fn(config.map_size as usize, |row, col| match (row % 8, col % 8) {
        (0, 0) => Material::Water,
        (4, 4) => Material::Tree,
        (0, 4) => Material::Ore,
        (4, 0) => Material::Stone,
        (2 | 6, _) => Material::Foliage,
        _ => Material::Grass,
    })
}

/// A reset realm on grass with `player_n` players and no NPCs.
///
/// # Panics
///
/// Panics if the configuration is rejected.
#[must_use]
pub fn realm_with_players(player_n: u32, seed: u64) -> (Realm, StdRng) {
    let config = Config::small().with_players(player_n).with_npcs(0);
    let mut rng = seeded_rng(seed);
    let mut realm = Realm::new(config).expect("valid config");
    let terrain = grass_terrain(realm.config());
    realm.reset(&terrain, &mut rng).expect("reset succeeds");
    (realm, rng)
}

/// A realm plus the RNGs that drive it: one for the engine, one for the
/// scripted players.
#[derive(Debug, Clone)]
pub struct Episode {
    /// The realm under test.
    pub realm: Realm,
    /// Engine RNG, passed to reset and step.
    pub rng: StdRng,
    policy: StdRng,
}

impl Episode {
    /// Reset a realm on `terrain` with `seed`.
    ///
    /// # Panics
    ///
    /// Panics if the configuration or terrain is rejected.
    #[must_use]
    pub fn new(config: Config, terrain: &Terrain, seed: u64) -> Self {
        let mut rng = seeded_rng(seed);
        let mut realm = Realm::new(config).expect("valid config");
        realm.reset(terrain, &mut rng).expect("reset succeeds");
        Self {
            realm,
            rng,
            policy: seeded_rng(seed ^ 0x5eed),
        }
    }

    /// [`test_config`] on [`resource_terrain`].
    #[must_use]
    pub fn standard(seed: u64) -> Self {
        let config = test_config();
        let terrain = resource_terrain(&config);
        Self::new(config, &terrain, seed)
    }

    /// Random moves and attacks on the nearest visible entity for every
    /// live player.
    pub fn random_actions(&mut self) -> BTreeMap<EntityId, Action> {
        let radius = self.realm.config().player_vision_radius;
        let mut actions = BTreeMap::new();
        for player in self.realm.players().iter() {
            let mut action = Action::idle();
            if self.policy.gen_bool(0.7) {
                action.movement = Some(Direction::ALL[self.policy.gen_range(0..4)]);
            }
            let pos = player.pos();
            let nearest = self
                .realm
                .alive_ids()
                .into_iter()
                .filter(|&id| id != player.id())
                .filter_map(|id| self.realm.entity(id).map(|e| (pos.linf(e.pos()), id)))
                .filter(|&(distance, _)| distance <= radius)
                .min();
            if let Some((_, target)) = nearest {
                let style = Style::ALL[self.policy.gen_range(0..3)];
                action.attack = Some(Attack { style, target });
            }
            actions.insert(player.id(), action);
        }
        actions
    }

    /// Advance one tick with [`Episode::random_actions`].
    ///
    /// # Panics
    ///
    /// Panics if the step fails.
    pub fn step(&mut self) -> Culled {
        let actions = self.random_actions();
        self.realm.step(&actions, &mut self.rng).expect("step succeeds")
    }

    /// Advance one tick with no player actions.
    ///
    /// # Panics
    ///
    /// Panics if the step fails.
    pub fn idle_step(&mut self) -> Culled {
        self.realm
            .step(&BTreeMap::new(), &mut self.rng)
            .expect("step succeeds")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terrain_sizes() {
        let config = test_config();
        assert_eq!(grass_terrain(&config).height(), config.map_size as usize);
        assert_eq!(resource_terrain(&config).height(), config.map_size as usize);
    }

    #[test]
    fn test_realm_with_players() {
        let (realm, _) = realm_with_players(6, 1);
        assert_eq!(realm.players().len(), 6);
        assert!(realm.npcs().is_empty());
    }

    #[test]
    fn test_episode_actions_cover_players() {
        let mut episode = Episode::standard(3);
        let actions = episode.random_actions();
        assert_eq!(actions.len(), episode.realm.players().len());
        episode.step();
        assert_eq!(episode.realm.tick(), 1);
    }
}
