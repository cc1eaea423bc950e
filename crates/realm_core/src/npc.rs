//! NPC spawning rules and behavior.
//!
//! Danger grows toward the center of the playable area. Where an NPC
//! spawns decides how dangerous it is: its disposition, level, gold and
//! equipment all derive from the danger of its spawn tile.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::action::{Action, Attack, Direction, Style};
use crate::config::Config;
use crate::datastore::{Datastore, EntityAttr, Schema};
use crate::entity::{Entity, EntityId};
use crate::item::{Item, ItemKind};
use crate::map::Map;
use crate::math::{percent, Fixed, Position};

/// NPC behavior policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Disposition {
    /// Wanders, never attacks.
    Passive,
    /// Wanders, fights back when attacked.
    Neutral,
    /// Hunts the closest visible player.
    Hostile,
}

impl Disposition {
    /// Value written to the Entity table's NPC type column.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Passive => 1,
            Self::Neutral => 2,
            Self::Hostile => 3,
        }
    }

    /// Disposition for a spawn danger, or `None` below the passive threshold.
    #[must_use]
    pub fn for_danger(danger: Fixed, config: &Config) -> Option<Self> {
        if danger >= percent(config.npc_spawn_aggressive_pct) {
            Some(Self::Hostile)
        } else if danger >= percent(config.npc_spawn_neutral_pct) {
            Some(Self::Neutral)
        } else if danger >= percent(config.npc_spawn_passive_pct) {
            Some(Self::Passive)
        } else {
            None
        }
    }
}

/// Tiles between a position and the nearest edge of the playable area.
/// Negative outside it.
#[must_use]
pub fn edge_distance(config: &Config, pos: Position) -> i32 {
    let border = config.map_border;
    let center = config.map_center;
    let row_dist = (pos.row - border).min(center + border - pos.row - 1);
    let col_dist = (pos.col - border).min(center + border - pos.col - 1);
    row_dist.min(col_dist)
}

/// Danger of a position: 0 on the playable edge, approaching 1 at the
/// center. Negative outside the playable area.
#[must_use]
pub fn danger(config: &Config, pos: Position) -> Fixed {
    Fixed::from_num(2 * edge_distance(config, pos)) / Fixed::from_num(config.map_center)
}

/// Edge distance of the ring whose danger is `danger`.
///
/// `danger` truncates `2 * dist / center`, so the product is rounded back
/// to the nearest ring rather than truncated.
#[must_use]
pub fn distance_for_danger(config: &Config, danger: Fixed) -> i32 {
    (danger * Fixed::from_num(config.map_center) / Fixed::from_num(2))
        .round()
        .to_num()
}

/// A position whose danger equals `danger`, on a random side of the ring
/// at that distance from the edge.
pub fn spawn_position<R: Rng + ?Sized>(config: &Config, danger: Fixed, rng: &mut R) -> Position {
    let border = config.map_border;
    let center = config.map_center;
    let mid = center / 2;

    let dist = distance_for_danger(config, danger);
    let max_offset = (mid - dist).max(0);
    let jitter = if max_offset > 0 {
        rng.gen_range(-max_offset..max_offset)
    } else {
        0
    };
    let offset = mid + border + jitter;

    match rng.gen_range(0..4) {
        0 => Position::new(border + dist, offset),
        1 => Position::new(border + center - dist - 1, offset),
        2 => Position::new(offset, border + dist),
        _ => Position::new(offset, border + center - dist - 1),
    }
}

/// NPC level at `dist` tiles from the playable edge:
/// `floor(danger * (max - min) + min)`, computed on integers.
#[must_use]
pub fn level_for_distance(dist: i32, config: &Config) -> u32 {
    let min = i64::from(config.npc_level_min);
    let max = i64::from(config.npc_level_max);
    let center = i64::from(config.map_center.max(1));
    let level = 2 * i64::from(dist.max(0)) * (max - min) / center + min;
    level.clamp(0, max) as u32
}

/// Vision radius of an NPC. Hostile NPCs see one tile further per ten
/// combat levels, never less than a player.
#[must_use]
pub fn vision_radius(npc: &Entity, config: &Config) -> i32 {
    let base = config.player_vision_radius;
    match npc.disposition() {
        Some(Disposition::Hostile) => base.max(1 + npc.combat_level() as i32 / 10),
        _ => base,
    }
}

/// Build an NPC for `pos`, or `None` if the tile is uninhabitable or below
/// the passive danger threshold.
///
/// Items are created in the datastore and equipped.
pub fn build_npc<R: Rng + ?Sized>(
    id: EntityId,
    pos: Position,
    map: &Map,
    ds: &mut Datastore,
    config: &Config,
    rng: &mut R,
) -> Option<Entity> {
    if !map.habitable(pos.row, pos.col) {
        return None;
    }
    let danger = danger(config, pos);
    let disposition = Disposition::for_danger(danger, config)?;
    let style = *Style::ALL.choose(rng)?;

    let mut npc = Entity::npc(id, pos, config, disposition, style, danger);
    let level = if config.progression_system_enabled {
        level_for_distance(edge_distance(config, pos), config)
    } else {
        0
    };
    if level > 0 {
        npc.skills.set_level(style, level, config);
    }
    if config.exchange_system_enabled {
        npc.inventory.gold = level as i32;
    }

    if config.equipment_system_enabled {
        let kinds = [
            ItemKind::Hat,
            ItemKind::Top,
            ItemKind::Bottom,
            ItemKind::weapon_for(style),
        ];
        let upgrade = *kinds.choose(rng)?;
        for kind in kinds {
            let item_level = if kind == upgrade {
                level
            } else if level <= 1 {
                continue;
            } else {
                level - 1
            };
            let item = Item::create(ds, config, kind, item_level, 1, id);
            npc.inventory.equipment.equip(item, ds);
        }
        if style != Style::Melee && config.npc_ammunition_quantity > 0 {
            let ammunition = Item::create(
                ds,
                config,
                ItemKind::ammunition_for(style),
                level,
                config.npc_ammunition_quantity,
                id,
            );
            npc.inventory.equipment.equip(ammunition, ds);
        }
    }
    Some(npc)
}

fn target_allowed(target: EntityId, config: &Config) -> bool {
    target > 0 || config.npc_allow_attack_other_npcs
}

/// Pick a step for `npc` toward a habitable neighbor, starting from a
/// random direction. North when boxed in.
fn meander<R: Rng + ?Sized>(npc: &Entity, map: &Map, rng: &mut R) -> Action {
    let start = rng.gen_range(0..Direction::ALL.len());
    let direction = (0..Direction::ALL.len())
        .map(|i| Direction::ALL[(start + i) % Direction::ALL.len()])
        .find(|d| {
            let next = npc.pos().offset(d.delta());
            map.habitable(next.row, next.col)
        })
        .unwrap_or(Direction::North);
    Action::step(direction)
}

/// Move toward a target and attack it once in reach.
fn charge(npc: &Entity, target: EntityId, target_pos: Position, map: &mut Map, config: &Config) -> Action {
    let mut action = Action::idle();
    if npc.pos() != target_pos {
        action.movement = map.next_step(npc.pos(), target_pos, config.pathfinding_budget);
    }
    let style = npc.npc_style().unwrap_or(Style::Melee);
    if target_allowed(target, config) && npc.pos().linf(target_pos) <= style.reach(config) {
        action.attack = Some(Attack { style, target });
    }
    action
}

/// Live entity row position, if the target still exists and is alive.
fn locate(ds: &Datastore, target: EntityId) -> Option<Position> {
    let frame = ds.entity_by_id(target);
    let row = frame.row(0)?;
    (row[EntityAttr::Health.index()] > 0).then(|| {
        Position::new(row[EntityAttr::Row.index()], row[EntityAttr::Col.index()])
    })
}

/// Closest allowed target within the NPC's vision, excluding `npc` itself.
/// Ties go to the earliest row.
fn closest_target(npc: &Entity, ds: &Datastore, config: &Config) -> Option<(EntityId, Position)> {
    let pos = npc.pos();
    let visible = ds.window(pos.row, pos.col, vision_radius(npc, config));
    let mut best: Option<(i32, EntityId, Position)> = None;
    for row in visible.iter_rows() {
        let id = row[EntityAttr::Id.index()];
        if id == npc.id() || !target_allowed(id, config) || row[EntityAttr::Health.index()] <= 0 {
            continue;
        }
        let target_pos = Position::new(row[EntityAttr::Row.index()], row[EntityAttr::Col.index()]);
        let dist = pos.linf(target_pos);
        if best.map_or(true, |(d, _, _)| dist < d) {
            best = Some((dist, id, target_pos));
        }
    }
    best.map(|(_, id, target_pos)| (id, target_pos))
}

/// Decide one NPC's action for this tick.
pub fn decide<R: Rng + ?Sized>(npc: &Entity, map: &mut Map, ds: &Datastore, config: &Config, rng: &mut R) -> Action {
    match npc.disposition() {
        Some(Disposition::Hostile) => match closest_target(npc, ds, config) {
            Some((target, target_pos)) => charge(npc, target, target_pos, map, config),
            None => meander(npc, map, rng),
        },
        Some(Disposition::Neutral) => {
            let retaliate = npc.history.attacker.and_then(|attacker| {
                let target_pos = locate(ds, attacker)?;
                (npc.pos().linf(target_pos) <= config.player_vision_radius).then_some((attacker, target_pos))
            });
            match retaliate {
                Some((target, target_pos)) => charge(npc, target, target_pos, map, config),
                None => meander(npc, map, rng),
            }
        }
        Some(Disposition::Passive) | None => meander(npc, map, rng),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::ItemAttr;
    use crate::material::{Material, Terrain};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(config: &Config) -> (Map, Datastore) {
        let mut ds = Datastore::new();
        let mut map = Map::new(config);
        let size = config.map_size as usize;
        map.reset(&Terrain::filled(size, Material::Grass), config, &mut ds.tiles)
            .unwrap();
        (map, ds)
    }

    #[test]
    fn test_danger_profile() {
        let config = Config::default();
        // Playable edge.
        assert_eq!(danger(&config, Position::new(16, 40)), Fixed::ZERO);
        // Center of a 64-wide area: dist 31.
        assert_eq!(
            danger(&config, Position::new(47, 47)),
            Fixed::from_num(62) / Fixed::from_num(64)
        );
        assert!(danger(&config, Position::new(5, 40)) < Fixed::ZERO);
        // Same input, same output.
        assert_eq!(danger(&config, Position::new(30, 20)), danger(&config, Position::new(30, 20)));
    }

    #[test]
    fn test_spawn_position_matches_danger() {
        let config = Config::default();
        let mut rng = StdRng::seed_from_u64(7);
        for dist in 0..32 {
            let target = Fixed::from_num(2 * dist) / Fixed::from_num(config.map_center);
            for _ in 0..8 {
                let pos = spawn_position(&config, target, &mut rng);
                assert_eq!(danger(&config, pos), target, "dist {dist} at {pos}");
            }
        }
    }

    #[test]
    fn test_spawn_position_inexact_center() {
        // 2 * dist / 36 has no exact binary form for most distances.
        let config = Config::default().with_map(36, 10);
        let mut rng = StdRng::seed_from_u64(7);
        for dist in 0..18 {
            let pos = Position::new(10 + dist, 28);
            let queued = danger(&config, pos);
            assert_eq!(distance_for_danger(&config, queued), dist);
            for _ in 0..8 {
                let spawned = spawn_position(&config, queued, &mut rng);
                assert_eq!(edge_distance(&config, spawned), dist, "dist {dist} at {spawned}");
                assert_eq!(danger(&config, spawned), queued);
            }
        }
    }

    #[test]
    fn test_disposition_thresholds() {
        let config = Config::default();
        assert_eq!(Disposition::for_danger(percent(90), &config), Some(Disposition::Hostile));
        assert_eq!(Disposition::for_danger(percent(80), &config), Some(Disposition::Hostile));
        assert_eq!(Disposition::for_danger(percent(60), &config), Some(Disposition::Neutral));
        assert_eq!(Disposition::for_danger(Fixed::ZERO, &config), Some(Disposition::Passive));
        assert_eq!(Disposition::for_danger(Fixed::from_num(-0.1), &config), None);
    }

    #[test]
    fn test_level_for_distance() {
        let config = Config::default();
        assert_eq!(level_for_distance(0, &config), 1);
        // 2 * 16 / 64 = 0.5
        assert_eq!(level_for_distance(16, &config), 5);
        assert_eq!(level_for_distance(31, &config), 9);
        assert_eq!(level_for_distance(-3, &config), 1);

        // 12 / 36 * 9 + 1 = 4 exactly
        let config = Config::default().with_map(36, 10);
        assert_eq!(level_for_distance(6, &config), 4);
        assert_eq!(level_for_distance(17, &config), 9);
    }

    #[test]
    fn test_build_npc_equipment() {
        let config = Config::default();
        let (map, mut ds) = setup(&config);
        let mut rng = StdRng::seed_from_u64(1);
        let pos = Position::new(40, 40);
        let npc = build_npc(-1, pos, &map, &mut ds, &config, &mut rng).expect("habitable interior");

        let level = level_for_distance(edge_distance(&config, pos), &config);
        assert!(level > 1);
        assert_eq!(npc.inventory.gold, level as i32);
        let style = npc.npc_style().unwrap();
        assert_eq!(npc.skills.level(style), level);

        let items = ds.items_owned_by(-1);
        let levels = items.column(ItemAttr::Level);
        let expected_items = if style == Style::Melee { 4 } else { 5 };
        assert_eq!(items.len(), expected_items);
        assert!(levels.contains(&(level as i32)));
        assert!(levels[..4].iter().all(|l| *l == level as i32 || *l == level as i32 - 1));
    }

    #[test]
    fn test_build_npc_rejects_uninhabitable() {
        let config = Config::default();
        let (map, mut ds) = setup(&config);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(build_npc(-1, Position::new(0, 0), &map, &mut ds, &config, &mut rng).is_none());
        assert!(ds.items.is_empty());
    }

    #[test]
    fn test_hostile_charges_visible_player() {
        let config = Config::default();
        let (mut map, mut ds) = setup(&config);
        let mut rng = StdRng::seed_from_u64(3);

        let mut player = Entity::player(1, Position::new(40, 44), &config);
        player.insert_row(&mut ds.entities);
        let mut npc = Entity::npc(
            -1,
            Position::new(40, 40),
            &config,
            Disposition::Hostile,
            Style::Range,
            percent(90),
        );
        npc.insert_row(&mut ds.entities);

        let action = decide(&npc, &mut map, &ds, &config, &mut rng);
        assert_eq!(action.movement, Some(Direction::East));
        assert!(action.attack.is_none());

        npc.move_to(Position::new(40, 41), &mut ds.entities);
        let action = decide(&npc, &mut map, &ds, &config, &mut rng);
        assert_eq!(action.attack.map(|a| a.target), Some(1));
    }

    #[test]
    fn test_hostile_vision_grows_with_level() {
        let config = Config::default();
        let mut npc = Entity::npc(-1, Position::new(40, 40), &config, Disposition::Hostile, Style::Mage, percent(90));
        assert_eq!(vision_radius(&npc, &config), config.player_vision_radius);

        let config = Config {
            player_vision_radius: 1,
            progression_level_max: 40,
            ..Config::default()
        };
        npc.skills.set_level(Style::Mage, 25, &config);
        assert_eq!(vision_radius(&npc, &config), 3);

        let neutral = Entity::npc(-2, Position::new(40, 40), &config, Disposition::Neutral, Style::Mage, percent(60));
        assert_eq!(vision_radius(&neutral, &config), 1);
    }

    #[test]
    fn test_hostile_ignores_other_npcs() {
        let config = Config::default();
        let (mut map, mut ds) = setup(&config);
        let mut rng = StdRng::seed_from_u64(3);
        let mut other = Entity::npc(-2, Position::new(40, 41), &config, Disposition::Passive, Style::Melee, Fixed::ZERO);
        other.insert_row(&mut ds.entities);
        let mut npc = Entity::npc(-1, Position::new(40, 40), &config, Disposition::Hostile, Style::Melee, Fixed::ZERO);
        npc.insert_row(&mut ds.entities);

        let action = decide(&npc, &mut map, &ds, &config, &mut rng);
        assert!(action.attack.is_none());
    }

    #[test]
    fn test_neutral_retaliates() {
        let config = Config::default();
        let (mut map, mut ds) = setup(&config);
        let mut rng = StdRng::seed_from_u64(3);
        let mut player = Entity::player(2, Position::new(30, 31), &config);
        player.insert_row(&mut ds.entities);
        let mut npc = Entity::npc(-1, Position::new(30, 30), &config, Disposition::Neutral, Style::Melee, Fixed::ZERO);
        npc.insert_row(&mut ds.entities);

        let action = decide(&npc, &mut map, &ds, &config, &mut rng);
        assert!(action.attack.is_none());

        npc.receive_damage(2, 5, 1, &config, &mut ds.entities);
        let action = decide(&npc, &mut map, &ds, &config, &mut rng);
        assert_eq!(action.attack.map(|a| a.target), Some(2));
    }

    #[test]
    fn test_meander_stays_habitable() {
        let config = Config::default();
        let (mut map, ds) = setup(&config);
        let mut rng = StdRng::seed_from_u64(11);
        // Corner of the grass ring: two of four neighbors are void.
        let npc = Entity::npc(-1, Position::new(16, 16), &config, Disposition::Passive, Style::Mage, Fixed::ZERO);
        for _ in 0..20 {
            let action = decide(&npc, &mut map, &ds, &config, &mut rng);
            let next = npc.pos().offset(action.movement.unwrap().delta());
            assert!(map.habitable(next.row, next.col));
        }
    }
}
