//! Scenario files and built-in terrain layouts.
//!
//! Terrain generation lives outside the engine, so the runner ships two
//! deterministic layouts that need no RNG.

use std::path::Path;

use realm_core::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{HeadlessError, Result};

/// Built-in terrain layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum TerrainLayout {
    /// Grass everywhere.
    #[default]
    Grass,
    /// Grass islands in a lake grid, with forage, trees and ore.
    Islands,
}

impl TerrainLayout {
    /// Build the terrain for `config`.
    #[must_use]
    pub fn build(self, config: &Config) -> Terrain {
        let size = config.map_size.max(0) as usize;
        match self {
            Self::Grass => Terrain::filled(size, Material::Grass),
            Self::Islands => Terrain::from_fn(size, island_tile),
        }
    }
}

/// 12x12 cells: a two-tile water channel on two sides, a grass island with
/// a forage patch, a tree and an ore vein.
fn island_tile(row: i32, col: i32) -> Material {
    let (r, c) = (row.rem_euclid(12), col.rem_euclid(12));
    match (r, c) {
        (0 | 1, _) | (_, 0 | 1) => Material::Water,
        (5 | 6, 5 | 6) => Material::Foliage,
        (3, 9) => Material::Tree,
        (9, 3) => Material::Ore,
        (9, 9) => Material::Stone,
        _ => Material::Grass,
    }
}

/// A realm configuration plus the terrain to run it on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Display name.
    pub name: String,
    /// Terrain layout.
    pub layout: TerrainLayout,
    /// Engine configuration.
    pub config: Config,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "small".to_string(),
            layout: TerrainLayout::Islands,
            config: Config::small(),
        }
    }
}

impl Scenario {
    /// Scenario from a config preset name (`small`, `medium`, `large`).
    #[must_use]
    pub fn preset(name: &str) -> Option<Self> {
        let config = match name {
            "small" => Config::small(),
            "medium" => Config::medium(),
            "large" => Config::large(),
            _ => return None,
        };
        Some(Self {
            name: name.to_string(),
            config,
            ..Self::default()
        })
    }

    /// Load and validate a RON scenario file.
    ///
    /// # Errors
    /// IO, RON or configuration errors.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| HeadlessError::io(path, e))?;
        let scenario: Self = ron::from_str(&text).map_err(|source| HeadlessError::Ron {
            path: path.to_path_buf(),
            source,
        })?;
        scenario.config.validate()?;
        Ok(scenario)
    }

    /// Write as pretty RON.
    ///
    /// # Errors
    /// IO errors, or a RON encoding failure reported as a configuration
    /// error.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| RealmError::Serialization(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| HeadlessError::io(path, e))
    }

    /// Terrain for this scenario.
    #[must_use]
    pub fn terrain(&self) -> Terrain {
        self.layout.build(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_match_map_size() {
        let config = Config::small();
        for layout in [TerrainLayout::Grass, TerrainLayout::Islands] {
            let terrain = layout.build(&config);
            assert_eq!(terrain.height(), config.map_size as usize);
            assert!(terrain.rows().iter().all(|row| row.len() == config.map_size as usize));
        }
    }

    #[test]
    fn test_islands_are_mostly_land() {
        let terrain = TerrainLayout::Islands.build(&Config::small());
        let land = terrain
            .rows()
            .iter()
            .flatten()
            .filter(|m| m.habitable())
            .count();
        let total = terrain.height() * terrain.height();
        assert!(land * 2 > total);
    }

    #[test]
    fn test_presets() {
        assert_eq!(Scenario::preset("large").unwrap().config.map_size, 160);
        assert!(Scenario::preset("huge").is_none());
    }

    #[test]
    fn test_partial_ron() {
        let scenario: Scenario = ron::from_str("(name: \"tiny\", layout: Grass, config: (player_n: 2))").unwrap();
        assert_eq!(scenario.name, "tiny");
        assert_eq!(scenario.config.player_n, 2);
        assert_eq!(scenario.config.map_size, Config::default().map_size);
    }
}
