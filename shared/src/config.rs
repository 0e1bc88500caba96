//! Construction tuning loaded from `assets/construction.ron`.
//!
//! Structure and material numbers are compiled tables in `structures`; only the knobs a
//! designer is expected to tweak between runs live here.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::items::Inventory;
use crate::structures::MaterialKind;

/// Build grid spacing in meters
pub const DEFAULT_GRID_SIZE: f32 = 4.0;

/// Default path of the config file, relative to the working directory
pub const CONFIG_PATH: &str = "assets/construction.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse construction config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("grid_size must be a positive finite number, got {0}")]
    InvalidGridSize(f32),

    #[error("reach must be a positive finite number, got {0}")]
    InvalidReach(f32),
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstructionConfig {
    /// Grid spacing (meters) used for snapping and the overlap index
    pub grid_size: f32,
    /// Maximum aim distance for placing and striking (meters)
    pub reach: f32,
    /// Damage dealt by one demolition strike
    pub strike_damage: f32,
    /// Materials every player starts with
    pub starting_materials: BTreeMap<MaterialKind, u32>,
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            reach: 40.0,
            strike_damage: 50.0,
            starting_materials: BTreeMap::from([
                (MaterialKind::Wood, 500),
                (MaterialKind::Stone, 300),
                (MaterialKind::Metal, 200),
            ]),
        }
    }
}

impl ConstructionConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: ConstructionConfig = ron::from_str(text)?;
        config.validated()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    /// Load from `path`, falling back to defaults (with a warning) on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => {
                info!("Loaded construction config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Using default construction config: {}", e);
                Self::default()
            }
        }
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if !(self.grid_size > 0.0 && self.grid_size.is_finite()) {
            return Err(ConfigError::InvalidGridSize(self.grid_size));
        }
        if !(self.reach > 0.0 && self.reach.is_finite()) {
            return Err(ConfigError::InvalidReach(self.reach));
        }
        Ok(self)
    }

    /// A fresh inventory holding the starting materials
    pub fn starting_inventory(&self) -> Inventory {
        let amounts: Vec<(MaterialKind, u32)> = self.starting_materials.iter().map(|(m, q)| (*m, *q)).collect();
        Inventory::with_materials(&amounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ConstructionConfig::from_ron_str("(grid_size: 2.0)").unwrap();
        assert_eq!(config.grid_size, 2.0);
        assert_eq!(config.reach, 40.0);
        assert_eq!(config.starting_materials.get(&MaterialKind::Wood), Some(&500));
    }

    #[test]
    fn test_starting_materials_parse() {
        let config = ConstructionConfig::from_ron_str("(starting_materials: {Metal: 7})").unwrap();
        let inventory = config.starting_inventory();
        assert_eq!(inventory.count(MaterialKind::Metal), 7);
        assert_eq!(inventory.count(MaterialKind::Wood), 0);
    }

    #[test]
    fn test_rejects_bad_grid_size() {
        assert!(matches!(
            ConstructionConfig::from_ron_str("(grid_size: 0.0)"),
            Err(ConfigError::InvalidGridSize(_))
        ));
        assert!(matches!(
            ConstructionConfig::from_ron_str("(grid_size: "),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = ConstructionConfig::load_or_default("does/not/exist.ron");
        assert_eq!(config, ConstructionConfig::default());
    }
}
