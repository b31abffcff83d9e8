//! Match configuration and the static data tables loaded at startup

use crate::error::ConfigError;
use crate::powerup::Rarity;
use crate::{
    BULLET_SYNC_RADIUS, LOBBY_COUNTDOWN_SECS, MAP_SIZE, MAX_BULLET_TRAVEL_DIST, NUM_PHASES,
    NUM_PLAYERS, NUM_POWERUPS, TICK_RATE,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const EMBEDDED_SHAPES: &str = include_str!("../data/shapes.json");
const EMBEDDED_POWERUPS: &str = include_str!("../data/powerups.json");

fn default_size() -> f32 {
    50.0
}

/// Base stats of one combatant archetype
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShapeInfo {
    pub hp: f32,
    pub shield: f32,
    pub speed: f32,
    pub damage: f32,
    pub firerate: f32,
    pub bullet_speed: f32,
    pub penetration: f32,
    pub shield_regen: f32,
    pub health_regen: f32,
    #[serde(default = "default_size")]
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PowerupInfo {
    #[serde(default)]
    pub blurb: String,
    #[serde(default)]
    pub description: String,
    pub effect: String,
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RarityInfo {
    pub spawn_chance: f32,
    #[serde(default)]
    pub color: String,
    pub types: BTreeMap<String, PowerupInfo>,
}

/// Archetype and powerup tables shared by every process in a match
///
/// Maps are ordered so seeded draws pick the same entries everywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct GameTables {
    pub shapes: BTreeMap<String, ShapeInfo>,
    pub powerups: BTreeMap<Rarity, RarityInfo>,
}

impl GameTables {
    /// Tables compiled into the binary
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_json(EMBEDDED_SHAPES, EMBEDDED_POWERUPS)
    }

    /// Loads tables from disk, falling back to the embedded copy per table
    pub fn load(shapes: Option<&Path>, powerups: Option<&Path>) -> Result<Self, ConfigError> {
        let shapes_json = match shapes {
            Some(path) => read_table(path)?,
            None => EMBEDDED_SHAPES.to_string(),
        };
        let powerups_json = match powerups {
            Some(path) => read_table(path)?,
            None => EMBEDDED_POWERUPS.to_string(),
        };
        Self::from_json(&shapes_json, &powerups_json)
    }

    pub fn from_json(shapes: &str, powerups: &str) -> Result<Self, ConfigError> {
        let shapes: BTreeMap<String, ShapeInfo> = serde_json::from_str(shapes)?;
        let powerups: BTreeMap<Rarity, RarityInfo> = serde_json::from_str(powerups)?;

        if shapes.is_empty() {
            return Err(ConfigError::Empty("shapes"));
        }
        if powerups.values().all(|info| info.types.is_empty()) {
            return Err(ConfigError::Empty("powerups"));
        }

        Ok(Self { shapes, powerups })
    }

    pub fn shape(&self, name: &str) -> Result<&ShapeInfo, ConfigError> {
        self.shapes
            .get(name)
            .ok_or_else(|| ConfigError::UnknownArchetype(name.to_string()))
    }

    pub fn shape_names(&self) -> Vec<&str> {
        self.shapes.keys().map(String::as_str).collect()
    }

    pub fn powerup(&self, rarity: Rarity, name: &str) -> Result<&PowerupInfo, ConfigError> {
        self.powerups
            .get(&rarity)
            .and_then(|info| info.types.get(name))
            .ok_or_else(|| ConfigError::UnknownPowerup {
                rarity: rarity.to_string(),
                name: name.to_string(),
            })
    }

    pub fn spawn_chance(&self, rarity: Rarity) -> f32 {
        self.powerups
            .get(&rarity)
            .map(|info| info.spawn_chance)
            .unwrap_or(0.0)
    }
}

fn read_table(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Tunables for one match
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    pub map_size: f32,
    pub num_phases: usize,
    pub num_players: usize,
    pub num_powerups: usize,
    pub tick_rate: u32,
    pub lobby_countdown_secs: f32,
    pub bullet_sync_radius: f32,
    pub max_bullet_travel: f32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            map_size: MAP_SIZE,
            num_phases: NUM_PHASES,
            num_players: NUM_PLAYERS,
            num_powerups: NUM_POWERUPS,
            tick_rate: TICK_RATE,
            lobby_countdown_secs: LOBBY_COUNTDOWN_SECS,
            bullet_sync_radius: BULLET_SYNC_RADIUS,
            max_bullet_travel: MAX_BULLET_TRAVEL_DIST,
        }
    }
}
