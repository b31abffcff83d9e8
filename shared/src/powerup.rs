//! Powerups, their rarity draw, and the indexed field holding loose pickups

use crate::config::GameTables;
use crate::error::{ConfigError, EffectError};
use crate::shape::Shape;
use crate::{Bounds, POWERUP_GRID_SIZE};
use log::warn;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Spread of death loot around the position a combatant died at
pub const LOOT_SCATTER: f32 = 150.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Legendary,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Legendary => "Legendary",
        };
        f.write_str(name)
    }
}

/// Maps a uniform roll in `[0, 1]` onto a rarity using cumulative spawn chances,
/// rarest tier first
pub fn draw_rarity(roll: f32, tables: &GameTables) -> Rarity {
    let legendary = tables.spawn_chance(Rarity::Legendary);
    let rare = legendary + tables.spawn_chance(Rarity::Rare);
    let uncommon = rare + tables.spawn_chance(Rarity::Uncommon);

    if roll <= legendary {
        Rarity::Legendary
    } else if roll <= rare {
        Rarity::Rare
    } else if roll <= uncommon {
        Rarity::Uncommon
    } else {
        Rarity::Common
    }
}

/// Wire form of a powerup, enough for a peer to rebuild it from its own tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerupDescriptor {
    pub x: f32,
    pub y: f32,
    pub rarity: Rarity,
    pub index: u32,
    pub name: String,
}

/// What a combatant keeps after collecting a powerup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedPowerup {
    pub rarity: Rarity,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Powerup {
    pub index: u32,
    pub x: f32,
    pub y: f32,
    pub rarity: Rarity,
    pub name: String,
    pub effect: String,
    pub value: f32,
}

impl Powerup {
    pub fn new(
        index: u32,
        x: f32,
        y: f32,
        rarity: Rarity,
        name: &str,
        tables: &GameTables,
    ) -> Result<Self, ConfigError> {
        let info = tables.powerup(rarity, name)?;
        Ok(Self {
            index,
            x,
            y,
            rarity,
            name: name.to_string(),
            effect: info.effect.clone(),
            value: info.value,
        })
    }

    pub fn from_descriptor(desc: &PowerupDescriptor, tables: &GameTables) -> Result<Self, ConfigError> {
        Self::new(desc.index, desc.x, desc.y, desc.rarity, &desc.name, tables)
    }

    pub fn descriptor(&self) -> PowerupDescriptor {
        PowerupDescriptor {
            x: self.x,
            y: self.y,
            rarity: self.rarity,
            index: self.index,
            name: self.name.clone(),
        }
    }

    /// Applies the effect to `shape` and records the pickup in its tally
    pub fn pickup(&self, shape: &mut Shape) -> Result<(), EffectError> {
        shape.parse_effect(&self.effect, self.value)?;
        shape.record_pickup(CollectedPowerup {
            rarity: self.rarity,
            name: self.name.clone(),
        });
        Ok(())
    }
}

fn cell_of(x: f32, y: f32) -> (i32, i32) {
    (
        (x / POWERUP_GRID_SIZE).floor() as i32,
        (y / POWERUP_GRID_SIZE).floor() as i32,
    )
}

fn random_powerup(
    rng: &mut ChaCha8Rng,
    tables: &GameTables,
    index: u32,
    x: f32,
    y: f32,
) -> Result<Powerup, ConfigError> {
    let mut rarity = draw_rarity(rng.gen_range(0.0..=1.0), tables);
    if tables.powerups.get(&rarity).map_or(true, |info| info.types.is_empty()) {
        rarity = tables
            .powerups
            .iter()
            .find(|(_, info)| !info.types.is_empty())
            .map(|(rarity, _)| *rarity)
            .ok_or(ConfigError::Empty("powerups"))?;
    }

    let types = &tables.powerups[&rarity].types;
    let pick = rng.gen_range(0..types.len());
    let name = types.keys().nth(pick).ok_or(ConfigError::Empty("powerups"))?;

    Powerup::new(index, x, y, rarity, name, tables)
}

/// All loose powerups of a match, indexed by their stable network index and
/// bucketed into a coarse spatial grid for pickup tests
#[derive(Debug, Default)]
pub struct PowerupField {
    powerups: Vec<Powerup>,
    grid: HashMap<(i32, i32), Vec<u32>>,
    next_index: u32,
}

impl PowerupField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.powerups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powerups.is_empty()
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    pub fn iter(&self) -> impl Iterator<Item = &Powerup> {
        self.powerups.iter()
    }

    pub fn get(&self, index: u32) -> Option<&Powerup> {
        self.powerups.iter().find(|p| p.index == index)
    }

    /// Adds a powerup, refusing duplicates of an index already on the field
    /// and indices the counter cannot step past
    pub fn insert(&mut self, powerup: Powerup) -> bool {
        if self.get(powerup.index).is_some() {
            warn!("Ignoring duplicate powerup index {}", powerup.index);
            return false;
        }
        let Some(after) = powerup.index.checked_add(1) else {
            warn!("Ignoring powerup with out of range index {}", powerup.index);
            return false;
        };

        self.next_index = self.next_index.max(after);
        self.grid
            .entry(cell_of(powerup.x, powerup.y))
            .or_default()
            .push(powerup.index);
        self.powerups.push(powerup);
        true
    }

    /// Removes a powerup from both the flat list and its grid cell
    pub fn remove(&mut self, index: u32) -> Option<Powerup> {
        let pos = self.powerups.iter().position(|p| p.index == index)?;
        let powerup = self.powerups.swap_remove(pos);

        let cell = cell_of(powerup.x, powerup.y);
        if let Some(bucket) = self.grid.get_mut(&cell) {
            bucket.retain(|i| *i != index);
            if bucket.is_empty() {
                self.grid.remove(&cell);
            }
        }

        Some(powerup)
    }

    /// Powerups in the 3x3 grid neighbourhood around a point
    pub fn nearby(&self, x: f32, y: f32) -> Vec<&Powerup> {
        let (cx, cy) = cell_of(x, y);
        let mut found = Vec::new();

        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = self.grid.get(&(cx + dx, cy + dy)) {
                    found.extend(bucket.iter().filter_map(|i| self.get(*i)));
                }
            }
        }

        found
    }

    /// Deterministically spawns `count` powerups inside `bounds`
    ///
    /// The same seed, bounds and first index produce the same powerups on every
    /// process, which is how peers mirror the host's stage spawns.
    pub fn spawn_stage(
        &mut self,
        tables: &GameTables,
        seed: u64,
        count: usize,
        bounds: Bounds,
        first_index: u32,
    ) -> Result<Vec<PowerupDescriptor>, ConfigError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (left, top, right, bottom) = bounds;
        let mut spawned = Vec::with_capacity(count);

        for i in 0..count {
            let Some(index) = u32::try_from(i).ok().and_then(|i| first_index.checked_add(i)) else {
                warn!("Powerup indices exhausted after {} of {} from {}", i, count, first_index);
                break;
            };
            let x = sample_axis(&mut rng, left, right);
            let y = sample_axis(&mut rng, top, bottom);
            let powerup = random_powerup(&mut rng, tables, index, x, y)?;
            let descriptor = powerup.descriptor();
            if self.insert(powerup) {
                spawned.push(descriptor);
            }
        }

        Ok(spawned)
    }

    /// Respawns a dead combatant's collected powerups around its last position,
    /// continuing the field's index numbering
    pub fn spawn_loot<R: Rng>(
        &mut self,
        rng: &mut R,
        tables: &GameTables,
        x: f32,
        y: f32,
        collected: &[CollectedPowerup],
        map_size: f32,
    ) -> Vec<PowerupDescriptor> {
        let mut spawned = Vec::new();

        for record in collected {
            let lx = (x + rng.gen_range(-LOOT_SCATTER..=LOOT_SCATTER)).clamp(0.0, map_size);
            let ly = (y + rng.gen_range(-LOOT_SCATTER..=LOOT_SCATTER)).clamp(0.0, map_size);

            match Powerup::new(self.next_index, lx, ly, record.rarity, &record.name, tables) {
                Ok(powerup) => {
                    let descriptor = powerup.descriptor();
                    if self.insert(powerup) {
                        spawned.push(descriptor);
                    }
                }
                Err(e) => warn!("Dropping loot {}: {}", record.name, e),
            }
        }

        spawned
    }
}

fn sample_axis(rng: &mut ChaCha8Rng, low: f32, high: f32) -> f32 {
    if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    }
}
