//! The combatant entity and its damage, healing and movement rules

use crate::bullet::Bullet;
use crate::config::ShapeInfo;
use crate::error::EffectError;
use crate::poison::{Poison, PoisonTick, POISON_DURATION};
use crate::powerup::{CollectedPowerup, Rarity};
use crate::stats::{Effect, EffectTarget, StatBlock};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Speed multiplier applied to `max_speed` for one second of movement
pub const MOVE_SCALE: f32 = 30.0;
/// Distance below which `move_to` stops correcting an axis
const MOVE_DEAD_BAND: f32 = 20.0;

/// One of the four cardinal facings, serialized as degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Facing {
    Up,
    Left,
    Down,
    Right,
}

impl Facing {
    pub fn degrees(self) -> u16 {
        match self {
            Facing::Up => 0,
            Facing::Left => 90,
            Facing::Down => 180,
            Facing::Right => 270,
        }
    }

    /// Unit direction in screen coordinates (y grows downward)
    pub fn direction(self) -> (f32, f32) {
        match self {
            Facing::Up => (0.0, -1.0),
            Facing::Left => (-1.0, 0.0),
            Facing::Down => (0.0, 1.0),
            Facing::Right => (1.0, 0.0),
        }
    }
}

impl From<Facing> for u16 {
    fn from(facing: Facing) -> u16 {
        facing.degrees()
    }
}

impl TryFrom<u16> for Facing {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Facing::Up),
            90 => Ok(Facing::Left),
            180 => Ok(Facing::Down),
            270 => Ok(Facing::Right),
            other => Err(format!("{other} is not a cardinal rotation")),
        }
    }
}

/// Anything bullets and poisons can hurt or heal
pub trait Combatant {
    /// Returns true only on the call that takes hp to zero or below
    fn take_damage(&mut self, damage: f32) -> bool;
    /// Returns true only on the call that takes hp to zero or below
    fn take_shield_damage(&mut self, damage: f32) -> bool;
    fn give_lifesteal(&mut self, health: f32);
    fn add_poison(&mut self, source: Option<usize>, damage: f32, lifesteal: f32);
}

/// End-of-match counters for one combatant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatRecord {
    pub kills: u32,
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub total_damage: f32,
    pub num_common_picked: u32,
    pub num_uncommon_picked: u32,
    pub num_rare_picked: u32,
    pub num_legendary_picked: u32,
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub index: usize,
    pub shape_name: String,
    pub player_name: String,
    pub is_player: bool,

    pub x: f32,
    pub y: f32,
    pub rotation: Facing,
    pub size: f32,

    pub hp: f32,
    pub shield: f32,
    pub stats: StatBlock,

    pub poisons: Vec<Poison>,
    pub collected_powerups: Vec<CollectedPowerup>,
    pub record: CombatRecord,

    pub dead: bool,
    pub prioritises_x: bool,
    last_shoot_time: Option<f64>,
}

impl Shape {
    pub fn new(
        index: usize,
        shape_name: &str,
        info: &ShapeInfo,
        x: f32,
        y: f32,
        is_player: bool,
        player_name: &str,
    ) -> Self {
        let stats = StatBlock {
            max_hp: info.hp,
            max_shield: info.shield,
            max_speed: info.speed,
            damage: info.damage,
            firerate: info.firerate,
            bullet_speed: info.bullet_speed,
            penetration: info.penetration,
            shield_regen_rate: info.shield_regen,
            lifesteal: 1.0,
            poison_damage: 0.0,
            zone_resistance: 1.0,
            health_regen_rate: info.health_regen,
            damage_growth: 1.0,
        };

        Self {
            index,
            shape_name: shape_name.to_string(),
            player_name: player_name.to_string(),
            is_player,
            x,
            y,
            rotation: Facing::Up,
            size: info.size,
            hp: stats.max_hp,
            shield: stats.max_shield,
            stats,
            poisons: Vec::new(),
            collected_powerups: Vec::new(),
            record: CombatRecord::default(),
            dead: false,
            prioritises_x: index % 2 == 0,
            last_shoot_time: None,
        }
    }

    /// Axis-aligned bounds as (x1, y1, x2, y2), centred on the position
    pub fn get_bounds(&self) -> (f32, f32, f32, f32) {
        let half = self.size / 2.0;
        (self.x - half, self.y - half, self.x + half, self.y + half)
    }

    /// Radius within which this combatant collects powerups
    pub fn collision_radius(&self) -> f32 {
        self.size
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        ((self.x - x).powi(2) + (self.y - y).powi(2)).sqrt()
    }

    pub fn give_hp(&mut self, hp: f32) {
        self.hp = self.stats.max_hp.min(self.hp + hp);
    }

    pub fn give_shield_hp(&mut self, hp: f32) {
        self.shield = self.stats.max_shield.min(self.shield + hp);
    }

    fn die(&mut self) -> bool {
        if self.dead {
            return false;
        }
        self.dead = true;
        true
    }

    /// Applies a parsed `target.stat.valuetype` effect with the given value
    pub fn apply_effect(&mut self, effect: Effect, value: f32) {
        match effect.target {
            EffectTarget::Player => {
                self.stats
                    .change_var_value(effect.stat, effect.value_type, value);
            }
        }
    }

    pub fn parse_effect(&mut self, effect: &str, value: f32) -> Result<(), EffectError> {
        let effect: Effect = effect.parse()?;
        self.apply_effect(effect, value);
        Ok(())
    }

    pub fn record_pickup(&mut self, collected: CollectedPowerup) {
        match collected.rarity {
            Rarity::Common => self.record.num_common_picked += 1,
            Rarity::Uncommon => self.record.num_uncommon_picked += 1,
            Rarity::Rare => self.record.num_rare_picked += 1,
            Rarity::Legendary => self.record.num_legendary_picked += 1,
        }
        self.collected_powerups.push(collected);
    }

    fn step(&mut self, facing: Facing, dt: f32) {
        let (dx, dy) = facing.direction();
        let distance = self.stats.max_speed * dt * MOVE_SCALE;
        self.x += dx * distance;
        self.y += dy * distance;
        self.rotation = facing;
    }

    pub fn move_up(&mut self, dt: f32) {
        self.step(Facing::Up, dt);
    }

    pub fn move_right(&mut self, dt: f32) {
        self.step(Facing::Right, dt);
    }

    pub fn move_down(&mut self, dt: f32) {
        self.step(Facing::Down, dt);
    }

    pub fn move_left(&mut self, dt: f32) {
        self.step(Facing::Left, dt);
    }

    pub fn move_towards(&mut self, facing: Facing, dt: f32) {
        self.step(facing, dt);
    }

    /// Turns to `facing` without moving
    pub fn face(&mut self, facing: Facing) {
        self.rotation = facing;
    }

    /// Steps toward a point one axis at a time, preferring this combatant's axis
    pub fn move_to(&mut self, x: f32, y: f32, dt: f32) {
        let rx = x - self.x;
        let ry = y - self.y;

        let horizontal = if rx.abs() > MOVE_DEAD_BAND {
            Some(if rx < 0.0 { Facing::Left } else { Facing::Right })
        } else {
            None
        };
        let vertical = if ry.abs() > MOVE_DEAD_BAND {
            Some(if ry < 0.0 { Facing::Up } else { Facing::Down })
        } else {
            None
        };

        let choice = if self.prioritises_x {
            horizontal.or(vertical)
        } else {
            vertical.or(horizontal)
        };

        if let Some(facing) = choice {
            self.step(facing, dt);
        }
    }

    pub fn bullet_velocity(&self) -> (f32, f32) {
        let speed = self.stats.max_speed * (self.stats.bullet_speed + 1.0) / 2.5;
        let (dx, dy) = self.rotation.direction();
        (dx * speed, dy * speed)
    }

    pub fn can_shoot(&self, now: f64) -> bool {
        match self.last_shoot_time {
            Some(last) => now - last >= 1.0 / self.stats.firerate as f64,
            None => true,
        }
    }

    /// Fires along the current facing if the fire-rate cooldown has elapsed
    pub fn shoot(&mut self, now: f64) -> Option<Bullet> {
        if !self.can_shoot(now) {
            return None;
        }

        self.last_shoot_time = Some(now);
        self.record.shots_fired += 1;
        Some(Bullet::fired_by(self))
    }

    /// Advances poisons and regeneration; returns the poison ticks that landed
    /// so their sources can be credited with lifesteal
    pub fn update(&mut self, dt: f32) -> Vec<PoisonTick> {
        let mut ticks = Vec::new();
        for poison in &mut self.poisons {
            if let Some(tick) = poison.update(dt) {
                ticks.push(tick);
            }
        }
        self.poisons.retain(|p| !p.is_expired());

        for tick in &ticks {
            self.take_damage(tick.damage);
        }

        if !self.dead {
            self.give_hp(self.stats.health_regen_rate * dt);
            self.give_shield_hp(self.stats.shield_regen_rate * dt);
        }

        ticks
    }
}

impl Combatant for Shape {
    fn take_damage(&mut self, damage: f32) -> bool {
        self.hp -= damage;
        if self.hp <= 0.0 {
            return self.die();
        }
        false
    }

    fn take_shield_damage(&mut self, damage: f32) -> bool {
        let leftover = damage - self.shield;
        if leftover > 0.0 {
            self.shield = 0.0;
            self.take_damage(leftover)
        } else {
            self.shield -= damage;
            false
        }
    }

    fn give_lifesteal(&mut self, health: f32) {
        self.give_hp(health);
    }

    fn add_poison(&mut self, source: Option<usize>, damage: f32, lifesteal: f32) {
        self.poisons
            .push(Poison::new(source, damage, POISON_DURATION, lifesteal));
    }
}
