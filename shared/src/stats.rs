//! Combatant stat block and the `target.stat.valuetype` effect grammar
//!
//! Stats are addressed through the [`Stat`] enum instead of by field name, so
//! powerup effects resolve to a typed accessor and every write goes through the
//! per-stat ceiling.

use crate::error::EffectError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Every mutable ability stat a powerup can touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    MaxHp,
    MaxShield,
    MaxSpeed,
    Damage,
    Firerate,
    BulletSpeed,
    Penetration,
    ShieldRegenRate,
    Lifesteal,
    PoisonDamage,
    ZoneResistance,
    HealthRegenRate,
    DamageGrowth,
}

impl Stat {
    pub const ALL: [Stat; 13] = [
        Stat::MaxHp,
        Stat::MaxShield,
        Stat::MaxSpeed,
        Stat::Damage,
        Stat::Firerate,
        Stat::BulletSpeed,
        Stat::Penetration,
        Stat::ShieldRegenRate,
        Stat::Lifesteal,
        Stat::PoisonDamage,
        Stat::ZoneResistance,
        Stat::HealthRegenRate,
        Stat::DamageGrowth,
    ];

    /// Upper bound a stat may never exceed
    pub fn ceiling(self) -> f32 {
        match self {
            Stat::MaxSpeed => 80.0,
            Stat::BulletSpeed => 40.0,
            Stat::ZoneResistance => 100.0,
            _ => f32::INFINITY,
        }
    }

    /// Resolves the stat segment of an effect descriptor
    pub fn from_effect_name(name: &str) -> Result<Self, EffectError> {
        let stat = match name {
            "maxhp" => Stat::MaxHp,
            "shield" => Stat::MaxShield,
            "speed" => Stat::MaxSpeed,
            "damage" => Stat::Damage,
            "firerate" => Stat::Firerate,
            "bulletspeed" => Stat::BulletSpeed,
            "penetration" => Stat::Penetration,
            "shieldregenrate" => Stat::ShieldRegenRate,
            "lifesteal" => Stat::Lifesteal,
            "poisondamage" => Stat::PoisonDamage,
            "zoneresistance" => Stat::ZoneResistance,
            "healthregenrate" => Stat::HealthRegenRate,
            "damagegrowth" => Stat::DamageGrowth,
            other => return Err(EffectError::UnknownStat(other.to_string())),
        };
        Ok(stat)
    }
}

/// How an effect value combines with the current stat value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Additive
    Increase,
    /// Multiplicative
    PercentageIncrease,
}

impl FromStr for ValueType {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "increase" => Ok(ValueType::Increase),
            "percentage_increase" => Ok(ValueType::PercentageIncrease),
            other => Err(EffectError::UnknownValueType(other.to_string())),
        }
    }
}

/// Who an effect applies to. Only the collecting combatant exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectTarget {
    Player,
}

/// A parsed `target.stat.valuetype` descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    pub target: EffectTarget,
    pub stat: Stat,
    pub value_type: ValueType,
}

impl FromStr for Effect {
    type Err = EffectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() < 3 {
            return Err(EffectError::Malformed(s.to_string()));
        }

        let target = match parts[0] {
            "player" => EffectTarget::Player,
            other => return Err(EffectError::UnknownTarget(other.to_string())),
        };

        Ok(Effect {
            target,
            stat: Stat::from_effect_name(parts[1])?,
            value_type: parts[2].parse()?,
        })
    }
}

/// The numeric ability stats of one combatant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatBlock {
    pub max_hp: f32,
    pub max_shield: f32,
    pub max_speed: f32,
    pub damage: f32,
    pub firerate: f32,
    pub bullet_speed: f32,
    pub penetration: f32,
    pub shield_regen_rate: f32,
    pub lifesteal: f32,
    pub poison_damage: f32,
    pub zone_resistance: f32,
    pub health_regen_rate: f32,
    pub damage_growth: f32,
}

impl StatBlock {
    pub fn get(&self, stat: Stat) -> f32 {
        match stat {
            Stat::MaxHp => self.max_hp,
            Stat::MaxShield => self.max_shield,
            Stat::MaxSpeed => self.max_speed,
            Stat::Damage => self.damage,
            Stat::Firerate => self.firerate,
            Stat::BulletSpeed => self.bullet_speed,
            Stat::Penetration => self.penetration,
            Stat::ShieldRegenRate => self.shield_regen_rate,
            Stat::Lifesteal => self.lifesteal,
            Stat::PoisonDamage => self.poison_damage,
            Stat::ZoneResistance => self.zone_resistance,
            Stat::HealthRegenRate => self.health_regen_rate,
            Stat::DamageGrowth => self.damage_growth,
        }
    }

    fn slot(&mut self, stat: Stat) -> &mut f32 {
        match stat {
            Stat::MaxHp => &mut self.max_hp,
            Stat::MaxShield => &mut self.max_shield,
            Stat::MaxSpeed => &mut self.max_speed,
            Stat::Damage => &mut self.damage,
            Stat::Firerate => &mut self.firerate,
            Stat::BulletSpeed => &mut self.bullet_speed,
            Stat::Penetration => &mut self.penetration,
            Stat::ShieldRegenRate => &mut self.shield_regen_rate,
            Stat::Lifesteal => &mut self.lifesteal,
            Stat::PoisonDamage => &mut self.poison_damage,
            Stat::ZoneResistance => &mut self.zone_resistance,
            Stat::HealthRegenRate => &mut self.health_regen_rate,
            Stat::DamageGrowth => &mut self.damage_growth,
        }
    }

    /// Applies `value` to `stat` and clamps the result to the stat ceiling
    pub fn change_var_value(&mut self, stat: Stat, value_type: ValueType, value: f32) -> f32 {
        let slot = self.slot(stat);
        let changed = match value_type {
            ValueType::Increase => *slot + value,
            ValueType::PercentageIncrease => *slot * value,
        };
        *slot = changed.min(stat.ceiling());
        *slot
    }
}
