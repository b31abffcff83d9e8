use serde::{Deserialize, Serialize};

pub const POISON_DURATION: f32 = 10.0;
const POISON_TICK: f32 = 1.0;

/// Damage-over-time stack carried by a combatant
///
/// The source is identified by roster index rather than a reference, so a
/// poison can outlive the combatant that applied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poison {
    pub source: Option<usize>,
    pub damage: f32,
    pub remaining: f32,
    pub lifesteal: f32,
    since_tick: f32,
}

/// Result of one poison tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoisonTick {
    pub damage: f32,
    pub source: Option<usize>,
    pub lifesteal_heal: f32,
}

impl Poison {
    pub fn new(source: Option<usize>, damage: f32, duration: f32, lifesteal: f32) -> Self {
        Self {
            source,
            damage,
            remaining: duration,
            lifesteal,
            since_tick: 0.0,
        }
    }

    /// Advances the poison clock, returning a tick once a full second elapsed
    pub fn update(&mut self, dt: f32) -> Option<PoisonTick> {
        self.since_tick += dt;
        if self.since_tick < POISON_TICK {
            return None;
        }

        self.remaining -= self.since_tick;
        self.since_tick = 0.0;

        Some(PoisonTick {
            damage: self.damage,
            source: self.source,
            lifesteal_heal: self.damage * self.lifesteal,
        })
    }

    pub fn is_expired(&self) -> bool {
        self.remaining <= 0.0
    }
}
