//! Control intents for the locally driven combatant
//!
//! Presentation lives outside the crate, so whatever drives the local
//! combatant (a keyboard layer, a test script, the built-in autopilot)
//! plugs in as an [`InputSource`].

use crate::shape::Facing;
use crate::Bounds;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ARRIVE_DIST: f32 = 50.0;
const AXIS_DEAD_BAND: f32 = 20.0;
const WANDER_INSET: f32 = 100.0;
const FIRE_INTERVAL: f64 = 0.5;
pub const SPECTATE_CYCLE_SECS: f64 = 5.0;

/// What the local controller wants this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Intent {
    pub direction: Option<Facing>,
    pub shoot: bool,
    pub cycle_spectate: bool,
}

/// The world as an input source sees it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputView {
    pub x: f32,
    pub y: f32,
    pub alive: bool,
    pub zone: Bounds,
    pub now: f64,
}

pub trait InputSource: Send {
    fn poll(&mut self, view: &InputView) -> Intent;
}

/// Headless controller that wanders inside the safezone and fires steadily
#[derive(Debug)]
pub struct Autopilot {
    rng: ChaCha8Rng,
    target: Option<(f32, f32)>,
    last_fire: f64,
    last_cycle: f64,
}

impl Autopilot {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            target: None,
            last_fire: f64::NEG_INFINITY,
            last_cycle: 0.0,
        }
    }

    fn pick_target(&mut self, zone: Bounds) -> (f32, f32) {
        let (left, top, right, bottom) = zone;
        (
            sample_inset(&mut self.rng, left, right),
            sample_inset(&mut self.rng, top, bottom),
        )
    }
}

fn sample_inset(rng: &mut ChaCha8Rng, low: f32, high: f32) -> f32 {
    let (low, high) = if high - low > 2.0 * WANDER_INSET {
        (low + WANDER_INSET, high - WANDER_INSET)
    } else {
        (low, high)
    };
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

fn inside(zone: Bounds, x: f32, y: f32) -> bool {
    let (left, top, right, bottom) = zone;
    x >= left && x <= right && y >= top && y <= bottom
}

impl InputSource for Autopilot {
    fn poll(&mut self, view: &InputView) -> Intent {
        if !view.alive {
            let cycle_spectate = view.now - self.last_cycle >= SPECTATE_CYCLE_SECS;
            if cycle_spectate {
                self.last_cycle = view.now;
            }
            return Intent {
                cycle_spectate,
                ..Default::default()
            };
        }

        let target = match self.target {
            Some((tx, ty))
                if inside(view.zone, tx, ty)
                    && ((tx - view.x).powi(2) + (ty - view.y).powi(2)).sqrt() > ARRIVE_DIST =>
            {
                (tx, ty)
            }
            _ => {
                let fresh = self.pick_target(view.zone);
                self.target = Some(fresh);
                fresh
            }
        };

        let dx = target.0 - view.x;
        let dy = target.1 - view.y;
        let direction = if dx.abs() >= dy.abs() && dx.abs() > AXIS_DEAD_BAND {
            Some(if dx < 0.0 { Facing::Left } else { Facing::Right })
        } else if dy.abs() > AXIS_DEAD_BAND {
            Some(if dy < 0.0 { Facing::Up } else { Facing::Down })
        } else {
            None
        };

        let shoot = view.now - self.last_fire >= FIRE_INTERVAL;
        if shoot {
            self.last_fire = view.now;
        }

        Intent {
            direction,
            shoot,
            cycle_spectate: false,
        }
    }
}
