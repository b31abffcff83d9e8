//! Steering for combatants nobody is driving
//!
//! Bots are simple on purpose: get back inside the walls, fight whoever is
//! close, grab powerups while the zone is comfortable, otherwise wander.

use rand::Rng;
use shared::{Facing, PowerupField, Safezone, Shape};

const FIGHT_RANGE: f32 = 1_000.0;
const ALIGN_TOLERANCE: f32 = 40.0;
/// Normalized wall distance below which bots stop detouring for powerups
const SAFE_WALL_DIST: f32 = 0.015;
const WANDER_ARRIVE_DIST: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Steer {
    Move(Facing),
    MoveTo(f32, f32),
    Face(Facing),
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub steer: Steer,
    pub shoot: bool,
}

/// Per-bot memory kept between ticks
#[derive(Debug, Clone, Default)]
pub struct BotBrain {
    wander: Option<(f32, f32)>,
}

fn towards_x(dx: f32) -> Facing {
    if dx < 0.0 {
        Facing::Left
    } else {
        Facing::Right
    }
}

fn towards_y(dy: f32) -> Facing {
    if dy < 0.0 {
        Facing::Up
    } else {
        Facing::Down
    }
}

pub fn decide<R: Rng>(
    me: &Shape,
    roster: &[Shape],
    zone: &Safezone,
    powerups: &PowerupField,
    brain: &mut BotBrain,
    rng: &mut R,
) -> Decision {
    let walls = zone.wall_distances(me.x, me.y);

    let inward = if walls[0] <= 0.0 {
        Some(Facing::Right)
    } else if walls[1] <= 0.0 {
        Some(Facing::Left)
    } else if walls[2] <= 0.0 {
        Some(Facing::Down)
    } else if walls[3] <= 0.0 {
        Some(Facing::Up)
    } else {
        None
    };
    if let Some(facing) = inward {
        brain.wander = None;
        return Decision {
            steer: Steer::Move(facing),
            shoot: false,
        };
    }

    let enemy = roster
        .iter()
        .filter(|other| other.index != me.index && !other.dead)
        .map(|other| (other, me.distance_to(other.x, other.y)))
        .filter(|(_, dist)| *dist <= FIGHT_RANGE)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((enemy, _)) = enemy {
        let dx = enemy.x - me.x;
        let dy = enemy.y - me.y;

        if dx.abs() <= ALIGN_TOLERANCE {
            return Decision {
                steer: Steer::Face(towards_y(dy)),
                shoot: true,
            };
        }
        if dy.abs() <= ALIGN_TOLERANCE {
            return Decision {
                steer: Steer::Face(towards_x(dx)),
                shoot: true,
            };
        }

        // Close the shorter gap to line up a shot
        let facing = if dx.abs() < dy.abs() {
            towards_x(dx)
        } else {
            towards_y(dy)
        };
        return Decision {
            steer: Steer::Move(facing),
            shoot: false,
        };
    }

    if walls.iter().all(|d| *d > SAFE_WALL_DIST) {
        let closest = powerups
            .nearby(me.x, me.y)
            .into_iter()
            .min_by(|a, b| me.distance_to(a.x, a.y).total_cmp(&me.distance_to(b.x, b.y)));
        if let Some(powerup) = closest {
            return Decision {
                steer: Steer::MoveTo(powerup.x, powerup.y),
                shoot: false,
            };
        }
    }

    let target = match brain.wander {
        Some((x, y)) if !zone.is_outside(x, y) && me.distance_to(x, y) > WANDER_ARRIVE_DIST => (x, y),
        _ => {
            let (left, top, right, bottom) = zone.bounds();
            let fresh = (sample(rng, left, right), sample(rng, top, bottom));
            brain.wander = Some(fresh);
            fresh
        }
    };

    Decision {
        steer: Steer::MoveTo(target.0, target.1),
        shoot: false,
    }
}

fn sample<R: Rng>(rng: &mut R, low: f32, high: f32) -> f32 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}

/// Carries a steering decision out on the shape
pub fn apply(shape: &mut Shape, steer: Steer, dt: f32) {
    match steer {
        Steer::Move(facing) => shape.move_towards(facing, dt),
        Steer::MoveTo(x, y) => shape.move_to(x, y, dt),
        Steer::Face(facing) => shape.face(facing),
        Steer::Idle => {}
    }
}
