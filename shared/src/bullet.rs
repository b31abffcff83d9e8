use crate::shape::{Combatant, Shape};
use serde::{Deserialize, Serialize};

pub const BULLET_SIZE: f32 = 10.0;
/// Travel distance over which damage growth scales linearly
const DAMAGE_GROWTH_DISTANCE: f32 = 400.0;
/// Velocity multiplier applied per second of travel
const BULLET_MOVE_SCALE: f32 = 10.0;
/// Neutral value of the damage growth stat
const NEUTRAL_GROWTH: f32 = 1.0;

/// A projectile, carrying a snapshot of its shooter's stats at fire time
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub owner: usize,
    pub start_x: f32,
    pub start_y: f32,
    pub x: f32,
    pub y: f32,
    pub velocity: (f32, f32),
    pub base_damage: f32,
    pub damage_growth: f32,
    pub poison_damage: f32,
    pub penetration: f32,
    pub lifesteal: f32,
}

/// What a hit did, for crediting the shooter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitOutcome {
    pub health_damage: f32,
    pub lifesteal_heal: f32,
    pub killed: bool,
}

/// Wire form of a bullet sent to peers for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub owner: usize,
    pub x: f32,
    pub y: f32,
    pub start_x: f32,
    pub start_y: f32,
    pub vx: f32,
    pub vy: f32,
    pub damage: f32,
}

impl BulletSnapshot {
    /// Display-only advance between host snapshots
    pub fn advance(&mut self, dt: f32) {
        self.x += self.vx * dt * BULLET_MOVE_SCALE;
        self.y += self.vy * dt * BULLET_MOVE_SCALE;
    }
}

impl Bullet {
    pub fn fired_by(shape: &Shape) -> Self {
        Self {
            owner: shape.index,
            start_x: shape.x,
            start_y: shape.y,
            x: shape.x,
            y: shape.y,
            velocity: shape.bullet_velocity(),
            base_damage: shape.stats.damage,
            damage_growth: shape.stats.damage_growth,
            poison_damage: shape.stats.poison_damage,
            penetration: shape.stats.penetration,
            lifesteal: shape.stats.lifesteal,
        }
    }

    pub fn distance_travelled(&self) -> f32 {
        ((self.x - self.start_x).powi(2) + (self.y - self.start_y).powi(2)).sqrt()
    }

    pub fn health_damage(&self) -> f32 {
        if self.damage_growth == NEUTRAL_GROWTH {
            self.base_damage
        } else {
            self.base_damage * (self.damage_growth * self.distance_travelled() / DAMAGE_GROWTH_DISTANCE)
        }
    }

    pub fn get_bounds(&self) -> (f32, f32, f32, f32) {
        let half = BULLET_SIZE / 2.0;
        (self.x - half, self.y - half, self.x + half, self.y + half)
    }

    pub fn advance(&mut self, dt: f32) {
        self.x += self.velocity.0 * dt * BULLET_MOVE_SCALE;
        self.y += self.velocity.1 * dt * BULLET_MOVE_SCALE;
    }

    /// Applies health damage, then the penetrating shield damage, then poison
    pub fn hit<T: Combatant>(&self, target: &mut T) -> HitOutcome {
        let health_damage = self.health_damage();
        let shield_damage = health_damage * self.penetration;

        let mut killed = target.take_damage(health_damage);
        killed |= target.take_shield_damage(shield_damage);

        if self.poison_damage > 0.0 {
            target.add_poison(Some(self.owner), self.poison_damage, self.lifesteal - 1.0);
        }

        HitOutcome {
            health_damage,
            lifesteal_heal: health_damage * (self.lifesteal - 1.0),
            killed,
        }
    }

    pub fn snapshot(&self) -> BulletSnapshot {
        BulletSnapshot {
            owner: self.owner,
            x: self.x,
            y: self.y,
            start_x: self.start_x,
            start_y: self.start_y,
            vx: self.velocity.0,
            vy: self.velocity.1,
            damage: self.health_damage(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShapeInfo;
    use crate::shape::Facing;
    use assert_approx_eq::assert_approx_eq;

    fn shooter() -> Shape {
        let info = ShapeInfo {
            hp: 100.0,
            shield: 20.0,
            speed: 10.0,
            damage: 12.0,
            firerate: 2.0,
            bullet_speed: 9.0,
            penetration: 0.5,
            shield_regen: 0.0,
            health_regen: 0.0,
            size: 40.0,
        };
        Shape::new(0, "Square", &info, 100.0, 100.0, true, "host")
    }

    #[test]
    fn test_bullet_inherits_shooter_stats() {
        let mut shape = shooter();
        shape.face(Facing::Right);
        let bullet = Bullet::fired_by(&shape);

        assert_eq!(bullet.owner, 0);
        assert_eq!((bullet.start_x, bullet.start_y), (100.0, 100.0));
        assert_approx_eq!(bullet.velocity.0, 10.0 * 10.0 / 2.5);
        assert_eq!(bullet.velocity.1, 0.0);
        assert_eq!(bullet.base_damage, 12.0);
    }

    #[test]
    fn test_neutral_growth_keeps_base_damage() {
        let mut bullet = Bullet::fired_by(&shooter());
        bullet.advance(1.0);
        assert!(bullet.distance_travelled() > 0.0);
        assert_eq!(bullet.health_damage(), 12.0);
    }

    #[test]
    fn test_damage_growth_scales_with_distance() {
        let mut bullet = Bullet::fired_by(&shooter());
        bullet.damage_growth = 2.0;
        bullet.y = bullet.start_y - 400.0;
        assert_approx_eq!(bullet.health_damage(), 24.0);
    }

    #[test]
    fn test_hit_applies_health_then_shield_damage() {
        let bullet = Bullet::fired_by(&shooter());
        let mut target = shooter();
        target.index = 1;

        let outcome = bullet.hit(&mut target);

        assert_eq!(outcome.health_damage, 12.0);
        assert!(!outcome.killed);
        assert_approx_eq!(target.hp, 88.0);
        assert_approx_eq!(target.shield, 14.0);
        assert!(target.poisons.is_empty());
    }

    #[test]
    fn test_hit_with_poison_and_lifesteal() {
        let mut shape = shooter();
        shape.stats.poison_damage = 3.0;
        shape.stats.lifesteal = 1.25;
        let bullet = Bullet::fired_by(&shape);

        let mut target = shooter();
        let outcome = bullet.hit(&mut target);

        assert_eq!(target.poisons.len(), 1);
        assert_eq!(target.poisons[0].source, Some(0));
        assert_approx_eq!(outcome.lifesteal_heal, 3.0);
    }

    #[test]
    fn test_hit_reports_kill() {
        let bullet = Bullet::fired_by(&shooter());
        let mut target = shooter();
        target.hp = 5.0;
        assert!(bullet.hit(&mut target).killed);
    }
}
