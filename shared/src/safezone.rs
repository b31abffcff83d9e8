//! Phased shrinking safezone
//!
//! Four walls converge on a target box per phase. The walls are animated
//! through the simulation's [`AnimRegistry`]; a phase only advances once all
//! four wall animations report finished.

use crate::anim::{AnimHandle, AnimRegistry, DEFAULT_FINISH_DIST};
use crate::Bounds;
use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Duration of the first phase; later phases shrink evenly toward zero
const FIRST_PHASE_SECS: f32 = 60.0;
/// Slowest a wall ever moves, in world units per second
pub const MIN_WALL_SPEED: f32 = 10.0;
/// Zone damage per second at zone resistance 1.0
pub const ZONE_DPS: f32 = 30.0;
pub const ZONE_POISON_DAMAGE: f32 = 2.0;
pub const ZONE_POISON_DURATION: f32 = 3.0;
pub const ZONE_POISON_INTERVAL: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub target: (f32, f32),
    pub radius: f32,
    pub time: f32,
}

/// Builds the phase table for a match
///
/// Phase 0 covers the whole map; each following phase halves the radius and
/// picks a centre within that radius of the previous centre; the last phase
/// has radius zero.
pub fn generate_phases(seed: u64, map_size: f32, num_phases: usize) -> Vec<Phase> {
    let num_phases = num_phases.max(2);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut radius = (map_size * std::f32::consts::SQRT_2 / 2.0).floor();
    let mut target = (map_size / 2.0, map_size / 2.0);
    let mut time = FIRST_PHASE_SECS;
    let time_reduction = (FIRST_PHASE_SECS / (num_phases - 1) as f32).floor();

    let mut phases = Vec::with_capacity(num_phases);
    for _ in 0..num_phases - 1 {
        phases.push(Phase { target, radius, time });

        radius = (radius / 2.0).floor();
        target = (
            jitter(&mut rng, target.0, radius),
            jitter(&mut rng, target.1, radius),
        );
        time -= time_reduction;
    }

    phases.push(Phase {
        target,
        radius: 0.0,
        time: 0.0,
    });

    phases
}

fn jitter(rng: &mut ChaCha8Rng, centre: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return centre;
    }
    rng.gen_range((centre - radius).floor()..=(centre + radius).floor())
}

#[derive(Debug)]
pub struct Safezone {
    phases: Vec<Phase>,
    phase_index: usize,
    map_size: f32,
    walls: Option<[AnimHandle; 4]>,
    pub left_wall: f32,
    pub right_wall: f32,
    pub top_wall: f32,
    pub bottom_wall: f32,
}

impl Safezone {
    /// Starts with the walls on the map edges and immediately enters phase 1
    pub fn new(phases: Vec<Phase>, map_size: f32, anims: &mut AnimRegistry) -> Self {
        let mut safezone = Self {
            phases,
            phase_index: 0,
            map_size,
            walls: None,
            left_wall: 0.0,
            right_wall: map_size,
            top_wall: 0.0,
            bottom_wall: map_size,
        };
        safezone.next_phase(anims);
        safezone
    }

    pub fn from_seed(seed: u64, map_size: f32, num_phases: usize, anims: &mut AnimRegistry) -> Self {
        Self::new(generate_phases(seed, map_size, num_phases), map_size, anims)
    }

    pub fn phase_index(&self) -> usize {
        self.phase_index
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn is_terminal(&self) -> bool {
        self.phase_index + 1 >= self.phases.len()
    }

    pub fn target_radius(&self) -> f32 {
        self.phases[self.phase_index].radius
    }

    fn next_phase(&mut self, anims: &mut AnimRegistry) -> bool {
        if self.is_terminal() {
            return false;
        }

        if let Some(old) = self.walls.take() {
            for handle in old {
                anims.release(handle);
            }
        }

        self.phase_index += 1;
        let phase = &self.phases[self.phase_index];
        let (tx, ty) = phase.target;
        let r = phase.radius;
        let map = self.map_size;

        let targets = [
            (self.left_wall, (tx - r).clamp(0.0, map)),
            (self.right_wall, (tx + r).clamp(0.0, map)),
            (self.top_wall, (ty - r).clamp(0.0, map)),
            (self.bottom_wall, (ty + r).clamp(0.0, map)),
        ];

        let handles = targets.map(|(from, to)| {
            let distance = to - from;
            let speed = if phase.time > 0.0 {
                (distance.abs() / phase.time).max(MIN_WALL_SPEED)
            } else {
                MIN_WALL_SPEED
            };
            anims.register(from, to, speed.copysign(distance), DEFAULT_FINISH_DIST)
        });
        self.walls = Some(handles);

        info!(
            "Safezone entering phase {} (centre {:.0},{:.0} radius {:.0})",
            self.phase_index, tx, ty, r
        );
        true
    }

    /// Pulls the wall positions from the registry and advances the phase once
    /// every wall animation has finished. Returns true on a phase change.
    pub fn update(&mut self, anims: &mut AnimRegistry) -> bool {
        let Some(handles) = self.walls else {
            return false;
        };

        let [left, right, top, bottom] = handles;
        if let Some(v) = anims.value(left) {
            self.left_wall = v;
        }
        if let Some(v) = anims.value(right) {
            self.right_wall = v;
        }
        if let Some(v) = anims.value(top) {
            self.top_wall = v;
        }
        if let Some(v) = anims.value(bottom) {
            self.bottom_wall = v;
        }

        if handles.iter().all(|h| anims.is_finished(*h)) {
            return self.next_phase(anims);
        }
        false
    }

    /// (left, top, right, bottom)
    pub fn bounds(&self) -> Bounds {
        (self.left_wall, self.top_wall, self.right_wall, self.bottom_wall)
    }

    /// How far outside the walls a point is; zero when inside
    pub fn get_wall_distance(&self, x: f32, y: f32) -> f32 {
        let dx = (self.left_wall - x).max(x - self.right_wall).max(0.0);
        let dy = (self.top_wall - y).max(y - self.bottom_wall).max(0.0);
        dx.max(dy)
    }

    pub fn is_outside(&self, x: f32, y: f32) -> bool {
        x < self.left_wall || x > self.right_wall || y < self.top_wall || y > self.bottom_wall
    }

    /// Signed distances to the left, right, top and bottom walls as a fraction
    /// of the map size; negative means beyond that wall
    pub fn wall_distances(&self, x: f32, y: f32) -> [f32; 4] {
        [
            (x - self.left_wall) / self.map_size,
            (self.right_wall - x) / self.map_size,
            (y - self.top_wall) / self.map_size,
            (self.bottom_wall - y) / self.map_size,
        ]
    }

    /// Current zone width as a fraction of the map
    pub fn width_fraction(&self) -> f32 {
        (self.right_wall - self.left_wall) / self.map_size
    }
}

/// Zone damage for one tick, scaled inversely by zone resistance
pub fn zone_damage(dt: f32, zone_resistance: f32) -> f32 {
    ZONE_DPS * dt / zone_resistance.max(f32::EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_radii_strictly_decrease() {
        let phases = generate_phases(11, 10_000.0, 4);
        assert_eq!(phases.len(), 4);
        assert_eq!(phases[0].radius, 7071.0);
        assert_eq!(phases[0].target, (5000.0, 5000.0));
        for pair in phases.windows(2) {
            assert!(pair[1].radius < pair[0].radius || pair[1].radius == 0.0);
        }
        assert_eq!(phases[3].radius, 0.0);
    }

    #[test]
    fn test_phase_centres_stay_within_previous_radius() {
        let phases = generate_phases(3, 10_000.0, 5);
        for pair in phases.windows(2) {
            let r = pair[1].radius.max(0.0);
            let dx = (pair[1].target.0 - pair[0].target.0).abs();
            let dy = (pair[1].target.1 - pair[0].target.1).abs();
            if pair[1].radius > 0.0 {
                assert!(dx <= r + 1.0 && dy <= r + 1.0);
            }
        }
    }

    #[test]
    fn test_same_seed_same_table() {
        assert_eq!(generate_phases(5, 10_000.0, 4), generate_phases(5, 10_000.0, 4));
    }

    #[test]
    fn test_starts_in_phase_one_with_four_walls() {
        let mut anims = AnimRegistry::new();
        let zone = Safezone::from_seed(1, 10_000.0, 4, &mut anims);
        assert_eq!(zone.phase_index(), 1);
        assert_eq!(anims.len(), 4);
        assert_eq!(zone.bounds(), (0.0, 0.0, 10_000.0, 10_000.0));
    }

    #[test]
    fn test_phase_waits_for_all_walls() {
        let mut anims = AnimRegistry::new();
        let mut zone = Safezone::from_seed(9, 1_000.0, 3, &mut anims);
        let handles = zone.walls.unwrap();

        // Finish three walls by hand; the phase must not advance
        for handle in &handles[..3] {
            anims.release(*handle);
        }
        let last = handles[3];
        assert!(!anims.is_finished(last));
        assert!(!zone.update(&mut anims));
        assert_eq!(zone.phase_index(), 1);

        for _ in 0..10_000 {
            anims.update(0.1);
            if zone.update(&mut anims) {
                break;
            }
        }
        assert_eq!(zone.phase_index(), 2);
        assert!(zone.is_terminal());
    }

    #[test]
    fn test_terminal_phase_never_advances() {
        let mut anims = AnimRegistry::new();
        let mut zone = Safezone::from_seed(2, 1_000.0, 2, &mut anims);
        assert!(zone.is_terminal());

        for _ in 0..10_000 {
            anims.update(0.1);
            assert!(!zone.update(&mut anims));
        }
        assert_eq!(zone.phase_index(), 1);
        assert_eq!(zone.target_radius(), 0.0);
        assert!((zone.right_wall - zone.left_wall).abs() < 1.0);
    }

    #[test]
    fn test_outside_queries() {
        let mut anims = AnimRegistry::new();
        let mut zone = Safezone::from_seed(1, 1_000.0, 3, &mut anims);
        zone.left_wall = 100.0;
        zone.right_wall = 900.0;
        zone.top_wall = 200.0;
        zone.bottom_wall = 800.0;

        assert!(!zone.is_outside(500.0, 500.0));
        assert_eq!(zone.get_wall_distance(500.0, 500.0), 0.0);
        assert!(zone.is_outside(50.0, 500.0));
        assert_eq!(zone.get_wall_distance(50.0, 500.0), 50.0);
        assert_eq!(zone.get_wall_distance(500.0, 900.0), 100.0);

        let d = zone.wall_distances(50.0, 500.0);
        assert!(d[0] < 0.0);
        assert!(d[1] > 0.0);
    }

    #[test]
    fn test_zone_damage_scales_with_resistance() {
        assert_eq!(zone_damage(1.0, 1.0), ZONE_DPS);
        assert_eq!(zone_damage(1.0, 2.0), ZONE_DPS / 2.0);
    }
}
