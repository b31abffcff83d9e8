//! Property interpolation owned by the simulation
//!
//! Animations live in an [`AnimRegistry`] that the simulation owns and hands
//! to subsystems by reference. The registry owns the animated value; the
//! subsystem that registered it keeps an [`AnimHandle`] and reads it back.

use std::collections::HashMap;

pub const DEFAULT_FINISH_DIST: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnimHandle(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Anim {
    pub current: f32,
    pub target: f32,
    /// Signed change per second
    pub step: f32,
    pub max_finish_dist: f32,
    pub finished: bool,
}

impl Anim {
    /// Moves `current` by `step*dt`, snapping to the target once within tolerance
    pub fn update(&mut self, dt: f32) -> bool {
        if self.finished {
            return true;
        }

        if (self.target - self.current).abs() < (self.step * dt).abs().max(self.max_finish_dist) {
            self.current = self.target;
            self.finished = true;
            return true;
        }

        self.current += self.step * dt;
        false
    }
}

#[derive(Debug, Default)]
pub struct AnimRegistry {
    anims: HashMap<AnimHandle, Anim>,
    next_id: u64,
}

impl AnimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, current: f32, target: f32, step: f32, max_finish_dist: f32) -> AnimHandle {
        let handle = AnimHandle(self.next_id);
        self.next_id += 1;
        self.anims.insert(
            handle,
            Anim {
                current,
                target,
                step,
                max_finish_dist,
                finished: false,
            },
        );
        handle
    }

    /// Advances every unfinished animation; returns how many are still running
    pub fn update(&mut self, dt: f32) -> usize {
        let mut running = 0;
        for anim in self.anims.values_mut() {
            if !anim.update(dt) {
                running += 1;
            }
        }
        running
    }

    pub fn value(&self, handle: AnimHandle) -> Option<f32> {
        self.anims.get(&handle).map(|anim| anim.current)
    }

    /// Unknown handles count as finished
    pub fn is_finished(&self, handle: AnimHandle) -> bool {
        self.anims.get(&handle).map_or(true, |anim| anim.finished)
    }

    pub fn release(&mut self, handle: AnimHandle) -> Option<Anim> {
        self.anims.remove(&handle)
    }

    pub fn active(&self) -> usize {
        self.anims.values().filter(|anim| !anim.finished).count()
    }

    pub fn len(&self) -> usize {
        self.anims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anims.is_empty()
    }
}
