//! Types and rules shared by the authoritative host and its peers
//!
//! Holds the wire protocol and framed transport, the entity model
//! (shapes, bullets, powerups, poison), the stat table, the animation
//! registry driving the safezone, and the data tables loaded at startup.

pub mod anim;
pub mod bullet;
pub mod config;
pub mod error;
pub mod input;
pub mod poison;
pub mod powerup;
pub mod protocol;
pub mod safezone;
pub mod shape;
pub mod stats;
pub mod transport;

pub use anim::{AnimHandle, AnimRegistry};
pub use bullet::{Bullet, BulletSnapshot};
pub use config::{GameTables, MatchConfig};
pub use error::{ConfigError, EffectError, TransportError};
pub use powerup::{Powerup, PowerupDescriptor, PowerupField, Rarity};
pub use protocol::{Answer, MatchOutcome, Message};
pub use safezone::Safezone;
pub use shape::{Combatant, CombatRecord, Facing, Shape};
pub use stats::{Stat, StatBlock};
pub use transport::Connection;

pub const MAP_SIZE: f32 = 10_000.0;
pub const NUM_PHASES: usize = 4;
pub const NUM_PLAYERS: usize = 100;
pub const NUM_POWERUPS: usize = 600;
pub const TICK_RATE: u32 = 60;
pub const LOBBY_COUNTDOWN_SECS: f32 = 3.0;
pub const BULLET_SYNC_RADIUS: f32 = 2_500.0;
pub const MAX_BULLET_TRAVEL_DIST: f32 = 2_000.0;
pub const POWERUP_GRID_SIZE: f32 = 500.0;
/// Distance from the map edge inside which nobody spawns
pub const SPAWN_INSET: f32 = 200.0;
/// Seconds without an update before a peer treats a combatant as gone
pub const SILENCE_WINDOW: f64 = 3.0;
/// Zone width, as a fraction of the map, below which the second powerup wave spawns
pub const STAGE_TWO_FRACTION: f32 = 0.5;
/// Upper bound on a single tick's dt, in seconds
pub const MAX_DT: f32 = 0.05;

/// Axis-aligned box as (left, top, right, bottom)
pub type Bounds = (f32, f32, f32, f32);

/// Strict overlap test; boxes that only touch do not collide
pub fn check_overlap(a: Bounds, b: Bounds) -> bool {
    let (x1, y1, x2, y2) = a;
    let (x3, y3, x4, y4) = b;

    !(x2 <= x3 || x4 <= x1 || y2 <= y3 || y4 <= y1)
}
