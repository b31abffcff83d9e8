//! Authoritative match simulation
//!
//! `GameState` owns every entity of the match and advances them in a fixed
//! order each tick. Anything peers must hear about (removals, new powerups,
//! the second powerup wave) is queued as a [`GameEvent`] for the network
//! layer to relay.

use crate::ai::{self, BotBrain};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shared::check_overlap;
use shared::poison::Poison;
use shared::protocol::{
    Answer, MatchOutcome, PlayerSnapshot, PosUpdate, PowerupSet, RosterEntry, WinnerStats,
};
use shared::safezone::{
    zone_damage, ZONE_POISON_DAMAGE, ZONE_POISON_DURATION, ZONE_POISON_INTERVAL,
};
use shared::{
    AnimRegistry, Bullet, BulletSnapshot, Combatant, ConfigError, GameTables, MatchConfig,
    PowerupDescriptor, PowerupField, Safezone, Shape, STAGE_TWO_FRACTION,
};
use std::collections::{HashMap, HashSet};

/// Seeds that let every process rebuild the same world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSeeds {
    pub safezone: u64,
    pub stage_one: u64,
    pub stage_two: u64,
}

impl MatchSeeds {
    pub fn random<R: rand::Rng>(rng: &mut R) -> Self {
        Self {
            safezone: rng.gen(),
            stage_one: rng.gen(),
            stage_two: rng.gen(),
        }
    }
}

/// Something peers must be told about
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    PlayerRemoved(usize),
    PowerupAdded(PowerupDescriptor),
    PowerupRemoved(u32),
    PowerupStage(PowerupSet),
}

impl GameEvent {
    pub fn to_answer(&self) -> Answer {
        match self {
            GameEvent::PlayerRemoved(index) => Answer {
                player_remove: Some(*index),
                ..Default::default()
            },
            GameEvent::PowerupAdded(desc) => Answer {
                powerup_add: Some(desc.clone()),
                ..Default::default()
            },
            GameEvent::PowerupRemoved(index) => Answer {
                powerup_remove: Some(*index),
                ..Default::default()
            },
            GameEvent::PowerupStage(set) => Answer {
                powerup_set: Some(*set),
                ..Default::default()
            },
        }
    }
}

/// Damage dealt by one bullet, credited to its owner after the collision pass
#[derive(Debug, Clone, Copy)]
struct HitCredit {
    owner: usize,
    damage: f32,
    heal: f32,
    killed: bool,
}

pub struct GameState {
    pub tick: u64,
    /// Simulation clock in seconds
    pub time: f64,
    pub config: MatchConfig,
    pub tables: GameTables,
    pub seeds: MatchSeeds,
    pub players: Vec<Shape>,
    pub dead_players: Vec<Shape>,
    pub bullets: Vec<Bullet>,
    pub powerups: PowerupField,
    pub anims: AnimRegistry,
    pub safezone: Safezone,
    /// Indices steered by a human rather than bot logic
    controlled: HashSet<usize>,
    brains: HashMap<usize, BotBrain>,
    last_zone_poison: HashMap<usize, f64>,
    stage_two_spawned: bool,
    events: Vec<GameEvent>,
    outcome: Option<MatchOutcome>,
    rng: ChaCha8Rng,
}

impl GameState {
    /// Builds the world from a dealt roster; the first powerup stage spawns
    /// over the whole map immediately
    pub fn new(
        config: MatchConfig,
        tables: GameTables,
        seeds: MatchSeeds,
        roster: Vec<Shape>,
    ) -> Result<Self, ConfigError> {
        let mut anims = AnimRegistry::new();
        let safezone = Safezone::from_seed(seeds.safezone, config.map_size, config.num_phases, &mut anims);

        let mut powerups = PowerupField::new();
        powerups.spawn_stage(
            &tables,
            seeds.stage_one,
            config.num_powerups,
            (0.0, 0.0, config.map_size, config.map_size),
            0,
        )?;

        let controlled = roster.iter().filter(|s| s.is_player).map(|s| s.index).collect();
        info!(
            "Match ready: {} combatants, {} powerups",
            roster.len(),
            powerups.len()
        );

        Ok(Self {
            tick: 0,
            time: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seeds.safezone ^ seeds.stage_one),
            config,
            tables,
            seeds,
            players: roster,
            dead_players: Vec::new(),
            bullets: Vec::new(),
            powerups,
            anims,
            safezone,
            controlled,
            brains: HashMap::new(),
            last_zone_poison: HashMap::new(),
            stage_two_spawned: false,
            events: Vec::new(),
            outcome: None,
        })
    }

    pub fn player(&self, index: usize) -> Option<&Shape> {
        self.players.iter().find(|s| s.index == index)
    }

    pub fn player_mut(&mut self, index: usize) -> Option<&mut Shape> {
        self.players.iter_mut().find(|s| s.index == index)
    }

    pub fn is_controlled(&self, index: usize) -> bool {
        self.controlled.contains(&index)
    }

    /// Hands a combatant over to bot steering
    pub fn release_to_bot(&mut self, index: usize) {
        if self.controlled.remove(&index) {
            info!("Combatant {} is now steered by a bot", index);
        }
    }

    /// Overwrites a peer-driven combatant's position; last writer wins
    pub fn apply_pos_update(&mut self, update: &PosUpdate) -> bool {
        match self.player_mut(update.index) {
            Some(shape) => {
                shape.x = update.x;
                shape.y = update.y;
                shape.rotation = update.rotation;
                true
            }
            None => false,
        }
    }

    /// Fires for `index` if its cooldown allows
    pub fn request_shoot(&mut self, index: usize) -> bool {
        let now = self.time;
        let bullet = match self.player_mut(index) {
            Some(shape) => shape.shoot(now),
            None => None,
        };
        match bullet {
            Some(bullet) => {
                self.bullets.push(bullet);
                true
            }
            None => false,
        }
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.players.iter().map(RosterEntry::of).collect()
    }

    pub fn player_updates(&self) -> Vec<PlayerSnapshot> {
        self.players.iter().map(PlayerSnapshot::of).collect()
    }

    /// Bullets within `radius` of a point, or every bullet when there is no point
    pub fn bullets_near(&self, centre: Option<(f32, f32)>, radius: f32) -> Vec<BulletSnapshot> {
        self.bullets
            .iter()
            .filter(|b| match centre {
                Some((x, y)) => ((b.x - x).powi(2) + (b.y - y).powi(2)).sqrt() <= radius,
                None => true,
            })
            .map(Bullet::snapshot)
            .collect()
    }

    /// Advances the match by one tick
    pub fn step(&mut self, dt: f32) {
        if self.outcome.is_some() {
            return;
        }

        self.tick += 1;
        self.time += dt as f64;

        self.anims.update(dt);
        if self.safezone.update(&mut self.anims) {
            debug!("Tick {}: safezone phase {}", self.tick, self.safezone.phase_index());
        }

        for bullet in &mut self.bullets {
            bullet.advance(dt);
        }

        self.update_shapes(dt);
        self.steer_bots(dt);
        self.resolve_collisions(dt);
        self.maybe_spawn_stage_two();
        self.remove_eliminated();
        self.check_end();
    }

    fn update_shapes(&mut self, dt: f32) {
        let mut heals = Vec::new();
        for shape in &mut self.players {
            for tick in shape.update(dt) {
                if let Some(source) = tick.source {
                    heals.push((source, tick.lifesteal_heal));
                }
            }
        }

        for (source, heal) in heals {
            if heal > 0.0 {
                if let Some(shape) = self.player_mut(source) {
                    shape.give_lifesteal(heal);
                }
            }
        }
    }

    fn steer_bots(&mut self, dt: f32) {
        let now = self.time;
        for i in 0..self.players.len() {
            let index = self.players[i].index;
            if self.controlled.contains(&index) || self.players[i].dead {
                continue;
            }

            let brain = self.brains.entry(index).or_default();
            let decision = ai::decide(
                &self.players[i],
                &self.players,
                &self.safezone,
                &self.powerups,
                brain,
                &mut self.rng,
            );

            let shape = &mut self.players[i];
            ai::apply(shape, decision.steer, dt);
            if decision.shoot {
                if let Some(bullet) = shape.shoot(now) {
                    self.bullets.push(bullet);
                }
            }
        }
    }

    fn resolve_collisions(&mut self, dt: f32) {
        let now = self.time;
        let mut spent = HashSet::new();
        let mut credits = Vec::new();

        for shape in &mut self.players {
            if shape.dead {
                continue;
            }

            // (1) zone damage and at most one zone poison per interval
            if self.safezone.is_outside(shape.x, shape.y) {
                let resistance = shape.stats.zone_resistance;
                shape.take_damage(zone_damage(dt, resistance));

                let last = self.last_zone_poison.get(&shape.index).copied();
                if last.map_or(true, |t| now - t >= ZONE_POISON_INTERVAL as f64) {
                    shape.poisons.push(Poison::new(
                        None,
                        ZONE_POISON_DAMAGE / resistance.max(f32::EPSILON),
                        ZONE_POISON_DURATION,
                        0.0,
                    ));
                    self.last_zone_poison.insert(shape.index, now);
                }
            }

            // (2) bullet hits
            let bounds = shape.get_bounds();
            for (bi, bullet) in self.bullets.iter().enumerate() {
                if shape.dead {
                    break;
                }
                if bullet.owner == shape.index || spent.contains(&bi) {
                    continue;
                }
                if !check_overlap(bullet.get_bounds(), bounds) {
                    continue;
                }

                let outcome = bullet.hit(&mut *shape);
                spent.insert(bi);
                credits.push(HitCredit {
                    owner: bullet.owner,
                    damage: outcome.health_damage,
                    heal: outcome.lifesteal_heal,
                    killed: outcome.killed,
                });
            }

            // (4) pickups
            if shape.dead {
                continue;
            }
            let reach = shape.collision_radius();
            let collected: Vec<u32> = self
                .powerups
                .nearby(shape.x, shape.y)
                .into_iter()
                .filter(|p| shape.distance_to(p.x, p.y) <= reach)
                .map(|p| p.index)
                .collect();

            for index in collected {
                if let Some(powerup) = self.powerups.remove(index) {
                    if let Err(e) = powerup.pickup(shape) {
                        warn!("Powerup {} has a bad effect: {}", powerup.name, e);
                    }
                    self.events.push(GameEvent::PowerupRemoved(index));
                }
            }
        }

        // (3) spent and over-travelled bullets
        let max_travel = self.config.max_bullet_travel;
        let mut bi = 0;
        self.bullets.retain(|bullet| {
            let keep = !spent.contains(&bi) && bullet.distance_travelled() <= max_travel;
            bi += 1;
            keep
        });

        for credit in credits {
            if let Some(shooter) = self.player_mut(credit.owner) {
                shooter.record.shots_hit += 1;
                shooter.record.total_damage += credit.damage;
                if credit.heal > 0.0 {
                    shooter.give_lifesteal(credit.heal);
                }
                if credit.killed {
                    shooter.record.kills += 1;
                }
            }
        }
    }

    fn maybe_spawn_stage_two(&mut self) {
        if self.stage_two_spawned || self.safezone.width_fraction() >= STAGE_TWO_FRACTION {
            return;
        }
        self.stage_two_spawned = true;

        let first_index = self.powerups.next_index();
        let bounds = self.safezone.bounds();
        match self.powerups.spawn_stage(
            &self.tables,
            self.seeds.stage_two,
            self.config.num_powerups,
            bounds,
            first_index,
        ) {
            Ok(spawned) => {
                info!("Second powerup wave: {} powerups from index {}", spawned.len(), first_index);
                self.events.push(GameEvent::PowerupStage(PowerupSet {
                    seed: self.seeds.stage_two,
                    stage: 2,
                    first_index: Some(first_index),
                    bounds: Some(bounds),
                }));
            }
            Err(e) => warn!("Second powerup wave failed: {}", e),
        }
    }

    /// End-of-tick removal so the roster is never mutated mid-iteration
    fn remove_eliminated(&mut self) {
        if !self.players.iter().any(|s| s.dead) {
            return;
        }

        let (dead, alive): (Vec<Shape>, Vec<Shape>) =
            std::mem::take(&mut self.players).into_iter().partition(|s| s.dead);
        self.players = alive;

        for shape in dead {
            info!("Combatant {} ({}) eliminated", shape.index, shape.player_name);

            let loot = self.powerups.spawn_loot(
                &mut self.rng,
                &self.tables,
                shape.x,
                shape.y,
                &shape.collected_powerups,
                self.config.map_size,
            );
            self.events
                .extend(loot.into_iter().map(GameEvent::PowerupAdded));
            self.events.push(GameEvent::PlayerRemoved(shape.index));

            self.brains.remove(&shape.index);
            self.dead_players.push(shape);
        }
    }

    fn check_end(&mut self) {
        if self.outcome.is_some() || self.players.len() > 1 {
            return;
        }

        let outcome = match self.players.first() {
            Some(survivor) => MatchOutcome::Winner(WinnerStats::of(survivor)),
            None => MatchOutcome::Tie,
        };
        info!("Match over after {} ticks: {:?}", self.tick, outcome);
        self.outcome = Some(outcome);
    }
}
