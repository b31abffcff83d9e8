//! Peer-side mirror of the host's match
//!
//! The host is the only authority. This state applies whatever the host
//! sends, keyed by combatant index, and only simulates what is needed to
//! keep the view smooth between updates: the safezone walls, display-only
//! bullet motion and the locally controlled combatant's movement.

use log::{debug, info, warn};
use shared::protocol::{
    Answer, MatchOutcome, Message, PlayerSnapshot, PosUpdate, PowerupSet, RosterEntry,
};
use shared::{
    AnimRegistry, BulletSnapshot, Facing, GameTables, MatchConfig, Powerup, PowerupField,
    Safezone, Shape, SILENCE_WINDOW,
};
use std::collections::HashMap;

/// Where a combatant is parked once the host stops talking about it
pub const OFF_MAP: (f32, f32) = (-10_000.0, -10_000.0);

pub struct ClientGameState {
    pub config: MatchConfig,
    pub tables: GameTables,
    pub players: HashMap<usize, Shape>,
    pub bullets: Vec<BulletSnapshot>,
    pub powerups: PowerupField,
    pub anims: AnimRegistry,
    pub safezone: Option<Safezone>,
    pub local_index: Option<usize>,
    pub time: f64,
    spectating: bool,
    last_heard: HashMap<usize, f64>,
    stage_one_received: bool,
    stage_two_seed: Option<u64>,
    outcome: Option<MatchOutcome>,
}

impl ClientGameState {
    pub fn new(config: MatchConfig, tables: GameTables) -> Self {
        Self {
            config,
            tables,
            players: HashMap::new(),
            bullets: Vec::new(),
            powerups: PowerupField::new(),
            anims: AnimRegistry::new(),
            safezone: None,
            local_index: None,
            time: 0.0,
            spectating: false,
            last_heard: HashMap::new(),
            stage_one_received: false,
            stage_two_seed: None,
            outcome: None,
        }
    }

    /// True once the roster, our index, the first powerup wave and the
    /// safezone seed have arrived
    pub fn has_started(&self) -> bool {
        self.local_index.is_some()
            && !self.players.is_empty()
            && self.stage_one_received
            && self.safezone.is_some()
    }

    pub fn is_spectating(&self) -> bool {
        self.spectating
    }

    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.outcome.as_ref()
    }

    pub fn local_player(&self) -> Option<&Shape> {
        self.local_index.and_then(|index| self.players.get(&index))
    }

    /// Sorted indices of every combatant still on the roster
    pub fn alive_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.players.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    pub fn apply_message(&mut self, message: Message) {
        match message {
            Message::Answer(answer) => self.apply_answer(answer),
            Message::Question(question) => debug!("Ignoring question '{}' in game state", question),
        }
    }

    /// Applies one answer from the host
    ///
    /// Fields are applied in dependency order so that a single start answer
    /// carrying seeds, roster and index lands in a consistent state.
    pub fn apply_answer(&mut self, answer: Answer) {
        let outcome = MatchOutcome::from_answer(&answer);

        if let Some(seed) = answer.safezone_set {
            self.set_safezone(seed);
        }
        if let Some(entries) = answer.player_set {
            self.set_roster(&entries);
        }
        if let Some(index) = answer.player_index {
            info!("Controlling combatant {}", index);
            self.local_index = Some(index);
            self.spectating = !self.players.is_empty() && !self.players.contains_key(&index);
        }
        if let Some(set) = answer.powerup_set {
            self.apply_powerup_set(set);
        }
        if let Some(snapshots) = &answer.player_update {
            for snapshot in snapshots {
                self.apply_snapshot(snapshot);
            }
        }
        if let Some(index) = answer.player_remove {
            self.remove_player(index);
        }
        if let Some(bullets) = answer.set_bullets {
            self.bullets = bullets;
        }
        if let Some(desc) = &answer.powerup_add {
            match Powerup::from_descriptor(desc, &self.tables) {
                Ok(powerup) => {
                    self.powerups.insert(powerup);
                }
                Err(e) => warn!("Dropping powerup {}: {}", desc.index, e),
            }
        }
        if let Some(index) = answer.powerup_remove {
            self.powerups.remove(index);
        }
        if let Some(outcome) = outcome {
            if let MatchOutcome::Winner(stats) = &outcome {
                if let Some(shape) = self.players.get_mut(&stats.index) {
                    shape.record = stats.record.clone();
                }
            }
            info!("Match over: {:?}", outcome);
            self.outcome = Some(outcome);
        }
    }

    fn set_safezone(&mut self, seed: u64) {
        self.anims = AnimRegistry::new();
        self.safezone = Some(Safezone::from_seed(
            seed,
            self.config.map_size,
            self.config.num_phases,
            &mut self.anims,
        ));
    }

    fn set_roster(&mut self, entries: &[RosterEntry]) {
        self.players.clear();
        self.last_heard.clear();

        for entry in entries {
            let info = match self.tables.shape(&entry.shape_name) {
                Ok(info) => info,
                Err(e) => {
                    warn!("Skipping combatant {}: {}", entry.index, e);
                    continue;
                }
            };
            let shape = Shape::new(
                entry.index,
                &entry.shape_name,
                info,
                entry.x,
                entry.y,
                entry.is_player,
                &entry.player_name,
            );
            self.players.insert(entry.index, shape);
            self.last_heard.insert(entry.index, self.time);
        }

        info!("Roster of {} combatants received", self.players.len());
    }

    fn apply_powerup_set(&mut self, set: PowerupSet) {
        let (first_index, bounds) = match set.stage {
            1 => (
                set.first_index.unwrap_or(0),
                set.bounds
                    .unwrap_or((0.0, 0.0, self.config.map_size, self.config.map_size)),
            ),
            _ => match (set.first_index, set.bounds) {
                (Some(first_index), Some(bounds)) => (first_index, bounds),
                _ => {
                    // Seed only; the host announces index and area when it spawns
                    self.stage_two_seed = Some(set.seed);
                    return;
                }
            },
        };

        if set.stage == 1 {
            self.stage_one_received = true;
        } else if let Some(seed) = self.stage_two_seed.filter(|seed| *seed != set.seed) {
            warn!("Second wave seed changed from {} to {}", seed, set.seed);
        }

        match self.powerups.spawn_stage(
            &self.tables,
            set.seed,
            self.config.num_powerups,
            bounds,
            first_index,
        ) {
            Ok(spawned) => info!(
                "Powerup stage {}: {} powerups from index {}",
                set.stage,
                spawned.len(),
                first_index
            ),
            Err(e) => warn!("Powerup stage {} failed: {}", set.stage, e),
        }
    }

    /// Overwrites host-owned fields; position and facing of our own
    /// combatant stay local unless we are spectating
    fn apply_snapshot(&mut self, snapshot: &PlayerSnapshot) {
        let overwrite_pos = self.spectating || self.local_index != Some(snapshot.index);
        let Some(shape) = self.players.get_mut(&snapshot.index) else {
            return;
        };

        shape.hp = snapshot.hp;
        shape.shield = snapshot.shield;
        shape.stats = snapshot.stats.clone();
        if overwrite_pos {
            shape.x = snapshot.x;
            shape.y = snapshot.y;
            shape.rotation = snapshot.rotation;
        }
        self.last_heard.insert(snapshot.index, self.time);
    }

    fn remove_player(&mut self, index: usize) {
        if self.players.remove(&index).is_none() {
            return;
        }
        self.last_heard.remove(&index);

        if self.local_index == Some(index) {
            info!("Our combatant was eliminated, spectating");
            self.spectating = true;
        }
    }

    /// Moves our own combatant and returns the update to send the host
    pub fn move_local(&mut self, facing: Facing, dt: f32) -> Option<PosUpdate> {
        if self.spectating {
            return None;
        }
        let shape = self.local_index.and_then(|index| self.players.get_mut(&index))?;
        shape.move_towards(facing, dt);
        Some(PosUpdate::of(shape))
    }

    /// Advances the locally simulated parts of the view
    pub fn step(&mut self, dt: f32) {
        self.time += dt as f64;

        self.anims.update(dt);
        if let Some(safezone) = &mut self.safezone {
            safezone.update(&mut self.anims);
        }

        for bullet in &mut self.bullets {
            bullet.advance(dt);
        }

        self.park_silent();
    }

    /// Parks combatants the host has not mentioned within the silence window
    fn park_silent(&mut self) {
        let local = if self.spectating { None } else { self.local_index };

        for (index, shape) in self.players.iter_mut() {
            if Some(*index) == local {
                continue;
            }
            let heard = self.last_heard.get(index).copied().unwrap_or(self.time);
            if self.time - heard > SILENCE_WINDOW && (shape.x, shape.y) != OFF_MAP {
                debug!("Combatant {} went silent", index);
                shape.x = OFF_MAP.0;
                shape.y = OFF_MAP.1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::protocol::{PlayerSnapshot, WinnerStats};
    use shared::{PowerupDescriptor, Rarity, StatBlock};

    fn config() -> MatchConfig {
        MatchConfig {
            num_powerups: 20,
            map_size: 2_000.0,
            ..MatchConfig::default()
        }
    }

    fn entry(index: usize, x: f32, y: f32) -> RosterEntry {
        RosterEntry {
            x,
            y,
            index,
            shape_name: "Square".to_string(),
            is_player: index < 2,
            player_name: format!("p{}", index),
        }
    }

    fn started() -> ClientGameState {
        let mut state = ClientGameState::new(config(), GameTables::embedded().unwrap());
        state.apply_answer(Answer {
            safezone_set: Some(3),
            powerup_set: Some(PowerupSet {
                seed: 9,
                stage: 1,
                first_index: Some(0),
                bounds: None,
            }),
            player_set: Some(vec![entry(0, 100.0, 100.0), entry(1, 500.0, 500.0), entry(2, 900.0, 900.0)]),
            player_index: Some(1),
            ..Default::default()
        });
        state
    }

    fn snapshot(state: &ClientGameState, index: usize, x: f32, y: f32, hp: f32) -> PlayerSnapshot {
        let mut snap = PlayerSnapshot::of(&state.players[&index]);
        snap.x = x;
        snap.y = y;
        snap.rotation = Facing::Left;
        snap.hp = hp;
        snap
    }

    #[test]
    fn test_start_answer_builds_world() {
        let state = started();
        assert!(state.has_started());
        assert_eq!(state.players.len(), 3);
        assert_eq!(state.local_index, Some(1));
        assert_eq!(state.powerups.len(), 20);
        assert_eq!(state.powerups.next_index(), 20);
        assert!(!state.is_spectating());
    }

    #[test]
    fn test_not_started_until_first_wave_arrives() {
        let mut state = ClientGameState::new(config(), GameTables::embedded().unwrap());
        state.apply_answer(Answer {
            safezone_set: Some(3),
            player_set: Some(vec![entry(0, 100.0, 100.0), entry(1, 500.0, 500.0)]),
            player_index: Some(1),
            ..Default::default()
        });
        assert!(!state.has_started());

        state.apply_answer(Answer {
            powerup_set: Some(PowerupSet {
                seed: 9,
                stage: 1,
                first_index: Some(0),
                bounds: None,
            }),
            ..Default::default()
        });
        assert!(state.has_started());
    }

    #[test]
    fn test_stage_one_matches_host_spawn() {
        let state = started();
        let tables = GameTables::embedded().unwrap();
        let mut host = PowerupField::new();
        host.spawn_stage(&tables, 9, 20, (0.0, 0.0, 2_000.0, 2_000.0), 0).unwrap();

        for powerup in host.iter() {
            let mirrored = state.powerups.get(powerup.index).unwrap();
            assert_eq!(mirrored.x, powerup.x);
            assert_eq!(mirrored.name, powerup.name);
        }
    }

    #[test]
    fn test_update_overwrites_remote_but_not_local_position() {
        let mut state = started();
        let remote = snapshot(&state, 2, 950.0, 950.0, 40.0);
        let local = snapshot(&state, 1, 1_500.0, 1_500.0, 60.0);
        state.apply_answer(Answer {
            player_update: Some(vec![remote, local]),
            ..Default::default()
        });

        let other = &state.players[&2];
        assert_eq!((other.x, other.y), (950.0, 950.0));
        assert_eq!(other.rotation, Facing::Left);
        assert_eq!(other.hp, 40.0);

        let me = &state.players[&1];
        assert_eq!((me.x, me.y), (500.0, 500.0));
        assert_eq!(me.rotation, Facing::Up);
        assert_eq!(me.hp, 60.0);
    }

    #[test]
    fn test_stats_follow_host() {
        let mut state = started();
        let mut snap = snapshot(&state, 0, 100.0, 100.0, 100.0);
        snap.stats = StatBlock {
            max_hp: 250.0,
            ..snap.stats.clone()
        };
        state.apply_answer(Answer {
            player_update: Some(vec![snap]),
            ..Default::default()
        });
        assert_eq!(state.players[&0].stats.max_hp, 250.0);
    }

    #[test]
    fn test_update_for_unknown_index_is_noop() {
        let mut state = started();
        let mut snap = snapshot(&state, 0, 1.0, 1.0, 1.0);
        snap.index = 42;
        state.apply_answer(Answer {
            player_update: Some(vec![snap]),
            ..Default::default()
        });
        assert_eq!(state.players.len(), 3);
        assert!(!state.players.contains_key(&42));
    }

    #[test]
    fn test_local_removal_enters_spectating() {
        let mut state = started();
        state.apply_answer(Answer {
            player_remove: Some(1),
            ..Default::default()
        });
        assert!(state.is_spectating());
        assert_eq!(state.alive_indices(), vec![0, 2]);
        assert!(state.move_local(Facing::Right, 0.1).is_none());
    }

    #[test]
    fn test_move_local_reports_new_position() {
        let mut state = started();
        let update = state.move_local(Facing::Right, 0.1).unwrap();
        assert_eq!(update.index, 1);
        assert!(update.x > 500.0);
        assert_approx_eq!(update.y, 500.0);
        assert_eq!(update.rotation, Facing::Right);
        assert_eq!(state.players[&1].x, update.x);
    }

    #[test]
    fn test_stage_two_waits_for_announcement() {
        let mut state = started();
        state.apply_answer(Answer {
            powerup_set: Some(PowerupSet {
                seed: 11,
                stage: 2,
                first_index: None,
                bounds: None,
            }),
            ..Default::default()
        });
        assert_eq!(state.powerups.len(), 20);

        state.apply_answer(Answer {
            powerup_set: Some(PowerupSet {
                seed: 11,
                stage: 2,
                first_index: Some(25),
                bounds: Some((500.0, 500.0, 1_500.0, 1_500.0)),
            }),
            ..Default::default()
        });
        assert_eq!(state.powerups.len(), 40);
        assert!(state.powerups.get(25).is_some());
        assert!(state.powerups.get(44).is_some());
        for powerup in state.powerups.iter().filter(|p| p.index >= 25) {
            assert!(powerup.x >= 500.0 && powerup.x <= 1_500.0);
        }
    }

    #[test]
    fn test_powerup_add_and_remove_by_index() {
        let mut state = started();
        state.apply_answer(Answer {
            powerup_add: Some(PowerupDescriptor {
                x: 10.0,
                y: 10.0,
                rarity: Rarity::Common,
                index: 30,
                name: "Vitality".to_string(),
            }),
            powerup_remove: Some(3),
            ..Default::default()
        });
        assert!(state.powerups.get(30).is_some());
        assert!(state.powerups.get(3).is_none());
        assert_eq!(state.powerups.next_index(), 31);
    }

    #[test]
    fn test_powerup_add_at_index_limit_is_dropped() {
        let mut state = started();
        state.apply_answer(Answer {
            powerup_add: Some(PowerupDescriptor {
                x: 10.0,
                y: 10.0,
                rarity: Rarity::Common,
                index: u32::MAX,
                name: "Vitality".to_string(),
            }),
            ..Default::default()
        });
        assert!(state.powerups.get(u32::MAX).is_none());
        assert_eq!(state.powerups.len(), 20);
        assert_eq!(state.powerups.next_index(), 20);
    }

    #[test]
    fn test_stage_two_near_index_limit_spawns_what_fits() {
        let mut state = started();
        state.apply_answer(Answer {
            powerup_set: Some(PowerupSet {
                seed: 11,
                stage: 2,
                first_index: Some(u32::MAX - 5),
                bounds: Some((500.0, 500.0, 1_500.0, 1_500.0)),
            }),
            ..Default::default()
        });
        assert_eq!(state.powerups.len(), 25);
        assert!(state.powerups.get(u32::MAX - 1).is_some());
        assert!(state.powerups.get(u32::MAX).is_none());
    }

    #[test]
    fn test_bullets_replaced_and_advanced() {
        let mut state = started();
        let bullet = BulletSnapshot {
            owner: 0,
            x: 100.0,
            y: 100.0,
            start_x: 100.0,
            start_y: 100.0,
            vx: 0.0,
            vy: -5.0,
            damage: 10.0,
        };
        state.apply_answer(Answer {
            set_bullets: Some(vec![bullet.clone(), bullet]),
            ..Default::default()
        });
        assert_eq!(state.bullets.len(), 2);

        state.step(0.1);
        assert!(state.bullets[0].y < 100.0);

        state.apply_answer(Answer {
            set_bullets: Some(Vec::new()),
            ..Default::default()
        });
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_silent_combatants_are_parked() {
        let mut state = started();
        for _ in 0..31 {
            state.step(0.1);
        }

        assert_eq!((state.players[&0].x, state.players[&0].y), OFF_MAP);
        assert_eq!((state.players[&2].x, state.players[&2].y), OFF_MAP);
        assert_eq!(state.players[&1].x, 500.0);
    }

    #[test]
    fn test_heard_combatants_stay_put() {
        let mut state = started();
        for _ in 0..40 {
            let snap = snapshot(&state, 2, 950.0, 950.0, 100.0);
            state.apply_answer(Answer {
                player_update: Some(vec![snap]),
                ..Default::default()
            });
            state.step(0.1);
        }
        assert_eq!(state.players[&2].x, 950.0);
    }

    #[test]
    fn test_winner_recorded() {
        let mut state = started();
        let mut stats = WinnerStats::of(&state.players[&2]);
        stats.record.kills = 2;
        state.apply_answer(Answer {
            winner: Some(stats.clone()),
            ..Default::default()
        });

        assert_eq!(state.outcome(), Some(&MatchOutcome::Winner(stats)));
        assert_eq!(state.players[&2].record.kills, 2);
    }

    #[test]
    fn test_tie_recorded() {
        let mut state = started();
        state.apply_message(Message::Answer(MatchOutcome::Tie.to_answer()));
        assert_eq!(state.outcome(), Some(&MatchOutcome::Tie));
    }
}
