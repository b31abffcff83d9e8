//! Host and solo run loop
//!
//! The loop owns the [`GameState`] outright. Each tick it drains every peer's
//! inbound queue, applies the local avatar's intent, steps the simulation and
//! fans the results back out. Peers never touch the simulation directly.

use crate::client_manager::ClientManager;
use crate::game::{GameState, MatchSeeds};
use crate::lobby::{self, Lobby, Seat};
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shared::input::{InputSource, InputView};
use shared::protocol::{Answer, MatchOutcome, Message};
use shared::{GameTables, MatchConfig, MAX_DT};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// Everything needed to set up a match on the hosting process
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub config: MatchConfig,
    pub tables: GameTables,
    pub shape_name: String,
    pub player_name: String,
    /// Peers that must be connected and ready before the match starts
    pub min_peers: usize,
    /// Fixes every random draw of the match when set
    pub seed: Option<u64>,
}

impl HostOptions {
    fn rng(&self) -> ChaCha8Rng {
        match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        }
    }

    fn host_seat(&self) -> Seat {
        Seat {
            shape_name: self.shape_name.clone(),
            player_name: self.player_name.clone(),
            is_player: true,
        }
    }
}

/// The authoritative host, or a solo match when it has no peers
pub struct Server {
    game: GameState,
    peers: ClientManager,
    input: Box<dyn InputSource>,
    local_index: usize,
    tick_duration: Duration,
    late_joiners: Option<JoinHandle<()>>,
}

impl Server {
    /// Fully local match: the host avatar plus bots
    pub fn solo(
        options: HostOptions,
        input: Box<dyn InputSource>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let mut rng = options.rng();
        let seeds = MatchSeeds::random(&mut rng);
        let roster = lobby::deal_roster(&options.config, &options.tables, &mut rng, &[options.host_seat()])?;
        let game = GameState::new(options.config.clone(), options.tables.clone(), seeds, roster)?;

        Ok(Self::new(game, ClientManager::new(0), input))
    }

    /// Binds, runs the lobby until enough peers are ready, then deals the match
    pub async fn host(
        addr: &str,
        options: HostOptions,
        input: Box<dyn InputSource>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Hosting on {}", listener.local_addr()?);
        Self::host_on(listener, options, input).await
    }

    pub async fn host_on(
        listener: TcpListener,
        options: HostOptions,
        input: Box<dyn InputSource>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let max_peers = options.config.num_players.saturating_sub(1);
        let mut lobby = Lobby::new(
            options.tables.clone(),
            options.min_peers,
            max_peers,
            options.config.lobby_countdown_secs,
        );
        lobby::gather(&listener, &mut lobby).await;
        lobby.assign_indices();

        let mut rng = options.rng();
        let seeds = MatchSeeds::random(&mut rng);
        let seats = lobby.seats(options.host_seat());
        let roster = lobby::deal_roster(&options.config, &options.tables, &mut rng, &seats)?;

        let peers = lobby.into_peers();
        lobby::announce_start(&peers, &seeds, &roster);
        let game = GameState::new(options.config.clone(), options.tables.clone(), seeds, roster)?;

        let mut server = Self::new(game, peers, input);
        server.late_joiners = Some(tokio::spawn(refuse_late_joiners(listener)));
        Ok(server)
    }

    pub fn new(game: GameState, peers: ClientManager, input: Box<dyn InputSource>) -> Self {
        let tick_rate = game.config.tick_rate.max(1);
        Self {
            game,
            peers,
            input,
            local_index: 0,
            tick_duration: Duration::from_secs_f64(1.0 / tick_rate as f64),
            late_joiners: None,
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Applies what peers sent since the last tick
    ///
    /// A peer may only move or fire its own combatant.
    fn handle_peer_messages(&mut self) {
        for (id, message) in self.peers.drain_all() {
            let Message::Answer(answer) = message else {
                continue;
            };
            let Some(owned) = self.peers.get(id).and_then(|p| p.index) else {
                continue;
            };

            if let Some(update) = answer.player_pos_update {
                if update.index == owned {
                    self.game.apply_pos_update(&update);
                } else {
                    debug!("Peer {} tried to move combatant {}", id, update.index);
                }
            }
            if let Some(index) = answer.player_shoot {
                if index == owned {
                    self.game.request_shoot(index);
                }
            }
        }

        for peer in self.peers.reap_dead() {
            if let Some(index) = peer.index {
                self.game.release_to_bot(index);
            }
        }
    }

    fn apply_local_input(&mut self, dt: f32) {
        let view = match self.game.player(self.local_index) {
            Some(me) => InputView {
                x: me.x,
                y: me.y,
                alive: true,
                zone: self.game.safezone.bounds(),
                now: self.game.time,
            },
            None => InputView {
                x: 0.0,
                y: 0.0,
                alive: false,
                zone: self.game.safezone.bounds(),
                now: self.game.time,
            },
        };

        let intent = self.input.poll(&view);
        if !view.alive {
            return;
        }

        if let Some(facing) = intent.direction {
            if let Some(me) = self.game.player_mut(self.local_index) {
                me.move_towards(facing, dt);
            }
        }
        if intent.shoot {
            self.game.request_shoot(self.local_index);
        }
    }

    /// Relays queued events, then sends each peer the roster and its nearby bullets
    fn broadcast_state(&mut self) {
        for event in self.game.take_events() {
            self.peers.broadcast(&Message::Answer(event.to_answer()));
        }

        if self.peers.is_empty() {
            return;
        }

        let updates = Message::Answer(Answer {
            player_update: Some(self.game.player_updates()),
            ..Default::default()
        });
        self.peers.broadcast(&updates);

        let radius = self.game.config.bullet_sync_radius;
        for peer in self.peers.iter() {
            let centre = peer
                .index
                .and_then(|index| self.game.player(index))
                .map(|shape| (shape.x, shape.y));
            peer.connection.send_answer(Answer {
                set_bullets: Some(self.game.bullets_near(centre, radius)),
                ..Default::default()
            });
        }
    }

    /// Advances the match by one tick of `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        self.handle_peer_messages();
        self.apply_local_input(dt);
        self.game.step(dt);
        self.broadcast_state();
    }

    /// Runs until the match ends and returns its outcome
    pub async fn run(&mut self) -> MatchOutcome {
        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;
        let mut last_tick = Instant::now();

        info!(
            "Match started with {} combatants and {} peer(s)",
            self.game.players.len(),
            self.peers.len()
        );

        let outcome = loop {
            ticker.tick().await;

            let now = Instant::now();
            let mut dt = now.duration_since(last_tick).as_secs_f32();
            last_tick = now;

            if dt > MAX_DT {
                warn!("Large delta time detected ({:.3}s), capping to {:.3}s", dt, MAX_DT);
                dt = MAX_DT;
            }

            self.tick(dt);

            if self.game.tick % 600 == 0 {
                debug!(
                    "Tick {}: {} alive, {} bullets, {} powerups, {} peer(s)",
                    self.game.tick,
                    self.game.players.len(),
                    self.game.bullets.len(),
                    self.game.powerups.len(),
                    self.peers.len()
                );
            }

            if let Some(outcome) = self.game.outcome() {
                break outcome.clone();
            }
        };

        self.peers.broadcast(&Message::Answer(outcome.to_answer()));
        if let Some(handle) = self.late_joiners.take() {
            handle.abort();
        }
        outcome
    }
}

async fn refuse_late_joiners(listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("Match in progress, refusing {}", addr);
                drop(stream);
            }
            Err(e) => {
                warn!("Accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}
