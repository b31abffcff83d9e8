use crate::game::ClientGameState;
use crate::input::InputManager;
use log::{debug, info, warn};
use shared::input::{InputSource, InputView};
use shared::protocol::{
    Answer, MatchOutcome, Message, PosUpdate, StartingInfo, STARTING_INFO_QUESTION,
};
use shared::{Connection, GameTables, MatchConfig, TransportError, MAX_DT};
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

const START_POLL: Duration = Duration::from_millis(20);

/// What a peer brings to the lobby
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub config: MatchConfig,
    pub tables: GameTables,
    pub shape_name: String,
    pub player_name: String,
}

pub struct Client {
    connection: Connection,
    game_state: ClientGameState,
    input_manager: InputManager,
    shape_name: String,
    player_name: String,
    tick_duration: Duration,
}

impl Client {
    /// Connects to a host, retrying a few times before giving up
    pub async fn join(
        addr: &str,
        options: ClientOptions,
        input: Box<dyn InputSource>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Joining {}...", addr);
        let connection = Connection::connect(addr).await?;
        Ok(Self::new(connection, options, input))
    }

    pub fn new(connection: Connection, options: ClientOptions, input: Box<dyn InputSource>) -> Self {
        let tick_rate = options.config.tick_rate.max(1);
        Self {
            connection,
            game_state: ClientGameState::new(options.config, options.tables),
            input_manager: InputManager::new(input),
            shape_name: options.shape_name,
            player_name: options.player_name,
            tick_duration: Duration::from_secs_f64(1.0 / tick_rate as f64),
        }
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn input_manager(&self) -> &InputManager {
        &self.input_manager
    }

    fn send_starting_info(&self) {
        self.connection.send_answer(Answer {
            send_starting_info: Some(StartingInfo {
                shape_name: self.shape_name.clone(),
                player_name: self.player_name.clone(),
            }),
            ready: Some(true),
            name: Some(self.player_name.clone()),
            ..Default::default()
        });
    }

    fn handle_messages(&mut self) {
        for message in self.connection.drain() {
            match message {
                Message::Question(question) if question == STARTING_INFO_QUESTION => {
                    info!("Host asked for starting info, sending {} as {}", self.player_name, self.shape_name);
                    self.send_starting_info();
                }
                Message::Question(question) => debug!("Unhandled question '{}'", question),
                Message::Answer(answer) => self.game_state.apply_answer(answer),
            }
        }
    }

    /// Answers the lobby and waits until the host deals the match
    pub async fn wait_for_start(&mut self) -> Result<(), TransportError> {
        while !self.game_state.has_started() {
            if !self.connection.is_alive() {
                return Err(TransportError::Closed);
            }
            tokio::time::sleep(START_POLL).await;
            self.handle_messages();
        }

        info!(
            "Match dealt: {} combatants, playing as {:?}",
            self.game_state.players.len(),
            self.game_state.local_index
        );
        Ok(())
    }

    fn apply_local_input(&mut self, dt: f32) {
        let zone = self
            .game_state
            .safezone
            .as_ref()
            .map(|zone| zone.bounds())
            .unwrap_or((0.0, 0.0, self.game_state.config.map_size, self.game_state.config.map_size));

        let view = match self.game_state.local_player() {
            Some(me) if !self.game_state.is_spectating() => InputView {
                x: me.x,
                y: me.y,
                alive: true,
                zone,
                now: self.game_state.time,
            },
            _ => InputView {
                x: 0.0,
                y: 0.0,
                alive: false,
                zone,
                now: self.game_state.time,
            },
        };

        let roster = self.game_state.alive_indices();
        let intent = self.input_manager.update(&view, &roster);
        if !view.alive {
            return;
        }

        let update = match intent.direction {
            Some(facing) => self.game_state.move_local(facing, dt),
            None => self.game_state.local_player().map(PosUpdate::of),
        };
        if let Some(update) = update {
            self.connection.send_answer(Answer {
                player_pos_update: Some(update),
                player_shoot: if intent.shoot { Some(update.index) } else { None },
                ..Default::default()
            });
        }
    }

    /// Advances the peer by one tick of `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        self.handle_messages();
        if self.game_state.outcome().is_some() {
            return;
        }
        self.apply_local_input(dt);
        self.game_state.step(dt);
    }

    /// Plays the match to its end
    ///
    /// Returns the host's verdict, or an error once the host connection dies.
    pub async fn run(&mut self) -> Result<MatchOutcome, TransportError> {
        self.wait_for_start().await?;

        let mut ticker = interval(self.tick_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;
        let mut last_tick = Instant::now();

        loop {
            ticker.tick().await;

            let now = Instant::now();
            let mut dt = now.duration_since(last_tick).as_secs_f32();
            last_tick = now;

            if dt > MAX_DT {
                warn!("Large delta time detected ({:.3}s), capping to {:.3}s", dt, MAX_DT);
                dt = MAX_DT;
            }

            self.tick(dt);

            if let Some(outcome) = self.game_state.outcome() {
                let outcome = outcome.clone();
                self.connection.close();
                return Ok(outcome);
            }

            if !self.connection.is_alive() {
                warn!("Lost connection to host {}", self.connection.peer());
                return Err(TransportError::Closed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::input::Intent;
    use shared::protocol::{PowerupSet, RosterEntry};
    use shared::transport::Side;
    use shared::Facing;

    struct Walk(Facing);

    impl InputSource for Walk {
        fn poll(&mut self, _view: &InputView) -> Intent {
            Intent {
                direction: Some(self.0),
                shoot: true,
                cycle_spectate: false,
            }
        }
    }

    fn options() -> ClientOptions {
        ClientOptions {
            config: MatchConfig {
                num_powerups: 5,
                map_size: 2_000.0,
                ..MatchConfig::default()
            },
            tables: GameTables::embedded().unwrap(),
            shape_name: "Triangle".to_string(),
            player_name: "p1".to_string(),
        }
    }

    fn pipe() -> (Client, Connection) {
        let (a, b) = tokio::io::duplex(256 * 1024);
        let local = Connection::spawn(a, "host".to_string(), Side::Connecting);
        let host = Connection::spawn(b, "peer".to_string(), Side::Accepted);
        (Client::new(local, options(), Box::new(Walk(Facing::Right))), host)
    }

    fn start_answer() -> Answer {
        let entry = |index: usize, x: f32| RosterEntry {
            x,
            y: 1_000.0,
            index,
            shape_name: "Triangle".to_string(),
            is_player: true,
            player_name: format!("p{}", index),
        };
        Answer {
            safezone_set: Some(1),
            powerup_set: Some(PowerupSet {
                seed: 2,
                stage: 1,
                first_index: Some(0),
                bounds: None,
            }),
            player_set: Some(vec![entry(0, 500.0), entry(1, 1_000.0)]),
            player_index: Some(1),
            ..Default::default()
        }
    }

    async fn recv_until<F: Fn(&Answer) -> bool>(conn: &mut Connection, want: F) -> Option<Answer> {
        for _ in 0..200 {
            for message in conn.drain() {
                if let Message::Answer(answer) = message {
                    if want(&answer) {
                        return Some(answer);
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        None
    }

    #[tokio::test]
    async fn test_starting_info_answered_and_start_awaited() {
        let (mut client, mut host) = pipe();
        host.send(Message::question(STARTING_INFO_QUESTION));
        host.send_answer(start_answer());

        client.wait_for_start().await.unwrap();
        assert_eq!(client.game_state().local_index, Some(1));
        assert_eq!(client.game_state().powerups.len(), 5);

        let info = recv_until(&mut host, |a| a.send_starting_info.is_some()).await.unwrap();
        assert_eq!(info.ready, Some(true));
        assert_eq!(info.name.as_deref(), Some("p1"));
        assert_eq!(info.send_starting_info.unwrap().shape_name, "Triangle");
    }

    #[tokio::test]
    async fn test_tick_moves_locally_and_reports() {
        let (mut client, mut host) = pipe();
        host.send_answer(start_answer());
        client.wait_for_start().await.unwrap();

        client.tick(0.02);
        assert!(client.game_state().players[&1].x > 1_000.0);

        let sent = recv_until(&mut host, |a| a.player_pos_update.is_some()).await.unwrap();
        let update = sent.player_pos_update.unwrap();
        assert_eq!(update.index, 1);
        assert!(update.x > 1_000.0);
        assert_eq!(sent.player_shoot, Some(1));
    }

    #[tokio::test]
    async fn test_spectator_sends_nothing() {
        let (mut client, mut host) = pipe();
        host.send_answer(start_answer());
        client.wait_for_start().await.unwrap();

        host.send_answer(Answer {
            player_remove: Some(1),
            ..Default::default()
        });
        for _ in 0..100 {
            client.tick(0.01);
            if client.game_state().is_spectating() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(client.game_state().is_spectating());
        assert_eq!(client.input_manager().watching(), Some(0));

        tokio::time::sleep(Duration::from_millis(50)).await;
        host.drain();
        client.tick(0.01);
        client.tick(0.01);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(host
            .drain()
            .iter()
            .all(|m| !matches!(m, Message::Answer(a) if a.player_pos_update.is_some())));
    }

    #[tokio::test]
    async fn test_run_returns_host_verdict() {
        let (mut client, host) = pipe();
        host.send_answer(start_answer());
        host.send_answer(MatchOutcome::Tie.to_answer());

        let outcome = client.run().await.unwrap();
        assert_eq!(outcome, MatchOutcome::Tie);
    }

    #[tokio::test]
    async fn test_run_errors_when_host_vanishes() {
        let (mut client, host) = pipe();
        host.send_answer(start_answer());
        client.wait_for_start().await.unwrap();

        host.close();
        assert!(client.run().await.is_err());
    }

    #[tokio::test]
    async fn test_wait_for_start_errors_on_dead_host() {
        let (mut client, host) = pipe();
        host.close();
        assert!(client.wait_for_start().await.is_err());
    }
}
