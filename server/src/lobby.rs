//! Pre-match lobby and roster dealing
//!
//! Peers connect, report their archetype and name, and flag themselves
//! ready. Once enough peers are ready and nothing changed for the countdown,
//! the host deals the roster and tells every peer how to rebuild the world.

use crate::client_manager::ClientManager;
use crate::game::MatchSeeds;
use log::{info, warn};
use rand::Rng;
use shared::protocol::{Answer, Message, PowerupSet, RosterEntry, StartingInfo, STARTING_INFO_QUESTION};
use shared::{ConfigError, Connection, GameTables, MatchConfig, Shape, SPAWN_INSET};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

const LOBBY_POLL: Duration = Duration::from_millis(50);

/// Who sits at a roster slot before positions are dealt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub shape_name: String,
    pub player_name: String,
    pub is_player: bool,
}

fn spawn_coord<R: Rng>(rng: &mut R, map_size: f32) -> f32 {
    let low = SPAWN_INSET;
    let high = map_size - SPAWN_INSET;
    if high > low {
        rng.gen_range(low..=high)
    } else {
        map_size / 2.0
    }
}

/// Deals indices and spawn positions: seats first, then bots up to the
/// configured combatant count
pub fn deal_roster<R: Rng>(
    config: &MatchConfig,
    tables: &GameTables,
    rng: &mut R,
    seats: &[Seat],
) -> Result<Vec<Shape>, ConfigError> {
    let names = tables.shape_names();
    if names.is_empty() {
        return Err(ConfigError::Empty("shapes"));
    }

    let total = config.num_players.max(seats.len());
    let mut roster = Vec::with_capacity(total);

    for index in 0..total {
        let seat = match seats.get(index) {
            Some(seat) => seat.clone(),
            None => Seat {
                shape_name: names[rng.gen_range(0..names.len())].to_string(),
                player_name: format!("Bot {}", index),
                is_player: false,
            },
        };

        let info = tables.shape(&seat.shape_name)?;
        let x = spawn_coord(rng, config.map_size);
        let y = spawn_coord(rng, config.map_size);
        roster.push(Shape::new(
            index,
            &seat.shape_name,
            info,
            x,
            y,
            seat.is_player,
            &seat.player_name,
        ));
    }

    Ok(roster)
}

/// Host-side lobby state
pub struct Lobby {
    peers: ClientManager,
    tables: GameTables,
    min_peers: usize,
    countdown: Duration,
    last_change: Instant,
}

impl Lobby {
    pub fn new(tables: GameTables, min_peers: usize, max_peers: usize, countdown_secs: f32) -> Self {
        Self {
            peers: ClientManager::new(max_peers),
            tables,
            min_peers,
            countdown: Duration::from_secs_f32(countdown_secs.max(0.0)),
            last_change: Instant::now(),
        }
    }

    pub fn peers(&self) -> &ClientManager {
        &self.peers
    }

    /// Takes a fresh connection and asks it for its starting info
    pub fn admit(&mut self, connection: Connection) {
        match self.peers.add_peer(connection) {
            Ok(id) => {
                self.peers
                    .send_to(id, Message::question(STARTING_INFO_QUESTION));
                self.last_change = Instant::now();
            }
            Err(connection) => {
                warn!("Lobby full, refusing {}", connection.peer());
                connection.close();
            }
        }
    }

    /// Applies lobby answers and drops dead peers
    pub fn poll(&mut self) {
        for (id, message) in self.peers.drain_all() {
            let Message::Answer(answer) = message else {
                continue;
            };
            let Some(peer) = self.peers.get_mut(id) else {
                continue;
            };

            let mut changed = false;
            if let Some(StartingInfo {
                shape_name,
                player_name,
            }) = answer.send_starting_info
            {
                let shape_name = if self.tables.shapes.contains_key(&shape_name) {
                    shape_name
                } else {
                    let fallback = self
                        .tables
                        .shape_names()
                        .first()
                        .map(|s| s.to_string())
                        .unwrap_or_default();
                    warn!(
                        "Peer {} picked unknown archetype '{}', using '{}'",
                        id, shape_name, fallback
                    );
                    fallback
                };
                peer.shape_name = Some(shape_name);
                peer.player_name = Some(player_name);
                changed = true;
            }
            if let Some(name) = answer.name {
                peer.player_name = Some(name);
                changed = true;
            }
            if let Some(ready) = answer.ready {
                peer.ready = ready;
                changed = true;
            }

            if changed {
                info!(
                    "Peer {} is {} as {:?} ({:?})",
                    id,
                    if peer.ready { "ready" } else { "waiting" },
                    peer.player_name,
                    peer.shape_name
                );
                self.last_change = Instant::now();
            }
        }

        if !self.peers.reap_dead().is_empty() {
            self.last_change = Instant::now();
        }
    }

    pub fn can_start(&self, now: Instant) -> bool {
        self.peers.len() >= self.min_peers
            && self.peers.all_ready()
            && now.duration_since(self.last_change) >= self.countdown
    }

    /// Host seat first, then peers in connection order
    pub fn seats(&self, host: Seat) -> Vec<Seat> {
        let mut seats = vec![host];
        for peer in self.peers.iter() {
            seats.push(Seat {
                shape_name: peer.shape_name.clone().unwrap_or_default(),
                player_name: peer.player_name.clone().unwrap_or_default(),
                is_player: true,
            });
        }
        seats
    }

    /// Records each peer's roster index: peers sit at 1..=P
    pub fn assign_indices(&mut self) {
        for (offset, peer) in self.peers.iter_mut().enumerate() {
            peer.index = Some(offset + 1);
        }
    }

    pub fn into_peers(self) -> ClientManager {
        self.peers
    }
}

/// Accepts and polls peers until the lobby is ready to start
pub async fn gather(listener: &TcpListener, lobby: &mut Lobby) {
    info!("Lobby open, waiting for {} peer(s)", lobby.min_peers);
    let mut ticker = tokio::time::interval(LOBBY_POLL);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!("Lobby accepted {}", addr);
                        lobby.admit(Connection::accepted(stream));
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                }
            }
            _ = ticker.tick() => {
                lobby.poll();
                if lobby.can_start(Instant::now()) {
                    info!("Lobby starting with {} peer(s)", lobby.peers.len());
                    return;
                }
            }
        }
    }
}

/// Tells every peer the world seeds, the roster and its own index
pub fn announce_start(peers: &ClientManager, seeds: &MatchSeeds, roster: &[Shape]) {
    let entries: Vec<RosterEntry> = roster.iter().map(RosterEntry::of).collect();

    for peer in peers.iter() {
        peer.connection.send_answer(Answer {
            safezone_set: Some(seeds.safezone),
            powerup_set: Some(PowerupSet {
                seed: seeds.stage_one,
                stage: 1,
                first_index: Some(0),
                bounds: None,
            }),
            player_set: Some(entries.clone()),
            player_index: peer.index,
            ..Default::default()
        });
        peer.connection.send_answer(Answer {
            powerup_set: Some(PowerupSet {
                seed: seeds.stage_two,
                stage: 2,
                first_index: None,
                bounds: None,
            }),
            ..Default::default()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use shared::transport::Side;

    fn config(players: usize) -> MatchConfig {
        MatchConfig {
            num_players: players,
            map_size: 1_000.0,
            ..MatchConfig::default()
        }
    }

    fn host_seat() -> Seat {
        Seat {
            shape_name: "Circle".to_string(),
            player_name: "host".to_string(),
            is_player: true,
        }
    }

    #[test]
    fn test_roster_fills_with_bots_inside_inset() {
        let tables = GameTables::embedded().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let roster = deal_roster(&config(10), &tables, &mut rng, &[host_seat()]).unwrap();

        assert_eq!(roster.len(), 10);
        assert!(roster[0].is_player);
        assert_eq!(roster[0].player_name, "host");
        for (i, shape) in roster.iter().enumerate() {
            assert_eq!(shape.index, i);
            assert!(shape.x >= SPAWN_INSET && shape.x <= 1_000.0 - SPAWN_INSET);
            assert!(shape.y >= SPAWN_INSET && shape.y <= 1_000.0 - SPAWN_INSET);
        }
        assert!(roster[1..].iter().all(|s| !s.is_player));
    }

    #[test]
    fn test_seats_beyond_player_count_still_dealt() {
        let tables = GameTables::embedded().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let seats = vec![host_seat(), host_seat()];
        let roster = deal_roster(&config(1), &tables, &mut rng, &seats).unwrap();
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_unknown_seat_archetype_is_error() {
        let tables = GameTables::embedded().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let seat = Seat {
            shape_name: "Hexagon".to_string(),
            player_name: "x".to_string(),
            is_player: true,
        };
        assert!(deal_roster(&config(1), &tables, &mut rng, &[seat]).is_err());
    }

    #[tokio::test]
    async fn test_lobby_waits_for_ready_and_countdown() {
        let tables = GameTables::embedded().unwrap();
        let mut lobby = Lobby::new(tables, 1, 4, 0.0);
        assert!(!lobby.can_start(Instant::now()));

        let (a, b) = tokio::io::duplex(64 * 1024);
        lobby.admit(Connection::spawn(a, "peer".to_string(), Side::Accepted));
        let mut remote = Connection::spawn(b, "host".to_string(), Side::Connecting);

        let mut asked = false;
        for _ in 0..200 {
            if remote
                .drain()
                .iter()
                .any(|m| *m == Message::question(STARTING_INFO_QUESTION))
            {
                asked = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(asked);
        assert!(!lobby.can_start(Instant::now()));

        remote.send_answer(Answer {
            send_starting_info: Some(StartingInfo {
                shape_name: "Triangle".to_string(),
                player_name: "p1".to_string(),
            }),
            ready: Some(true),
            ..Default::default()
        });

        for _ in 0..200 {
            lobby.poll();
            if lobby.can_start(Instant::now()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(lobby.can_start(Instant::now()));

        let seats = lobby.seats(host_seat());
        assert_eq!(seats.len(), 2);
        assert_eq!(seats[1].shape_name, "Triangle");
        assert_eq!(seats[1].player_name, "p1");

        lobby.assign_indices();
        assert_eq!(lobby.peers().iter().next().unwrap().index, Some(1));
    }

    #[test]
    fn test_countdown_blocks_start() {
        let tables = GameTables::embedded().unwrap();
        let lobby = Lobby::new(tables, 0, 4, 3.0);
        assert!(!lobby.can_start(Instant::now()));
        assert!(lobby.can_start(Instant::now() + Duration::from_secs(4)));
    }
}
