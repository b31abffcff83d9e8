//! Peer connection management for the authoritative host
//!
//! This module tracks every remote peer the host has accepted, including:
//! - The framed connection and its liveness
//! - Lobby state (chosen archetype, display name, ready flag)
//! - The roster index dealt to the peer once the match starts
//!
//! The manager never touches game state. It hands out drained messages and
//! reports dead peers so the simulation can decide what to do with them.

use log::info;
use shared::protocol::Message;
use shared::Connection;

/// One accepted remote peer
#[derive(Debug)]
pub struct Peer {
    /// Host-local identifier, assigned in connection order
    pub id: u32,
    pub connection: Connection,
    /// Archetype the peer picked in the lobby
    pub shape_name: Option<String>,
    /// Display name the peer picked in the lobby
    pub player_name: Option<String>,
    pub ready: bool,
    /// Roster index controlled by this peer, once dealt
    pub index: Option<usize>,
}

impl Peer {
    pub fn new(id: u32, connection: Connection) -> Self {
        Self {
            id,
            connection,
            shape_name: None,
            player_name: None,
            ready: false,
            index: None,
        }
    }

    /// True once the peer has sent its starting info and said it is ready
    pub fn is_ready(&self) -> bool {
        self.ready && self.shape_name.is_some() && self.player_name.is_some()
    }
}

/// Manages all connected peers in connection order
///
/// Connection order matters: it decides which roster index each peer gets.
#[derive(Debug)]
pub struct ClientManager {
    peers: Vec<Peer>,
    next_peer_id: u32,
    max_peers: usize,
}

impl ClientManager {
    /// Creates an empty manager accepting at most `max_peers` peers
    pub fn new(max_peers: usize) -> Self {
        Self {
            peers: Vec::new(),
            next_peer_id: 1,
            max_peers,
        }
    }

    /// Attempts to add a new peer
    ///
    /// Returns the peer id, or hands the connection back if the host is full.
    pub fn add_peer(&mut self, connection: Connection) -> Result<u32, Connection> {
        if self.peers.len() >= self.max_peers {
            return Err(connection);
        }

        let id = self.next_peer_id;
        self.next_peer_id += 1;

        info!("Peer {} connected from {}", id, connection.peer());
        self.peers.push(Peer::new(id, connection));
        Ok(id)
    }

    /// Removes a peer and closes its connection
    pub fn remove_peer(&mut self, id: u32) -> Option<Peer> {
        let pos = self.peers.iter().position(|p| p.id == id)?;
        let peer = self.peers.remove(pos);
        peer.connection.close();
        info!("Peer {} removed", id);
        Some(peer)
    }

    pub fn get(&self, id: u32) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Peer> {
        self.peers.iter_mut().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.peers.iter_mut()
    }

    /// Drains every peer's inbound queue, tagging each message with its sender
    pub fn drain_all(&mut self) -> Vec<(u32, Message)> {
        let mut messages = Vec::new();
        for peer in &mut self.peers {
            let id = peer.id;
            messages.extend(peer.connection.drain().into_iter().map(|m| (id, m)));
        }
        messages
    }

    /// Removes peers whose connection died and returns them
    pub fn reap_dead(&mut self) -> Vec<Peer> {
        let dead: Vec<u32> = self
            .peers
            .iter()
            .filter(|p| !p.connection.is_alive())
            .map(|p| p.id)
            .collect();

        dead.into_iter()
            .filter_map(|id| {
                info!("Peer {} disconnected", id);
                self.remove_peer(id)
            })
            .collect()
    }

    pub fn send_to(&self, id: u32, message: Message) {
        if let Some(peer) = self.get(id) {
            peer.connection.send(message);
        }
    }

    /// Sends a message to every peer
    pub fn broadcast(&self, message: &Message) {
        for peer in &self.peers {
            peer.connection.send(message.clone());
        }
    }

    pub fn all_ready(&self) -> bool {
        self.peers.iter().all(Peer::is_ready)
    }

    /// Returns the number of connected peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Returns true if no peers are connected
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Tests for peer bookkeeping
///
/// Connections run over in-memory duplex pipes so no sockets are needed.
#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::Answer;
    use shared::transport::Side;
    use std::time::Duration;

    fn pipe() -> (Connection, Connection) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            Connection::spawn(a, "host-side".to_string(), Side::Accepted),
            Connection::spawn(b, "peer-side".to_string(), Side::Connecting),
        )
    }

    #[tokio::test]
    async fn test_add_peer_assigns_increasing_ids() {
        let mut manager = ClientManager::new(4);
        let (a, _ra) = pipe();
        let (b, _rb) = pipe();

        assert_eq!(manager.add_peer(a).ok(), Some(1));
        assert_eq!(manager.add_peer(b).ok(), Some(2));
        assert_eq!(manager.len(), 2);
    }

    #[tokio::test]
    async fn test_capacity_enforced() {
        let mut manager = ClientManager::new(1);
        let (a, _ra) = pipe();
        let (b, _rb) = pipe();

        assert!(manager.add_peer(a).is_ok());
        assert!(manager.add_peer(b).is_err());
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_readiness_needs_info_and_flag() {
        let mut manager = ClientManager::new(2);
        let (a, _ra) = pipe();
        let id = manager.add_peer(a).unwrap();
        assert!(!manager.all_ready());

        let peer = manager.get_mut(id).unwrap();
        peer.ready = true;
        assert!(!peer.is_ready());
        peer.shape_name = Some("Square".to_string());
        peer.player_name = Some("p1".to_string());
        assert!(manager.all_ready());
    }

    #[tokio::test]
    async fn test_drain_all_tags_sender() {
        let mut manager = ClientManager::new(2);
        let (host_side, remote) = pipe();
        let id = manager.add_peer(host_side).unwrap();

        remote.send_answer(Answer {
            ready: Some(true),
            ..Default::default()
        });

        let mut received = Vec::new();
        for _ in 0..200 {
            received.extend(manager.drain_all());
            if !received.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, id);
    }

    #[tokio::test]
    async fn test_reap_dead_removes_only_dead() {
        let mut manager = ClientManager::new(2);
        let (a, remote_a) = pipe();
        let (b, _rb) = pipe();
        let first = manager.add_peer(a).unwrap();
        let second = manager.add_peer(b).unwrap();

        manager.get(first).unwrap().connection.mark_dead("test");
        let dead = manager.reap_dead();

        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].id, first);
        assert!(manager.get(second).is_some());
        assert!(manager.reap_dead().is_empty());

        // Reaped peers are shut down, so the remote end sees the socket close
        for _ in 0..200 {
            if !remote_a.is_alive() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!remote_a.is_alive());
    }

    #[tokio::test]
    async fn test_remove_peer_closes_connection() {
        let mut manager = ClientManager::new(2);
        let (a, _ra) = pipe();
        let id = manager.add_peer(a).unwrap();

        let removed = manager.remove_peer(id).unwrap();
        assert!(!removed.connection.is_alive());
        assert!(manager.is_empty());
        assert!(manager.remove_peer(id).is_none());
    }
}
