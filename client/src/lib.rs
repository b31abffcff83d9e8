//! # Peer Library
//!
//! Everything a joining peer needs to take part in a match hosted elsewhere.
//! The host owns the simulation; a peer mirrors it and drives one combatant.
//!
//! ## Architecture Overview
//!
//! ### Optimistic Local Movement
//! The locally controlled combatant moves as soon as input arrives. Its
//! position and facing go to the host every tick, and host updates never pull
//! it back while it is alive.
//!
//! ### Last Writer Wins
//! Every other field is overwritten in place by the latest host update, keyed
//! by combatant index. There are no sequence numbers or acknowledgements; a
//! lost update is simply replaced by the next one.
//!
//! ### Host Arbitration
//! Peers never resolve hits or pickups. Bullets are replaced wholesale from
//! the host's snapshot and only advanced locally for display; powerups come
//! and go by host-assigned index.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The mirrored match: roster, bullets, powerups, safezone walls rebuilt from
//! the host's seed, staleness tracking and the match outcome.
//!
//! ### Input Module (`input`)
//! Wraps the input source and cycles the spectator view after elimination.
//!
//! ### Network Module (`network`)
//! Lobby handshake and the per-tick loop against the host connection.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientOptions};
//! use shared::input::Autopilot;
//! use shared::{GameTables, MatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = ClientOptions {
//!         config: MatchConfig::default(),
//!         tables: GameTables::embedded()?,
//!         shape_name: "Triangle".to_string(),
//!         player_name: "peer".to_string(),
//!     };
//!
//!     let mut client = Client::join("127.0.0.1:5555", options, Box::new(Autopilot::new(1))).await?;
//!     let outcome = client.run().await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
