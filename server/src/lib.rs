//! # Authoritative Host Library
//!
//! Runs the canonical simulation of a match. Peers only ever send intents
//! (their own position and shoot requests); every hit, pickup, elimination
//! and the final result is decided here and fanned back out.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The match state and its per-tick step: animations, safezone, bullets,
//! regeneration and poison, bot steering, collisions, pickups, the second
//! powerup wave, end-of-tick eliminations and the end condition.
//!
//! ### AI Module (`ai`)
//! Steering for combatants nobody drives, including peers that dropped.
//!
//! ### Client Manager Module (`client_manager`)
//! Accepted peer connections with their lobby state and roster index.
//!
//! ### Lobby Module (`lobby`)
//! Collects starting info and ready flags, deals the roster, and announces
//! the seeds every peer needs to rebuild the world.
//!
//! ### Network Module (`network`)
//! The host/solo tick loop tying the above together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{HostOptions, Server};
//! use shared::input::Autopilot;
//! use shared::{GameTables, MatchConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = HostOptions {
//!         config: MatchConfig::default(),
//!         tables: GameTables::embedded()?,
//!         shape_name: "Square".to_string(),
//!         player_name: "host".to_string(),
//!         min_peers: 1,
//!         seed: None,
//!     };
//!
//!     let mut server = Server::host("0.0.0.0:5555", options, Box::new(Autopilot::new(0))).await?;
//!     let outcome = server.run().await;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod client_manager;
pub mod game;
pub mod lobby;
pub mod network;
