use clap::{Parser, Subcommand};
use client::network::{Client, ClientOptions};
use log::{info, warn};
use server::network::{HostOptions, Server};
use shared::input::Autopilot;
use shared::protocol::MatchOutcome;
use shared::{GameTables, MatchConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Combatants in the match, bots fill the seats nobody takes
    #[arg(long, default_value_t = shared::NUM_PLAYERS)]
    players: usize,

    /// Peers that must be ready before a hosted match starts
    #[arg(long, default_value_t = 1)]
    peers: usize,

    /// Simulation ticks per second
    #[arg(short, long, default_value_t = shared::TICK_RATE)]
    tick_rate: u32,

    /// Archetype to play as
    #[arg(short, long, default_value = "Square")]
    shape: String,

    /// Override the embedded archetype table
    #[arg(long)]
    shapes: Option<PathBuf>,

    /// Override the embedded powerup table
    #[arg(long)]
    powerups: Option<PathBuf>,

    /// Fix every random draw of a hosted or solo match
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Host a match others can join
    Host { ip: String, port: u16, name: String },
    /// Join a hosted match
    Join { ip: String, port: u16, name: String },
}

fn report(outcome: &MatchOutcome) {
    match outcome {
        MatchOutcome::Winner(stats) => {
            info!("Winner: {} (combatant {})", stats.player_name, stats.index);
            info!(
                "Kills {}, shots {}/{} ({:.1}% accuracy), damage {:.0}",
                stats.record.kills,
                stats.record.shots_hit,
                stats.record.shots_fired,
                stats.accuracy,
                stats.record.total_damage
            );
            info!(
                "Powerups: {} common, {} uncommon, {} rare, {} legendary",
                stats.record.num_common_picked,
                stats.record.num_uncommon_picked,
                stats.record.num_rare_picked,
                stats.record.num_legendary_picked
            );
        }
        MatchOutcome::Tie => info!("Match ended in a tie"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let tables = GameTables::load(args.shapes.as_deref(), args.powerups.as_deref())?;
    tables.shape(&args.shape)?;

    let config = MatchConfig {
        num_players: args.players.max(1),
        tick_rate: args.tick_rate.max(1),
        ..MatchConfig::default()
    };
    let input = Box::new(Autopilot::new(args.seed.unwrap_or_else(rand::random)));

    match args.mode {
        Some(Mode::Join { ip, port, name }) => {
            let address = format!("{}:{}", ip, port);
            let options = ClientOptions {
                config,
                tables,
                shape_name: args.shape,
                player_name: name,
            };

            let mut client = Client::join(&address, options, input).await?;
            tokio::select! {
                result = client.run() => report(&result?),
                _ = tokio::signal::ctrl_c() => warn!("Received Ctrl+C, leaving the match"),
            }
        }
        mode => {
            let (address, name) = match mode {
                Some(Mode::Host { ip, port, name }) => (Some(format!("{}:{}", ip, port)), name),
                _ => (None, "Player".to_string()),
            };
            let options = HostOptions {
                config,
                tables,
                shape_name: args.shape,
                player_name: name,
                min_peers: args.peers,
                seed: args.seed,
            };

            let mut server = match address {
                Some(address) => Server::host(&address, options, input).await?,
                None => {
                    info!("No mode given, starting a solo match");
                    Server::solo(options, input)?
                }
            };
            tokio::select! {
                outcome = server.run() => report(&outcome),
                _ = tokio::signal::ctrl_c() => warn!("Received Ctrl+C, shutting down"),
            }
        }
    }

    Ok(())
}
