//! Headless bot that plays the game against a running server.
//!
//! Start a few of these against the same room to exercise a full game:
//!
//! ```text
//! RUST_LOG=info cargo run --bin test_client -- --name Alice --host-game --wait-for 3
//! RUST_LOG=info cargo run --bin test_client -- --name Bob
//! RUST_LOG=info cargo run --bin test_client -- --name Carol
//! ```

use bincode::{deserialize, serialize};
use clap::Parser;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{ClientId, GameMode, Packet, PlayerInfo, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

const STATEMENTS: &[(&str, bool)] = &[
    ("Honey never spoils", true),
    ("Octopuses have three hearts", true),
    ("The Great Wall of China is visible from the Moon", false),
    ("Bananas are berries", true),
    ("Goldfish only have a three second memory", false),
    ("Lightning never strikes the same place twice", false),
    ("A day on Venus is longer than its year", true),
    ("Bulls are enraged by the color red", false),
];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Room code to join
    #[arg(short, long, default_value = "LOBBY")]
    room: String,

    /// Display name
    #[arg(short, long, default_value = "Bot")]
    name: String,

    /// Game mode used if this bot creates the room
    #[arg(short, long, default_value = "classic", value_parser = parse_mode)]
    mode: GameMode,

    /// Start the game once enough players are present (host only)
    #[arg(long)]
    host_game: bool,

    /// Number of players to wait for before starting
    #[arg(long, default_value = "2")]
    wait_for: usize,

    /// Leave after this many revealed rounds
    #[arg(long, default_value = "5")]
    rounds: u32,
}

fn parse_mode(value: &str) -> Result<GameMode, String> {
    match value.to_ascii_lowercase().as_str() {
        "classic" => Ok(GameMode::Classic),
        "rapid" => Ok(GameMode::Rapid),
        "expert" => Ok(GameMode::Expert),
        other => Err(format!("unknown game mode '{}'", other)),
    }
}

struct Bot {
    socket: UdpSocket,
    server_addr: SocketAddr,
    args: Args,
    rng: StdRng,
    client_id: Option<ClientId>,
    start_requested: bool,
    submitting: bool,
    rounds_seen: u32,
}

impl Bot {
    async fn new(args: Args) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = args.server.parse()?;

        Ok(Bot {
            socket,
            server_addr,
            args,
            rng: StdRng::from_entropy(),
            client_id: None,
            start_requested: false,
            submitting: false,
            rounds_seen: 0,
        })
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn is_host(&self, players: &[PlayerInfo]) -> bool {
        players
            .iter()
            .any(|p| Some(p.id) == self.client_id && p.is_host)
    }

    /// Reacts to one server packet. Returns false once the bot is done.
    async fn handle_packet(&mut self, packet: Packet) -> Result<bool, Box<dyn std::error::Error>> {
        if !packet.is_client_bound() {
            warn!("Server sent a client-only packet: {:?}", packet);
            return Ok(true);
        }

        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.send_packet(&Packet::JoinRoom {
                    room: self.args.room.clone(),
                    username: self.args.name.clone(),
                    game_mode: self.args.mode,
                    player_key: Some(self.args.name.to_lowercase()),
                })
                .await?;
            }
            Packet::LobbyStatus {
                players,
                game_started,
                ..
            } => {
                info!(
                    "Room {}: {}",
                    self.args.room,
                    players
                        .iter()
                        .map(|p| format!("{} ({})", p.name, p.score))
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                if self.args.host_game
                    && !game_started
                    && !self.start_requested
                    && players.len() >= self.args.wait_for
                    && self.is_host(&players)
                {
                    self.start_requested = true;
                    self.send_packet(&Packet::StartGame {
                        room: self.args.room.clone(),
                    })
                    .await?;
                }
            }
            Packet::GameStarted => info!("Game started"),
            Packet::NextSubmitter {
                submitter_id,
                submitter_name,
            } => {
                info!("{} is submitting", submitter_name);
                if Some(submitter_id) == self.client_id {
                    if let Some(&(fact, is_true)) = STATEMENTS.choose(&mut self.rng) {
                        self.submitting = true;
                        self.send_packet(&Packet::SubmitFact {
                            room: self.args.room.clone(),
                            fact: fact.to_string(),
                            is_true,
                            username: self.args.name.clone(),
                        })
                        .await?;
                    }
                }
            }
            Packet::NewFact { fact, username } => {
                info!("{} says: {}", username, fact);
                if !self.submitting {
                    let vote = self.rng.gen_bool(0.5);
                    self.send_packet(&Packet::VoteFact {
                        room: self.args.room.clone(),
                        vote,
                    })
                    .await?;
                }
            }
            Packet::Timer { seconds_remaining } => debug!("{}s left", seconds_remaining),
            Packet::RevealFact {
                fact,
                is_true,
                votes,
                timeout,
                ..
            } => {
                self.submitting = false;
                self.rounds_seen += 1;
                info!(
                    "'{}' was {} ({} votes{})",
                    fact,
                    if is_true { "true" } else { "false" },
                    votes.len(),
                    if timeout { ", timed out" } else { "" }
                );
                if self.rounds_seen >= self.args.rounds {
                    if self.start_requested {
                        self.send_packet(&Packet::EndGame {
                            room: self.args.room.clone(),
                        })
                        .await?;
                    } else {
                        return Ok(false);
                    }
                }
            }
            Packet::TurnSkipped { player_name, .. } => {
                self.submitting = false;
                info!("{} ran out of time", player_name);
            }
            Packet::AchievementUnlocked { achievement } => {
                info!("Achievement unlocked: {}", achievement);
                self.send_packet(&Packet::RequestStats).await?;
            }
            Packet::PlayerStats { stats } => {
                info!(
                    "Stats: {}/{} correct, best streak {}",
                    stats.correct_guesses, stats.total_guesses, stats.best_streak
                );
            }
            Packet::ChatHistory { entries } => {
                for entry in entries {
                    debug!("[history] {}", entry.text);
                }
            }
            Packet::ChatMessage { entry } => info!("[{}] {}", entry.username, entry.text),
            Packet::GameOver { standings } => {
                for (place, player) in standings.iter().enumerate() {
                    info!("{}. {} with {} points", place + 1, player.name, player.score);
                }
                return Ok(false);
            }
            Packet::JoinError { message } => {
                error!("Could not join: {}", message);
                return Ok(false);
            }
            Packet::GameError { message } => warn!("Server refused: {}", message),
            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.client_id = None;
                return Ok(false);
            }
            _ => {}
        }
        Ok(true)
    }

    async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.send_packet(&Packet::Connect {
            client_version: PROTOCOL_VERSION,
        })
        .await?;

        let mut heartbeat_interval = interval(Duration::from_secs(2));
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                if !self.handle_packet(packet).await? {
                                    break;
                                }
                            } else {
                                warn!("Failed to deserialize packet");
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = heartbeat_interval.tick() => {
                    if self.client_id.is_some() {
                        self.send_packet(&Packet::Heartbeat).await?;
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        if self.client_id.is_some() {
            self.send_packet(&Packet::Disconnect).await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    info!("Connecting to {} as {}", args.server, args.name);

    let mut bot = Bot::new(args).await?;
    bot.run().await
}
