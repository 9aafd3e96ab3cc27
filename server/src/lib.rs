//! # Fact-or-Fiction Game Server Library
//!
//! This library provides the authoritative server for a real-time,
//! round-based party game. Players gather in rooms; each round one player
//! submits a statement and says whether it is true, and everyone else votes
//! true or false against a countdown. Fast correct voters earn bonuses and
//! submitters earn points for every player they fool.
//!
//! ## Core Responsibilities
//!
//! ### Room Lifecycle
//! Rooms are created by the first join and destroyed with their last
//! player. Each room keeps its roster in join order, which fixes the order
//! in which players take turns submitting.
//!
//! ### Round Engine
//! The server owns every decision: whose turn it is, when a countdown
//! expires, whether a round is complete and how many points everybody gets.
//! Each round is finalized exactly once, whether it ends because the last
//! vote arrived or because time ran out.
//!
//! ### Player Statistics
//! Guess accuracy, streaks, response times and achievements are tracked per
//! player identity for the lifetime of the process.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! Network tasks decode datagrams and forward them over a channel; a single
//! loop applies them to the game state one at a time. Countdown expiry is
//! just another event on that loop, so a vote can never race a timeout.
//!
//! ### Injected Time
//! Game operations take the current `Instant` as an argument and append
//! their output to an [`outbox::Outbox`]. Nothing below the network layer
//! reads the clock or touches a socket.
//!
//! ## Module Organization
//!
//! - `client_manager`: connection ids, capacity and heartbeat timeouts
//! - `config`: command-line configuration
//! - `error`: rejected requests and how they are reported
//! - `game`: packet dispatch into the room registry
//! - `network`: UDP tasks and the main loop
//! - `outbox`: addressed outbound packets
//! - `registry` and `room`: room membership and per-room state
//! - `round`: the round state machine
//! - `scoring`: round scoring rules
//! - `stats`: per-player statistics and achievements
//! - `timer`: the per-room countdown
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = ServerConfig::default();
//!     let mut server = Server::new(&config).await?;
//!
//!     // Runs until a shutdown message arrives
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod outbox;
pub mod registry;
pub mod room;
pub mod round;
pub mod scoring;
pub mod stats;
pub mod timer;
