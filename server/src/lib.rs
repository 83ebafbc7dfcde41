//! # Jetpack Arena Server Library
//!
//! Authoritative server for a two-player side-scrolling jetpack race. The
//! server owns the canonical match state, simulates it on a fixed tick and
//! streams compact binary snapshots to both players over TCP.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Players only ever send a single "jetpack held" flag. Movement, coin
//! pickups, deaths and the finish line are all decided here and pushed to
//! clients as events and state updates.
//!
//! ### Match Lifecycle
//! A session waits for two players, starts a match, and ends it when both
//! players finish, someone dies, or a player leaves. Every ending broadcasts
//! GAME_OVER, closes all connections and reloads the map for the next match.
//!
//! ## Architecture Design
//!
//! ### Single-Task Event Loop
//! Networking and simulation share one tokio task. The loop waits for socket
//! readiness only until the next 16 ms tick deadline, so the simulation
//! cadence does not depend on traffic and no state is shared across tasks.
//!
//! ### Outbox Messaging
//! The game session never touches sockets. It queues [`game::GameMessage`]s
//! that the network loop delivers in order after every call.
//!
//! ## Module Organization
//!
//! - `client_manager`: listener, client streams and packet reassembly
//! - `game`: session state machine and player table
//! - `physics`: per-tick integration and vertical bounds
//! - `collision`: coin and electric square interactions
//! - `broadcaster`: encoding and fire-and-forget delivery
//! - `network`: the tick loop tying everything together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), server::ServerError> {
//!     let config = ServerConfig::new("0.0.0.0", 4242, "maps/level1.txt");
//!     let mut server = Server::bind(config).await?;
//!     server.run().await
//! }
//! ```

pub mod broadcaster;
pub mod client_manager;
pub mod collision;
pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod physics;
pub mod player;

pub use config::ServerConfig;
pub use error::ServerError;
pub use network::Server;
