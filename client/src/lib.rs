//! # Jetpack Arena Client Library
//!
//! Headless companion client for the jetpack arena server. It speaks the
//! binary protocol, mirrors everything the server reports and feeds back the
//! only input the game has: whether the jetpack is held.
//!
//! ## Architecture Overview
//!
//! The server is fully authoritative, so the client does no simulation of
//! its own. It decodes every packet through the shared framing buffer and
//! folds it into a [`game::GameData`] snapshot guarded by a mutex. Any
//! presentation layer can read that snapshot, and drain its event list,
//! without touching the socket.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The mirrored match state:
//! - Local player id, map and the ordered player list
//! - Coin, death and game-over events for a presentation layer
//!
//! ### Input Module (`input`)
//! Pluggable input sources sampled once per tick:
//! - `JetpackToggle`, a shared flag flipped from outside the network loop
//! - `Autopilot`, which keeps the local player near a target height
//!
//! ### Network Module (`network`)
//! The TCP session: handshake, packet decoding, periodic input and a clean
//! PLAYER_DISCONNECT on shutdown.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::GameData;
//! use client::input::Autopilot;
//! use client::network::NetworkClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), client::ClientError> {
//!     let data = GameData::shared();
//!     let mut network = NetworkClient::connect("127.0.0.1:4242", data, false).await?;
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     network.run(&mut Autopilot::default(), shutdown).await
//! }
//! ```

pub mod error;
pub mod game;
pub mod input;
pub mod network;

pub use error::ClientError;
