//! Types and wire protocol shared by the jetpack server and its clients.
//!
//! Every packet starts with a one-byte type tag and carries no length prefix:
//! the size of each packet follows from its tag and, for the two variable
//! sized packets, from header fields. [`PacketBuffer`] is the single place
//! that turns a TCP byte stream back into [`Packet`]s.

pub mod error;
pub mod framing;
pub mod map;
pub mod player;
pub mod protocol;

pub use error::{MapLoadError, ProtocolError};
pub use framing::PacketBuffer;
pub use map::{CoinState, GameMap, TileType};
pub use player::{PlayerId, PlayerSnapshot, PlayerState, Position};
pub use protocol::{packet_size, Packet, PacketType};

/// Session capacity.
pub const MAX_CLIENTS: usize = 2;
/// Players required before a match starts, and below which it ends.
pub const MIN_PLAYERS: usize = 2;
/// Server tick period and client input sampling period, in milliseconds.
pub const TICK_MS: u64 = 16;
/// Bytes read from a socket per readiness event.
pub const READ_BUFFER_SIZE: usize = 1024;
/// Largest accepted map width or height.
///
/// Tile coordinates travel as `u8` and positions as `i16` hundredths.
pub const MAX_MAP_DIMENSION: usize = 256;
/// Size of the largest legal packet: MAP_DATA for a map at the dimension cap.
pub const MAX_PACKET_SIZE: usize = 5 + 2 * MAX_MAP_DIMENSION * MAX_MAP_DIMENSION;
/// Upper bound on bytes buffered while waiting for a packet to complete.
///
/// Room for one partial packet of maximum size plus a full read behind it.
pub const MAX_PENDING_BYTES: usize = MAX_PACKET_SIZE + READ_BUFFER_SIZE;
/// Port used when none is configured.
pub const DEFAULT_PORT: u16 = 4242;
