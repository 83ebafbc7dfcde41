//! Binary wire format. All multi-byte integers are little-endian.

use crate::error::ProtocolError;
use crate::map::{CoinState, GameMap, TileType};
use crate::player::{PlayerId, PlayerSnapshot, PlayerState, Position};

/// Bytes per player entry in a GAME_STATE_UPDATE.
pub const PLAYER_ENTRY_SIZE: usize = 10;
const MAP_HEADER_SIZE: usize = 5;
const FIXED_POINT_SCALE: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    ConnectRequest = 0x01,
    ConnectResponse = 0x02,
    MapData = 0x03,
    GameStart = 0x04,
    PlayerInput = 0x05,
    GameStateUpdate = 0x06,
    CoinCollected = 0x08,
    PlayerDeath = 0x09,
    GameOver = 0x0A,
    PlayerDisconnect = 0x0B,
}

impl PacketType {
    pub fn name(self) -> &'static str {
        match self {
            PacketType::ConnectRequest => "CONNECT_REQUEST",
            PacketType::ConnectResponse => "CONNECT_RESPONSE",
            PacketType::MapData => "MAP_DATA",
            PacketType::GameStart => "GAME_START",
            PacketType::PlayerInput => "PLAYER_INPUT",
            PacketType::GameStateUpdate => "GAME_STATE_UPDATE",
            PacketType::CoinCollected => "COIN_COLLECTED",
            PacketType::PlayerDeath => "PLAYER_DEATH",
            PacketType::GameOver => "GAME_OVER",
            PacketType::PlayerDisconnect => "PLAYER_DISCONNECT",
        }
    }

    /// Size of packets whose length does not depend on header fields.
    fn fixed_size(self) -> Option<usize> {
        match self {
            PacketType::PlayerDisconnect => Some(1),
            PacketType::ConnectRequest | PacketType::PlayerInput | PacketType::PlayerDeath => {
                Some(2)
            }
            PacketType::ConnectResponse | PacketType::GameStart | PacketType::GameOver => Some(3),
            PacketType::CoinCollected => Some(6),
            PacketType::MapData | PacketType::GameStateUpdate => None,
        }
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(PacketType::ConnectRequest),
            0x02 => Ok(PacketType::ConnectResponse),
            0x03 => Ok(PacketType::MapData),
            0x04 => Ok(PacketType::GameStart),
            0x05 => Ok(PacketType::PlayerInput),
            0x06 => Ok(PacketType::GameStateUpdate),
            0x08 => Ok(PacketType::CoinCollected),
            0x09 => Ok(PacketType::PlayerDeath),
            0x0A => Ok(PacketType::GameOver),
            0x0B => Ok(PacketType::PlayerDisconnect),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

/// Every message exchanged between server and clients.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    ConnectRequest,
    ConnectResponse {
        player_id: PlayerId,
        player_count: u8,
    },
    MapData(GameMap),
    GameStart {
        player_count: u8,
        countdown: u8,
    },
    PlayerInput {
        jetpack: bool,
    },
    GameStateUpdate {
        players: Vec<PlayerSnapshot>,
    },
    CoinCollected {
        player_id: PlayerId,
        x: u8,
        y: u8,
        score: u8,
        coin_state: CoinState,
    },
    PlayerDeath {
        player_id: PlayerId,
    },
    GameOver {
        winner: Option<PlayerId>,
    },
    PlayerDisconnect,
}

/// Total size of the packet at the start of `buf`.
///
/// Returns `Ok(None)` while `buf` is shorter than the packet its header
/// announces, so callers keep the bytes and retry after the next read.
pub fn packet_size(buf: &[u8]) -> Result<Option<usize>, ProtocolError> {
    let Some(&tag) = buf.first() else {
        return Ok(None);
    };
    let packet_type = PacketType::try_from(tag)?;

    let size = match packet_type.fixed_size() {
        Some(size) => size,
        None if packet_type == PacketType::MapData => {
            if buf.len() < MAP_HEADER_SIZE {
                return Ok(None);
            }
            let width = u16::from_le_bytes([buf[1], buf[2]]) as usize;
            let height = u16::from_le_bytes([buf[3], buf[4]]) as usize;
            MAP_HEADER_SIZE + width * height * 2
        }
        None => {
            if buf.len() < 2 {
                return Ok(None);
            }
            2 + buf[1] as usize * PLAYER_ENTRY_SIZE
        }
    };

    Ok((buf.len() >= size).then_some(size))
}

/// Encodes a coordinate as hundredths, rounded and saturated to `i16`.
pub fn to_fixed(value: f32) -> i16 {
    (value * FIXED_POINT_SCALE)
        .round()
        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn from_fixed(value: i16) -> f32 {
    value as f32 / FIXED_POINT_SCALE
}

impl Packet {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::ConnectRequest => PacketType::ConnectRequest,
            Packet::ConnectResponse { .. } => PacketType::ConnectResponse,
            Packet::MapData(_) => PacketType::MapData,
            Packet::GameStart { .. } => PacketType::GameStart,
            Packet::PlayerInput { .. } => PacketType::PlayerInput,
            Packet::GameStateUpdate { .. } => PacketType::GameStateUpdate,
            Packet::CoinCollected { .. } => PacketType::CoinCollected,
            Packet::PlayerDeath { .. } => PacketType::PlayerDeath,
            Packet::GameOver { .. } => PacketType::GameOver,
            Packet::PlayerDisconnect => PacketType::PlayerDisconnect,
        }
    }

    /// Serializes the packet as `[type][payload...]`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.packet_type() as u8];

        match self {
            Packet::ConnectRequest => out.push(0),
            Packet::ConnectResponse {
                player_id,
                player_count,
            } => out.extend_from_slice(&[*player_id, *player_count]),
            Packet::MapData(map) => {
                out.reserve(4 + map.tiles().len() * 2);
                out.extend_from_slice(&(map.width() as u16).to_le_bytes());
                out.extend_from_slice(&(map.height() as u16).to_le_bytes());
                out.extend(map.tiles().iter().map(|tile| *tile as u8));
                out.extend(map.coin_states().iter().map(|state| *state as u8));
            }
            Packet::GameStart {
                player_count,
                countdown,
            } => out.extend_from_slice(&[*player_count, *countdown]),
            Packet::PlayerInput { jetpack } => out.push(u8::from(*jetpack)),
            Packet::GameStateUpdate { players } => {
                out.reserve(1 + players.len() * PLAYER_ENTRY_SIZE);
                out.push(players.len() as u8);
                for player in players {
                    out.push(player.id);
                    out.push(player.state as u8);
                    out.extend_from_slice(&to_fixed(player.position.x).to_le_bytes());
                    out.extend_from_slice(&to_fixed(player.position.y).to_le_bytes());
                    out.extend_from_slice(&player.score.to_le_bytes());
                    out.push(u8::from(player.jetpack));
                    out.push(0);
                }
            }
            Packet::CoinCollected {
                player_id,
                x,
                y,
                score,
                coin_state,
            } => out.extend_from_slice(&[*player_id, *x, *y, *score, *coin_state as u8]),
            Packet::PlayerDeath { player_id } => out.push(*player_id),
            Packet::GameOver { winner } => match winner {
                Some(id) => out.extend_from_slice(&[1, *id]),
                None => out.extend_from_slice(&[0, 0]),
            },
            Packet::PlayerDisconnect => {}
        }

        out
    }

    /// Decodes exactly one packet occupying all of `frame`.
    pub fn decode(frame: &[u8]) -> Result<Packet, ProtocolError> {
        let Some(&tag) = frame.first() else {
            return Err(ProtocolError::InvalidLength {
                packet: "packet",
                expected: 1,
                actual: 0,
            });
        };
        let packet_type = PacketType::try_from(tag)?;

        match packet_size(frame)? {
            Some(size) if size == frame.len() => {}
            other => {
                return Err(ProtocolError::InvalidLength {
                    packet: packet_type.name(),
                    expected: other.unwrap_or(frame.len() + 1),
                    actual: frame.len(),
                })
            }
        }

        let mut reader = Reader::new(&frame[1..]);
        let packet = match packet_type {
            PacketType::ConnectRequest => Packet::ConnectRequest,
            PacketType::ConnectResponse => Packet::ConnectResponse {
                player_id: reader.u8(),
                player_count: reader.u8(),
            },
            PacketType::MapData => {
                let width = reader.u16() as usize;
                let height = reader.u16() as usize;
                let cells = width * height;
                let tiles = reader
                    .bytes(cells)
                    .iter()
                    .map(|&b| {
                        TileType::try_from(b)
                            .map_err(|value| ProtocolError::InvalidField { field: "tile", value })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let coin_states = reader
                    .bytes(cells)
                    .iter()
                    .map(|&b| coin_state_field(b))
                    .collect::<Result<Vec<_>, _>>()?;
                Packet::MapData(GameMap::from_parts(width, height, tiles, coin_states)?)
            }
            PacketType::GameStart => Packet::GameStart {
                player_count: reader.u8(),
                countdown: reader.u8(),
            },
            PacketType::PlayerInput => Packet::PlayerInput {
                jetpack: reader.u8() != 0,
            },
            PacketType::GameStateUpdate => {
                let count = reader.u8() as usize;
                let mut players = Vec::with_capacity(count);
                for _ in 0..count {
                    let id = reader.u8();
                    let state = PlayerState::try_from(reader.u8()).map_err(|value| {
                        ProtocolError::InvalidField {
                            field: "player state",
                            value,
                        }
                    })?;
                    let x = from_fixed(reader.i16());
                    let y = from_fixed(reader.i16());
                    let score = reader.u16();
                    let jetpack = reader.u8() != 0;
                    let padding = reader.u8();
                    if padding != 0 {
                        return Err(ProtocolError::InvalidField {
                            field: "padding",
                            value: padding,
                        });
                    }
                    players.push(PlayerSnapshot {
                        id,
                        state,
                        position: Position::new(x, y),
                        score,
                        jetpack,
                    });
                }
                Packet::GameStateUpdate { players }
            }
            PacketType::CoinCollected => Packet::CoinCollected {
                player_id: reader.u8(),
                x: reader.u8(),
                y: reader.u8(),
                score: reader.u8(),
                coin_state: coin_state_field(reader.u8())?,
            },
            PacketType::PlayerDeath => Packet::PlayerDeath {
                player_id: reader.u8(),
            },
            PacketType::GameOver => {
                let has_winner = reader.u8() != 0;
                let winner_id = reader.u8();
                Packet::GameOver {
                    winner: has_winner.then_some(winner_id),
                }
            }
            PacketType::PlayerDisconnect => Packet::PlayerDisconnect,
        };

        Ok(packet)
    }
}

fn coin_state_field(value: u8) -> Result<CoinState, ProtocolError> {
    CoinState::try_from(value).map_err(|value| ProtocolError::InvalidField {
        field: "coin state",
        value,
    })
}

/// Cursor over a frame whose length has already been validated.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> &'a [u8] {
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        slice
    }

    fn u8(&mut self) -> u8 {
        self.bytes(1)[0]
    }

    fn u16(&mut self) -> u16 {
        let b = self.bytes(2);
        u16::from_le_bytes([b[0], b[1]])
    }

    fn i16(&mut self) -> i16 {
        self.u16() as i16
    }
}
