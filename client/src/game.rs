//! Client-side mirror of the authoritative match state

use log::{info, warn};
use shared::{CoinState, GameMap, Packet, PlayerId, PlayerSnapshot, PlayerState, TileType};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Game data shared between the network task and whatever presents it.
pub type SharedGameData = Arc<Mutex<GameData>>;

/// Discrete things that happened, for a presentation layer to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    CoinCollected { player_id: PlayerId, x: u8, y: u8 },
    PlayerDied { player_id: PlayerId },
    GameOver { winner: Option<PlayerId> },
}

/// Everything the server has told this client so far.
#[derive(Debug, Default)]
pub struct GameData {
    pub local_id: Option<PlayerId>,
    pub player_count: u8,
    pub map: Option<GameMap>,
    /// In id order, as last broadcast.
    pub players: Vec<PlayerSnapshot>,
    pub started: bool,
    /// `Some` once GAME_OVER arrived; the inner value is the winner.
    pub outcome: Option<Option<PlayerId>>,
    events: Vec<GameEvent>,
}

impl GameData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedGameData {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn local_player(&self) -> Option<&PlayerSnapshot> {
        let id = self.local_id?;
        self.players.iter().find(|player| player.id == id)
    }

    /// True while the local player is being simulated by the server.
    pub fn is_playing(&self) -> bool {
        self.local_player()
            .map_or(false, |player| player.state == PlayerState::Playing)
    }

    /// Takes the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Folds one server packet into the mirrored state.
    pub fn apply(&mut self, packet: Packet) {
        match packet {
            Packet::ConnectResponse {
                player_id,
                player_count,
            } => {
                info!("Joined as player {} ({} connected)", player_id, player_count);
                self.local_id = Some(player_id);
                self.player_count = player_count;
            }
            Packet::MapData(map) => {
                info!("Received {}x{} map", map.width(), map.height());
                self.map = Some(map);
            }
            Packet::GameStart { player_count, .. } => {
                info!("Match started with {} players", player_count);
                self.player_count = player_count;
                self.started = true;
            }
            Packet::GameStateUpdate { players } => self.players = players,
            Packet::CoinCollected {
                player_id,
                x,
                y,
                score,
                coin_state,
            } => {
                if let Some(map) = self.map.as_mut() {
                    let (x, y) = (x as usize, y as usize);
                    map.set_coin_state(x, y, coin_state);
                    if coin_state == CoinState::CollectedByBoth {
                        map.set_tile(x, y, TileType::Empty);
                    }
                }
                if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
                    player.score = score as u16;
                }
                self.events.push(GameEvent::CoinCollected { player_id, x, y });
            }
            Packet::PlayerDeath { player_id } => {
                info!("Player {} died", player_id);
                if let Some(player) = self.players.iter_mut().find(|p| p.id == player_id) {
                    player.state = PlayerState::Dead;
                }
                self.events.push(GameEvent::PlayerDied { player_id });
            }
            Packet::GameOver { winner } => {
                match winner {
                    Some(id) if Some(id) == self.local_id => info!("Game over: you win"),
                    Some(id) => info!("Game over: player {} wins", id),
                    None => info!("Game over: no winner"),
                }
                self.started = false;
                self.outcome = Some(winner);
                self.events.push(GameEvent::GameOver { winner });
            }
            other => warn!(
                "Ignoring unexpected {} packet from server",
                other.packet_type().name()
            ),
        }
    }
}
