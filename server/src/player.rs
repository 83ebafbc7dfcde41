use crate::client_manager::ClientId;
use shared::{PlayerId, PlayerSnapshot, PlayerState, Position};

/// Authoritative state of one connected player.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    /// Connection this player's packets arrive on.
    pub client_id: ClientId,
    pub position: Position,
    pub velocity_y: f32,
    pub jetpack: bool,
    pub score: u16,
    pub state: PlayerState,
}

impl Player {
    pub fn new(id: PlayerId, client_id: ClientId) -> Self {
        Self {
            id,
            client_id,
            position: Position::default(),
            velocity_y: 0.0,
            jetpack: false,
            score: 0,
            state: PlayerState::Connected,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            state: self.state,
            position: self.position,
            score: self.score,
            jetpack: self.jetpack,
        }
    }
}
