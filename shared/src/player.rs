/// Player identifier, 1-based and dense within a match.
pub type PlayerId = u8;

/// Lifecycle of a player inside one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlayerState {
    #[default]
    Connected = 0,
    Ready = 1,
    Playing = 2,
    Dead = 3,
    Finished = 4,
    Disconnected = 5,
}

impl PlayerState {
    /// Ready and Playing players count towards the match.
    pub fn is_active(self) -> bool {
        matches!(self, PlayerState::Ready | PlayerState::Playing)
    }
}

impl TryFrom<u8> for PlayerState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PlayerState::Connected),
            1 => Ok(PlayerState::Ready),
            2 => Ok(PlayerState::Playing),
            3 => Ok(PlayerState::Dead),
            4 => Ok(PlayerState::Finished),
            5 => Ok(PlayerState::Disconnected),
            other => Err(other),
        }
    }
}

/// World position in tile units. `y` grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Grid cell containing this position.
    pub fn cell(&self) -> (i64, i64) {
        (self.x.floor() as i64, self.y.floor() as i64)
    }
}

/// Per-player entry of a GAME_STATE_UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub state: PlayerState,
    pub position: Position,
    pub score: u16,
    pub jetpack: bool,
}

impl PlayerSnapshot {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            state: PlayerState::Connected,
            position: Position::default(),
            score: 0,
            jetpack: false,
        }
    }
}
