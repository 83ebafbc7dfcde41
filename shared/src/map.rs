//! Tile grid, per-coin collection state, and the text map loader.

use crate::error::MapLoadError;
use crate::player::PlayerId;
use crate::MAX_MAP_DIMENSION;
use std::fs;
use std::path::Path;

/// Contents of one map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TileType {
    #[default]
    Empty = 0,
    Coin = 1,
    ElectricSquare = 2,
}

impl TileType {
    /// Map file character for this tile. Unknown characters load as empty.
    pub fn from_char(c: char) -> Self {
        match c {
            'c' => TileType::Coin,
            'e' => TileType::ElectricSquare,
            _ => TileType::Empty,
        }
    }
}

impl TryFrom<u8> for TileType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TileType::Empty),
            1 => Ok(TileType::Coin),
            2 => Ok(TileType::ElectricSquare),
            other => Err(other),
        }
    }
}

/// Which players have collected the coin in a cell.
///
/// A coin stays on the map until both players have picked it up, so each
/// player can score it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CoinState {
    #[default]
    Available = 0,
    CollectedByP1 = 1,
    CollectedByP2 = 2,
    CollectedByBoth = 3,
}

impl CoinState {
    pub fn is_collected_by(self, player_id: PlayerId) -> bool {
        matches!(
            (self, player_id),
            (CoinState::CollectedByBoth, _)
                | (CoinState::CollectedByP1, 1)
                | (CoinState::CollectedByP2, 2)
        )
    }

    /// State after `player_id` picks the coin up.
    pub fn collect(self, player_id: PlayerId) -> CoinState {
        match (self, player_id) {
            (CoinState::Available, 1) => CoinState::CollectedByP1,
            (CoinState::Available, 2) => CoinState::CollectedByP2,
            (CoinState::CollectedByP1, 2) | (CoinState::CollectedByP2, 1) => {
                CoinState::CollectedByBoth
            }
            (state, _) => state,
        }
    }
}

impl TryFrom<u8> for CoinState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CoinState::Available),
            1 => Ok(CoinState::CollectedByP1),
            2 => Ok(CoinState::CollectedByP2),
            3 => Ok(CoinState::CollectedByBoth),
            other => Err(other),
        }
    }
}

/// Rectangular level grid with a parallel coin-state grid, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMap {
    width: usize,
    height: usize,
    tiles: Vec<TileType>,
    coin_states: Vec<CoinState>,
}

impl GameMap {
    /// Builds a map from row-major grids, checking that both match the
    /// declared dimensions.
    pub fn from_parts(
        width: usize,
        height: usize,
        tiles: Vec<TileType>,
        coin_states: Vec<CoinState>,
    ) -> Result<Self, MapLoadError> {
        if width > MAX_MAP_DIMENSION || height > MAX_MAP_DIMENSION {
            return Err(MapLoadError::TooLarge {
                width,
                height,
                max: MAX_MAP_DIMENSION,
            });
        }

        let expected = width * height;
        for found in [tiles.len(), coin_states.len()] {
            if found != expected {
                return Err(MapLoadError::DimensionMismatch { expected, found });
            }
        }

        Ok(Self {
            width,
            height,
            tiles,
            coin_states,
        })
    }

    /// Parses map text: one row per line, `_` empty, `c` coin, `e` electric
    /// square. Blank lines are skipped and every remaining row must have the
    /// width of the first one.
    pub fn parse(text: &str) -> Result<Self, MapLoadError> {
        let rows: Vec<&str> = text.lines().filter(|line| !line.is_empty()).collect();
        let first = rows.first().ok_or(MapLoadError::Empty)?;
        let width = first.chars().count();

        let mut tiles = Vec::with_capacity(width * rows.len());
        for (row, line) in rows.iter().enumerate() {
            let found = line.chars().count();
            if found != width {
                return Err(MapLoadError::RaggedRow {
                    row,
                    expected: width,
                    found,
                });
            }
            tiles.extend(line.chars().map(TileType::from_char));
        }

        let coin_states = vec![CoinState::Available; tiles.len()];
        Self::from_parts(width, rows.len(), tiles, coin_states)
    }

    /// Reads and parses a map file. Every load starts with all coins available.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapLoadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| MapLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_valid_position(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    pub fn tile(&self, x: usize, y: usize) -> Option<TileType> {
        self.index(x, y).map(|i| self.tiles[i])
    }

    pub fn coin_state(&self, x: usize, y: usize) -> Option<CoinState> {
        self.index(x, y).map(|i| self.coin_states[i])
    }

    pub fn set_tile(&mut self, x: usize, y: usize, tile: TileType) {
        if let Some(i) = self.index(x, y) {
            self.tiles[i] = tile;
        }
    }

    pub fn set_coin_state(&mut self, x: usize, y: usize, state: CoinState) {
        if let Some(i) = self.index(x, y) {
            self.coin_states[i] = state;
        }
    }

    /// Tiles in row-major order.
    pub fn tiles(&self) -> &[TileType] {
        &self.tiles
    }

    /// Coin states in row-major order.
    pub fn coin_states(&self) -> &[CoinState] {
        &self.coin_states
    }
}
