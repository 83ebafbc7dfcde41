//! Tile interactions: coin pickups and electric squares.

use crate::player::Player;
use shared::{CoinState, GameMap, PlayerId, PlayerState, TileType};

/// Outcome of a player touching an interactive tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionEvent {
    CoinCollected {
        player_id: PlayerId,
        x: usize,
        y: usize,
        score: u16,
        coin_state: CoinState,
    },
    PlayerDied {
        player_id: PlayerId,
    },
}

/// Applies the tile under a playing player.
///
/// Each player can score a given coin once. The coin stays on the map until
/// both players have taken it, and only then does the tile become empty.
/// Electric squares kill unconditionally; callers only pass players that are
/// still playing, so a death is reported once.
pub fn resolve(player: &mut Player, map: &mut GameMap) -> Option<CollisionEvent> {
    if !player.is_playing() {
        return None;
    }

    let (cell_x, cell_y) = player.position.cell();
    if !map.is_valid_position(cell_x, cell_y) {
        return None;
    }
    let (x, y) = (cell_x as usize, cell_y as usize);

    match map.tile(x, y)? {
        TileType::Coin => {
            let current = map.coin_state(x, y)?;
            if current.is_collected_by(player.id) {
                return None;
            }

            player.score = player.score.saturating_add(1);
            let coin_state = current.collect(player.id);
            map.set_coin_state(x, y, coin_state);
            if coin_state == CoinState::CollectedByBoth {
                map.set_tile(x, y, TileType::Empty);
            }

            Some(CollisionEvent::CoinCollected {
                player_id: player.id,
                x,
                y,
                score: player.score,
                coin_state,
            })
        }
        TileType::ElectricSquare => {
            player.state = PlayerState::Dead;
            Some(CollisionEvent::PlayerDied {
                player_id: player.id,
            })
        }
        TileType::Empty => None,
    }
}
