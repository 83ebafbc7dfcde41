//! Per-tick motion of a single player.
//!
//! Units are tiles per tick. Horizontal speed is constant; the only input is
//! the jetpack, which pushes against gravity.

use crate::player::Player;
use shared::GameMap;

pub const GRAVITY: f32 = 0.008;
pub const JETPACK_FORCE: f32 = 0.013;
pub const MAX_VELOCITY: f32 = 0.05;
pub const HORIZONTAL_SPEED: f32 = 0.05;

/// Integrates one tick of velocity and position.
pub fn apply_physics(player: &mut Player) {
    let mut velocity_y = player.velocity_y + GRAVITY;
    if player.jetpack {
        velocity_y -= JETPACK_FORCE;
    }
    velocity_y = velocity_y.clamp(-MAX_VELOCITY, MAX_VELOCITY);

    player.velocity_y = velocity_y;
    player.position.x += HORIZONTAL_SPEED;
    player.position.y += velocity_y;
}

/// Keeps the player between the ceiling (row 0) and the floor (last row).
///
/// Touching either edge stops vertical motion. Horizontal position is left to
/// the caller, which uses it for finish detection.
pub fn check_bounds(player: &mut Player, map: &GameMap) {
    let floor = map.height() as f32 - 1.0;

    if player.position.y < 0.0 {
        player.position.y = 0.0;
        player.velocity_y = 0.0;
    } else if player.position.y >= floor {
        player.position.y = floor;
        player.velocity_y = 0.0;
    }
}
