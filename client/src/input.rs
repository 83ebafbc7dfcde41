//! Sources of the single jetpack input the server accepts

use crate::game::GameData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Decides, once per input cycle, whether the jetpack is held.
pub trait InputSource {
    fn jetpack(&mut self, data: &GameData) -> bool;
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn jetpack(&mut self, data: &GameData) -> bool {
        (**self).jetpack(data)
    }
}

/// A flag flipped from outside the network loop, e.g. by a key handler.
#[derive(Debug, Clone, Default)]
pub struct JetpackToggle {
    held: Arc<AtomicBool>,
}

impl JetpackToggle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, held: bool) {
        self.held.store(held, Ordering::Relaxed);
    }

    /// Flips the flag and returns the new value.
    pub fn toggle(&self) -> bool {
        !self.held.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }
}

impl InputSource for JetpackToggle {
    fn jetpack(&mut self, _data: &GameData) -> bool {
        self.is_held()
    }
}

/// Holds the local player around a target height.
///
/// `target` is a fraction of the map height measured from the top, so 0.5
/// keeps the player near the middle row.
#[derive(Debug, Clone)]
pub struct Autopilot {
    target: f32,
}

impl Autopilot {
    pub fn new(target: f32) -> Self {
        Self {
            target: target.clamp(0.0, 1.0),
        }
    }
}

impl Default for Autopilot {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl InputSource for Autopilot {
    fn jetpack(&mut self, data: &GameData) -> bool {
        let (Some(map), Some(player)) = (data.map.as_ref(), data.local_player()) else {
            return false;
        };
        let floor = map.height().saturating_sub(1) as f32;
        player.position.y > floor * self.target
    }
}
