//! Match lifecycle and the authoritative player table.
//!
//! The session never touches sockets. Everything it wants sent or closed is
//! queued as a [`GameMessage`] and drained by the network loop after each
//! call, in order.

use crate::client_manager::ClientId;
use crate::collision::{self, CollisionEvent};
use crate::config::ServerConfig;
use crate::physics;
use crate::player::Player;
use log::{debug, info, warn};
use shared::{GameMap, MapLoadError, Packet, PlayerId, PlayerState, Position};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Spawn column for every player.
const SPAWN_X: f32 = 1.0;

/// Messages sent from the game session to the network layer
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    SendPacket { packet: Packet, client_id: ClientId },
    BroadcastPacket { packet: Packet },
    Disconnect { client_id: ClientId },
    DisconnectAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    WaitingForPlayers,
    InProgress,
    GameOver,
}

pub struct GameSession {
    state: SessionState,
    /// Keyed by player id, so iteration follows join order.
    players: BTreeMap<PlayerId, Player>,
    map: GameMap,
    map_path: PathBuf,
    max_players: usize,
    min_players: usize,
    tick: u64,
    outbox: Vec<GameMessage>,
}

impl GameSession {
    pub fn new(config: &ServerConfig) -> Result<Self, MapLoadError> {
        let map = GameMap::load(&config.map_path)?;
        info!(
            "Loaded map {} ({}x{})",
            config.map_path.display(),
            map.width(),
            map.height()
        );

        Ok(Self {
            state: SessionState::WaitingForPlayers,
            players: BTreeMap::new(),
            map,
            map_path: config.map_path.clone(),
            max_players: config.max_clients,
            min_players: config.min_players,
            tick: 0,
            outbox: Vec::new(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn map(&self) -> &GameMap {
        &self.map
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Ticks simulated in the current match.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Takes every message queued since the last call.
    pub fn drain_messages(&mut self) -> Vec<GameMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Registers a new connection as a player.
    ///
    /// Returns `None` when the session is full or a match is already running;
    /// the caller should close the connection.
    pub fn add_player(&mut self, client_id: ClientId) -> Option<PlayerId> {
        if self.state != SessionState::WaitingForPlayers || self.players.len() >= self.max_players
        {
            return None;
        }

        let player_id = (1..=PlayerId::MAX).find(|id| !self.players.contains_key(id))?;
        self.players
            .insert(player_id, Player::new(player_id, client_id));
        info!("Player {} joined on client {}", player_id, client_id);

        self.send(
            client_id,
            Packet::ConnectResponse {
                player_id,
                player_count: self.players.len() as u8,
            },
        );
        self.send(client_id, Packet::MapData(self.map.clone()));

        self.check_game_start();
        Some(player_id)
    }

    /// Drops the player bound to `client_id`, ending the match if too few
    /// active players remain.
    pub fn remove_player(&mut self, client_id: ClientId) -> Result<(), MapLoadError> {
        let Some(player_id) = self.player_id_for(client_id) else {
            return Ok(());
        };
        self.players.remove(&player_id);
        info!("Player {} left (client {})", player_id, client_id);

        if self.state == SessionState::InProgress {
            let active = self
                .players
                .values()
                .filter(|player| player.state.is_active())
                .count();
            if active < self.min_players {
                info!("Not enough players left ({}), ending match", active);
                self.end_match(None)?;
            }
        }

        Ok(())
    }

    /// Applies a packet received from `client_id`.
    pub fn handle_packet(
        &mut self,
        client_id: ClientId,
        packet: Packet,
    ) -> Result<(), MapLoadError> {
        match packet {
            Packet::PlayerInput { jetpack } => {
                if let Some(player) = self
                    .players
                    .values_mut()
                    .find(|player| player.client_id == client_id)
                {
                    if player.is_playing() {
                        player.jetpack = jetpack;
                    }
                }
            }
            Packet::ConnectRequest => {
                debug!("Connect request from client {}", client_id);
            }
            Packet::PlayerDisconnect => {
                self.outbox.push(GameMessage::Disconnect { client_id });
                self.remove_player(client_id)?;
            }
            other => {
                warn!(
                    "Unexpected {} packet from client {}",
                    other.packet_type().name(),
                    client_id
                );
            }
        }
        Ok(())
    }

    /// Advances the match by one tick.
    pub fn tick(&mut self) -> Result<(), MapLoadError> {
        if self.state != SessionState::InProgress {
            return Ok(());
        }
        self.tick += 1;

        // Everyone starts moving on the same tick.
        if self
            .players
            .values()
            .all(|player| player.state == PlayerState::Ready)
        {
            for player in self.players.values_mut() {
                player.state = PlayerState::Playing;
            }
            self.broadcast_state();
            return Ok(());
        }

        self.update_players();
        self.check_collisions();
        self.broadcast_state();
        self.check_game_end()
    }

    fn update_players(&mut self) {
        let finish_line = self.map.width() as f32;

        for player in self.players.values_mut().filter(|p| p.is_playing()) {
            physics::apply_physics(player);
            physics::check_bounds(player, &self.map);

            if player.position.x >= finish_line {
                player.state = PlayerState::Finished;
                info!("Player {} finished with score {}", player.id, player.score);
            }
        }
    }

    fn check_collisions(&mut self) {
        let mut events = Vec::new();
        for player in self.players.values_mut() {
            if let Some(event) = collision::resolve(player, &mut self.map) {
                events.push(event);
            }
        }

        for event in events {
            let packet = match event {
                CollisionEvent::CoinCollected {
                    player_id,
                    x,
                    y,
                    score,
                    coin_state,
                } => {
                    debug!("Player {} collected coin at ({}, {})", player_id, x, y);
                    Packet::CoinCollected {
                        player_id,
                        x: x as u8,
                        y: y as u8,
                        score: score.min(u8::MAX as u16) as u8,
                        coin_state,
                    }
                }
                CollisionEvent::PlayerDied { player_id } => {
                    info!("Player {} hit an electric square", player_id);
                    Packet::PlayerDeath { player_id }
                }
            };
            self.broadcast(packet);
        }
    }

    fn check_game_start(&mut self) {
        if self.state != SessionState::WaitingForPlayers || self.players.len() < self.min_players {
            return;
        }

        let spawn = Position::new(SPAWN_X, self.map.height() as f32 - 2.0);
        for player in self.players.values_mut() {
            player.state = PlayerState::Ready;
            player.position = spawn;
            player.velocity_y = 0.0;
            player.jetpack = false;
        }

        self.state = SessionState::InProgress;
        self.tick = 0;
        info!("Match started with {} players", self.players.len());

        self.broadcast(Packet::GameStart {
            player_count: self.players.len() as u8,
            countdown: 0,
        });
        self.broadcast_state();
    }

    fn check_game_end(&mut self) -> Result<(), MapLoadError> {
        let mut all_finished = true;
        let mut any_dead = false;
        let mut active = 0;

        for player in self.players.values() {
            match player.state {
                PlayerState::Playing => {
                    all_finished = false;
                    active += 1;
                }
                PlayerState::Finished => active += 1,
                PlayerState::Dead => any_dead = true,
                _ => {}
            }
        }

        let below_minimum = active < self.min_players && self.players.len() >= self.min_players;
        if (all_finished && active > 0) || any_dead || below_minimum {
            let winner = self.pick_winner(any_dead);
            self.end_match(winner)?;
        }
        Ok(())
    }

    /// After a death the first survivor wins. With no survivor, or no death,
    /// the single highest score wins and a tie has no winner.
    fn pick_winner(&self, any_dead: bool) -> Option<PlayerId> {
        if any_dead {
            let survivor = self
                .players
                .values()
                .find(|player| player.state != PlayerState::Dead);
            if let Some(survivor) = survivor {
                return Some(survivor.id);
            }
        }

        let best = self.players.values().map(|player| player.score).max()?;
        let mut leaders = self.players.values().filter(|player| player.score == best);
        match (leaders.next(), leaders.next()) {
            (Some(leader), None) => Some(leader.id),
            _ => None,
        }
    }

    fn end_match(&mut self, winner: Option<PlayerId>) -> Result<(), MapLoadError> {
        self.state = SessionState::GameOver;
        match winner {
            Some(id) => info!("Game over after {} ticks, player {} wins", self.tick, id),
            None => info!("Game over after {} ticks, no winner", self.tick),
        }

        self.broadcast(Packet::GameOver { winner });
        self.reset()
    }

    /// Closes every player connection and reloads the map for the next match.
    fn reset(&mut self) -> Result<(), MapLoadError> {
        self.outbox.push(GameMessage::DisconnectAll);
        self.players.clear();
        self.map = GameMap::load(&self.map_path)?;
        self.tick = 0;
        self.state = SessionState::WaitingForPlayers;
        info!("Session reset, waiting for players");
        Ok(())
    }

    fn broadcast_state(&mut self) {
        let players = self.players.values().map(Player::snapshot).collect();
        self.broadcast(Packet::GameStateUpdate { players });
    }

    fn player_id_for(&self, client_id: ClientId) -> Option<PlayerId> {
        self.players
            .values()
            .find(|player| player.client_id == client_id)
            .map(|player| player.id)
    }

    fn send(&mut self, client_id: ClientId, packet: Packet) {
        self.outbox.push(GameMessage::SendPacket { packet, client_id });
    }

    fn broadcast(&mut self, packet: Packet) {
        self.outbox.push(GameMessage::BroadcastPacket { packet });
    }
}
