//! Server network layer: the fixed-tick loop tying sockets to the session

use crate::broadcaster::Broadcaster;
use crate::client_manager::{ClientId, ClientManager, NetworkEvent};
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::{GameMessage, GameSession, SessionState};
use log::{debug, info, warn};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

/// Ticks between debug heartbeat lines.
const HEARTBEAT_TICKS: u64 = 60;

/// Main server coordinating networking and game simulation
///
/// Everything runs on one task. Each loop iteration waits for network
/// readiness until the next tick deadline, feeds the resulting events to the
/// session, and steps the simulation once the deadline has passed.
pub struct Server {
    clients: ClientManager,
    game: GameSession,
    broadcaster: Broadcaster,
    tick_duration: Duration,
}

impl Server {
    /// Loads the map and binds the listening socket.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let game = GameSession::new(&config)?;
        let clients =
            ClientManager::bind(&config.bind_addr(), config.max_clients, config.debug).await?;

        Ok(Server {
            clients,
            game,
            broadcaster: Broadcaster::new(config.debug),
            tick_duration: config.tick_duration,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.clients.local_addr()
    }

    /// Runs until a fatal error occurs.
    ///
    /// The only runtime failure that escapes is a map that can no longer be
    /// reloaded when a match resets.
    pub async fn run(&mut self) -> Result<(), ServerError> {
        let mut next_tick = Instant::now() + self.tick_duration;
        let mut ticks: u64 = 0;

        info!("Server started successfully");

        loop {
            for event in self.clients.poll_events(next_tick).await {
                self.handle_event(event)?;
            }

            let now = Instant::now();
            if now < next_tick {
                continue;
            }

            let result = self.game.tick();
            self.dispatch_messages()?;
            result?;

            ticks += 1;
            if ticks % HEARTBEAT_TICKS == 0 && self.game.state() == SessionState::InProgress {
                debug!(
                    "Tick {}: {} players, match tick {}",
                    ticks,
                    self.game.player_count(),
                    self.game.tick_count()
                );
            }

            next_tick += self.tick_duration;
            if next_tick <= now {
                // Fell behind; skip the missed ticks instead of replaying them.
                next_tick = now + self.tick_duration;
            }
        }
    }

    fn handle_event(&mut self, event: NetworkEvent) -> Result<(), ServerError> {
        let result = match event {
            NetworkEvent::Connected { client_id, addr } => {
                if self.game.add_player(client_id).is_none() {
                    info!(
                        "Refusing client {} from {}: session not accepting players",
                        client_id, addr
                    );
                    self.clients.remove_client(client_id);
                }
                Ok(())
            }
            NetworkEvent::PacketReceived { client_id, packet } => {
                self.game.handle_packet(client_id, packet)
            }
            NetworkEvent::Disconnected { client_id } => self.game.remove_player(client_id),
        };

        self.dispatch_messages()?;
        Ok(result?)
    }

    /// Delivers everything the session queued, in order.
    ///
    /// Clients left holding a truncated packet are disconnected, and whatever
    /// the session queues in response is delivered too.
    fn dispatch_messages(&mut self) -> Result<(), ServerError> {
        loop {
            for message in self.game.drain_messages() {
                match message {
                    GameMessage::SendPacket { packet, client_id } => {
                        self.broadcaster.send_to(&self.clients, client_id, &packet);
                    }
                    GameMessage::BroadcastPacket { packet } => {
                        self.broadcaster.broadcast(&self.clients, &packet);
                    }
                    GameMessage::Disconnect { client_id } => {
                        self.clients.remove_client(client_id);
                    }
                    GameMessage::DisconnectAll => self.clients.remove_all(),
                }
            }

            let broken = self.broadcaster.take_broken();
            if broken.is_empty() {
                return Ok(());
            }
            self.drop_clients(&broken)?;
        }
    }

    /// Closes the given connections and removes their players.
    fn drop_clients(&mut self, client_ids: &[ClientId]) -> Result<(), ServerError> {
        for &client_id in client_ids {
            if self.clients.remove_client(client_id) {
                warn!("Client {} stream cut mid-packet, disconnecting", client_id);
                self.game.remove_player(client_id)?;
            }
        }
        Ok(())
    }
}
