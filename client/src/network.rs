//! TCP connection to the game server

use crate::error::ClientError;
use crate::game::SharedGameData;
use crate::input::InputSource;
use log::{debug, info, warn};
use shared::{Packet, PacketBuffer, MAX_PENDING_BYTES, READ_BUFFER_SIZE, TICK_MS};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{interval, MissedTickBehavior};

pub struct NetworkClient {
    stream: TcpStream,
    buffer: PacketBuffer,
    data: SharedGameData,
    debug: bool,
}

impl NetworkClient {
    /// Connects and sends CONNECT_REQUEST.
    pub async fn connect(
        addr: &str,
        data: SharedGameData,
        debug: bool,
    ) -> Result<Self, ClientError> {
        info!("Connecting to {}...", addr);
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let mut client = Self {
            stream,
            buffer: PacketBuffer::new(MAX_PENDING_BYTES),
            data,
            debug,
        };
        client.send(&Packet::ConnectRequest).await?;
        Ok(client)
    }

    pub fn data(&self) -> SharedGameData {
        self.data.clone()
    }

    async fn send(&mut self, packet: &Packet) -> Result<(), ClientError> {
        let bytes = packet.encode();
        self.stream.write_all(&bytes).await?;
        if self.debug {
            debug!("Sent {} ({} bytes)", packet.packet_type().name(), bytes.len());
        }
        Ok(())
    }

    /// Feeds received bytes into the shared game data.
    async fn receive(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        if self.debug {
            debug!("Received {} bytes", bytes.len());
        }
        self.buffer.extend(bytes)?;

        let mut data = self.data.lock().await;
        loop {
            match self.buffer.next_packet() {
                Ok(Some(packet)) => data.apply(packet),
                Ok(None) => return Ok(()),
                Err(e) if e.breaks_framing() => return Err(e.into()),
                Err(e) => warn!("Discarding malformed packet: {}", e),
            }
        }
    }

    /// Exchanges packets until the server closes the connection or
    /// `shutdown` completes.
    ///
    /// Input is sampled every tick while the local player is playing. A
    /// close after GAME_OVER is a normal end of session.
    pub async fn run<I, F>(&mut self, input: &mut I, shutdown: F) -> Result<(), ClientError>
    where
        I: InputSource,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut input_interval = interval(Duration::from_millis(TICK_MS));
        input_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut buf = [0u8; READ_BUFFER_SIZE];

        loop {
            tokio::select! {
                result = self.stream.read(&mut buf) => {
                    let n = result?;
                    if n == 0 {
                        return if self.data.lock().await.outcome.is_some() {
                            info!("Server closed the session");
                            Ok(())
                        } else {
                            Err(ClientError::ConnectionClosed)
                        };
                    }
                    self.receive(&buf[..n]).await?;
                }

                _ = input_interval.tick() => {
                    let jetpack = {
                        let data = self.data.lock().await;
                        data.is_playing().then(|| input.jetpack(&data))
                    };
                    if let Some(jetpack) = jetpack {
                        self.send(&Packet::PlayerInput { jetpack }).await?;
                    }
                }

                _ = &mut shutdown => {
                    info!("Disconnecting from server");
                    if let Err(e) = self.send(&Packet::PlayerDisconnect).await {
                        warn!("Failed to send disconnect: {}", e);
                    }
                    return Ok(());
                }
            }
        }
    }
}
