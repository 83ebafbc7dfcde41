//! Connection multiplexing for the game server
//!
//! This module owns the listening socket and every client stream. It is
//! driven from the single server loop and never spawns tasks:
//! - Waits for either a new connection or readable client data, bounded by
//!   the next tick deadline
//! - Reads at most one buffer per client per wake and reassembles packets
//! - Reports connects, packets and hangups as [`NetworkEvent`]s in order
//!
//! Sends are fire-and-forget. A write that cannot complete immediately is
//! reported to the caller and the data is dropped. A write that only got
//! partway is reported separately, since the peer can no longer frame what
//! follows.

use crate::broadcaster::hex_dump;
use crate::error::SendError;
use log::{debug, info, warn};
use shared::{
    Packet, PacketBuffer, MAX_PACKET_SIZE, MAX_PENDING_BYTES, READ_BUFFER_SIZE, TICK_MS,
};
use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::task::Poll;
use std::time::Duration;
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tokio::time::{timeout_at, Instant};

const LISTEN_BACKLOG: u32 = 16;
/// Requested on the listener and inherited by accepted streams, so the
/// largest MAP_DATA goes out in one non-blocking write.
const SEND_BUFFER_SIZE: u32 = 2 * MAX_PACKET_SIZE as u32;

/// Server-assigned connection identifier. Never reused within a process.
pub type ClientId = u32;

/// Something that happened on the network since the last poll
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Connected { client_id: ClientId, addr: SocketAddr },
    PacketReceived { client_id: ClientId, packet: Packet },
    Disconnected { client_id: ClientId },
}

/// What woke the multiplexer up
enum Readiness {
    Incoming(io::Result<(TcpStream, SocketAddr)>),
    Readable,
}

/// One accepted TCP connection and its partially received bytes
#[derive(Debug)]
pub struct Client {
    pub id: ClientId,
    pub addr: SocketAddr,
    stream: TcpStream,
    buffer: PacketBuffer,
}

impl Client {
    fn new(id: ClientId, addr: SocketAddr, stream: TcpStream) -> Self {
        Self {
            id,
            addr,
            stream,
            buffer: PacketBuffer::new(MAX_PENDING_BYTES),
        }
    }

    /// Feeds received bytes through the framer.
    ///
    /// Returns false when the stream can no longer be framed and the
    /// connection has to be dropped.
    fn receive(&mut self, bytes: &[u8], events: &mut Vec<NetworkEvent>) -> bool {
        if let Err(e) = self.buffer.extend(bytes) {
            warn!("Client {}: {}", self.id, e);
            return false;
        }

        loop {
            match self.buffer.next_packet() {
                Ok(Some(packet)) => events.push(NetworkEvent::PacketReceived {
                    client_id: self.id,
                    packet,
                }),
                Ok(None) => return true,
                Err(e) if e.breaks_framing() => {
                    warn!("Client {}: {}, dropping connection", self.id, e);
                    return false;
                }
                Err(e) => warn!("Client {}: discarding malformed packet: {}", self.id, e),
            }
        }
    }
}

/// Owns the listener and all live connections
pub struct ClientManager {
    listener: TcpListener,
    /// Kept in accept order.
    clients: Vec<Client>,
    next_client_id: ClientId,
    max_clients: usize,
    /// Hex-dump received data at debug level.
    debug: bool,
}

impl ClientManager {
    pub async fn bind(addr: &str, max_clients: usize, debug: bool) -> io::Result<Self> {
        let local = lookup_host(addr).await?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot resolve {}", addr),
            )
        })?;

        let socket = if local.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.set_send_buffer_size(SEND_BUFFER_SIZE)?;
        socket.bind(local)?;
        let listener = socket.listen(LISTEN_BACKLOG)?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            clients: Vec::new(),
            next_client_id: 1,
            max_clients,
            debug,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits until something is readable or `deadline` passes, then services
    /// whatever is ready.
    ///
    /// Returns an empty list on timeout.
    pub async fn poll_events(&mut self, deadline: Instant) -> Vec<NetworkEvent> {
        let mut events = Vec::new();

        let readiness = {
            let listener = &self.listener;
            let clients = &self.clients;
            poll_fn(move |cx| {
                if let Poll::Ready(result) = listener.poll_accept(cx) {
                    return Poll::Ready(Readiness::Incoming(result));
                }
                if clients
                    .iter()
                    .any(|client| client.stream.poll_read_ready(cx).is_ready())
                {
                    return Poll::Ready(Readiness::Readable);
                }
                Poll::Pending
            })
        };

        match timeout_at(deadline, readiness).await {
            Err(_) => return events,
            Ok(Readiness::Incoming(Ok((stream, addr)))) => {
                if let Some(client_id) = self.add_client(stream, addr, deadline).await {
                    events.push(NetworkEvent::Connected { client_id, addr });
                }
            }
            Ok(Readiness::Incoming(Err(e))) => warn!("Failed to accept connection: {}", e),
            Ok(Readiness::Readable) => {}
        }

        self.read_clients(&mut events);
        events
    }

    /// Registers an accepted stream, or closes it when the server is full.
    ///
    /// Waits for the stream to become writable so the handshake can be sent
    /// as soon as the caller learns about the connection.
    async fn add_client(
        &mut self,
        stream: TcpStream,
        addr: SocketAddr,
        deadline: Instant,
    ) -> Option<ClientId> {
        if self.clients.len() >= self.max_clients {
            info!("Rejecting connection from {}: server full", addr);
            return None;
        }

        // Write readiness is unknown until the reactor has seen the socket.
        let ready_by = deadline.max(Instant::now() + Duration::from_millis(TICK_MS));
        match timeout_at(ready_by, stream.writable()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Dropping connection from {}: {}", addr, e);
                return None;
            }
            Err(_) => {
                warn!("Dropping connection from {}: never became writable", addr);
                return None;
            }
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY for client {}: {}", client_id, e);
        }
        info!("Client {} connected from {}", client_id, addr);
        self.clients.push(Client::new(client_id, addr, stream));

        Some(client_id)
    }

    fn read_clients(&mut self, events: &mut Vec<NetworkEvent>) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        let mut closed = Vec::new();

        for client in &mut self.clients {
            match client.stream.try_read(&mut buf) {
                Ok(0) => {
                    info!("Client {} closed the connection", client.id);
                    closed.push(client.id);
                }
                Ok(n) => {
                    if self.debug {
                        debug!(
                            "Received {} bytes from client {}: {}",
                            n,
                            client.id,
                            hex_dump(&buf[..n])
                        );
                    }
                    if !client.receive(&buf[..n], events) {
                        closed.push(client.id);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    warn!("Read error on client {}: {}", client.id, e);
                    closed.push(client.id);
                }
            }
        }

        for client_id in closed {
            self.remove_client(client_id);
            events.push(NetworkEvent::Disconnected { client_id });
        }
    }

    /// Writes `bytes` without waiting. A short write counts as a failure.
    pub fn send(&self, client_id: ClientId, bytes: &[u8]) -> Result<(), SendError> {
        let client = self
            .clients
            .iter()
            .find(|client| client.id == client_id)
            .ok_or(SendError::NotConnected)?;

        let written = client.stream.try_write(bytes)?;
        if written < bytes.len() {
            return Err(SendError::Partial {
                written,
                len: bytes.len(),
            });
        }
        Ok(())
    }

    /// Closes one connection. Returns false if it was already gone.
    pub fn remove_client(&mut self, client_id: ClientId) -> bool {
        let before = self.clients.len();
        self.clients.retain(|client| client.id != client_id);

        let removed = self.clients.len() < before;
        if removed {
            info!("Client {} disconnected", client_id);
        }
        removed
    }

    /// Closes every connection.
    pub fn remove_all(&mut self) {
        for client in self.clients.drain(..) {
            info!("Client {} disconnected", client.id);
        }
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.iter().map(|client| client.id).collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    async fn manager(max_clients: usize) -> ClientManager {
        ClientManager::bind("127.0.0.1:0", max_clients, true)
            .await
            .unwrap()
    }

    /// Polls until at least `count` events have arrived.
    async fn collect(manager: &mut ClientManager, count: usize) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        for _ in 0..50 {
            let deadline = Instant::now() + Duration::from_millis(50);
            events.extend(manager.poll_events(deadline).await);
            if events.len() >= count {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn test_poll_times_out_without_activity() {
        let mut manager = manager(2).await;
        let start = Instant::now();

        let events = manager
            .poll_events(Instant::now() + Duration::from_millis(20))
            .await;

        assert!(events.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_connect_and_receive_packets() {
        let mut manager = manager(2).await;
        let addr = manager.local_addr().unwrap();
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let events = collect(&mut manager, 1).await;
        assert!(matches!(events[0], NetworkEvent::Connected { client_id: 1, .. }));
        assert_eq!(manager.len(), 1);

        let mut bytes = Packet::ConnectRequest.encode();
        bytes.extend(Packet::PlayerInput { jetpack: true }.encode());
        stream.write_all(&bytes).await.unwrap();

        let events = collect(&mut manager, 2).await;
        assert_eq!(
            events,
            vec![
                NetworkEvent::PacketReceived {
                    client_id: 1,
                    packet: Packet::ConnectRequest
                },
                NetworkEvent::PacketReceived {
                    client_id: 1,
                    packet: Packet::PlayerInput { jetpack: true }
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_split_packet_across_reads() {
        let mut manager = manager(2).await;
        let addr = manager.local_addr().unwrap();
        let mut stream = TcpStream::connect(addr).await.unwrap();
        collect(&mut manager, 1).await;

        stream.write_all(&[0x05]).await.unwrap();
        stream.flush().await.unwrap();
        let partial = collect(&mut manager, 1).await;
        assert!(partial.is_empty());

        stream.write_all(&[0x01]).await.unwrap();
        let events = collect(&mut manager, 1).await;
        assert_eq!(
            events,
            vec![NetworkEvent::PacketReceived {
                client_id: 1,
                packet: Packet::PlayerInput { jetpack: true }
            }]
        );
    }

    #[tokio::test]
    async fn test_hangup_reports_disconnect() {
        let mut manager = manager(2).await;
        let addr = manager.local_addr().unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();
        collect(&mut manager, 1).await;

        drop(stream);

        let events = collect(&mut manager, 1).await;
        assert_eq!(events, vec![NetworkEvent::Disconnected { client_id: 1 }]);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_packet_type_drops_connection() {
        let mut manager = manager(2).await;
        let addr = manager.local_addr().unwrap();
        let mut stream = TcpStream::connect(addr).await.unwrap();
        collect(&mut manager, 1).await;

        stream.write_all(&[0x07, 0x00]).await.unwrap();

        let events = collect(&mut manager, 1).await;
        assert_eq!(events, vec![NetworkEvent::Disconnected { client_id: 1 }]);

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_full_server_closes_new_connection() {
        let mut manager = manager(1).await;
        let addr = manager.local_addr().unwrap();
        let _first = TcpStream::connect(addr).await.unwrap();
        collect(&mut manager, 1).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        let events = collect(&mut manager, 1).await;

        assert!(events.is_empty());
        assert_eq!(manager.client_ids(), vec![1]);
        let mut buf = [0u8; 8];
        assert_eq!(second.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_send_right_after_connect() {
        let mut manager = manager(2).await;
        let addr = manager.local_addr().unwrap();
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let events = collect(&mut manager, 1).await;
        assert!(matches!(events[0], NetworkEvent::Connected { client_id: 1, .. }));

        let mut bytes = Packet::ConnectResponse {
            player_id: 1,
            player_count: 1,
        }
        .encode();
        manager.send(1, &bytes).unwrap();
        bytes.clear();
        bytes.resize(3, 0);
        timeout(WAIT, stream.read_exact(&mut bytes))
            .await
            .expect("handshake never arrived")
            .unwrap();
        assert_eq!(bytes, vec![0x02, 1, 1]);
    }

    #[tokio::test]
    async fn test_send_and_remove() {
        let mut manager = manager(2).await;
        let addr = manager.local_addr().unwrap();
        let mut stream = TcpStream::connect(addr).await.unwrap();
        collect(&mut manager, 1).await;

        let bytes = Packet::PlayerDeath { player_id: 2 }.encode();
        manager.send(1, &bytes).unwrap();
        let mut buf = [0u8; 2];
        timeout(WAIT, stream.read_exact(&mut buf))
            .await
            .expect("packet never arrived")
            .unwrap();
        assert_eq!(buf.to_vec(), bytes);

        assert!(matches!(manager.send(9, &bytes), Err(SendError::NotConnected)));
        assert!(manager.remove_client(1));
        assert!(!manager.remove_client(1));
        assert!(manager.send(1, &bytes).is_err());
    }

    #[tokio::test]
    async fn test_stalled_reader_fails_without_blocking() {
        let mut manager = manager(1).await;
        let addr = manager.local_addr().unwrap();
        let _stream = TcpStream::connect(addr).await.unwrap();
        collect(&mut manager, 1).await;

        let chunk = vec![0u8; 64 * 1024];
        let err = (0..1000)
            .find_map(|_| manager.send(1, &chunk).err())
            .expect("socket buffers never filled");

        match &err {
            SendError::Partial { written, len } => {
                assert!(*written > 0 && written < len);
                assert!(err.breaks_stream());
            }
            SendError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::WouldBlock);
                assert!(!err.breaks_stream());
            }
            other => panic!("unexpected send error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_client_ids_are_not_reused() {
        let mut manager = manager(2).await;
        let addr = manager.local_addr().unwrap();

        let first = TcpStream::connect(addr).await.unwrap();
        collect(&mut manager, 1).await;
        drop(first);
        collect(&mut manager, 1).await;

        let _second = TcpStream::connect(addr).await.unwrap();
        let events = collect(&mut manager, 1).await;
        assert!(matches!(events[0], NetworkEvent::Connected { client_id: 2, .. }));

        manager.remove_all();
        assert!(manager.is_empty());
    }
}
