//! Integration tests for the jetpack arena server
//!
//! These tests run a real server on a loopback port and drive it with raw
//! protocol clients, checking whole match lifecycles end to end.

use assert_approx_eq::assert_approx_eq;
use server::{Server, ServerConfig};
use shared::{CoinState, Packet, PacketBuffer, PlayerState};
use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(5);

/// Running server plus the map file it reloads on reset.
struct TestServer {
    addr: SocketAddr,
    _map: NamedTempFile,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn start(map_text: &str) -> Self {
        let mut map = NamedTempFile::new().unwrap();
        map.write_all(map_text.as_bytes()).unwrap();

        let config = ServerConfig::new("127.0.0.1", 0, map.path()).with_debug(true);
        let mut server = Server::bind(config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        Self {
            addr,
            _map: map,
            handle,
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Minimal protocol client working directly on the byte stream.
struct TestClient {
    stream: TcpStream,
    buffer: PacketBuffer,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = assert_ok!(TcpStream::connect(addr).await);
        let mut client = Self {
            stream,
            buffer: PacketBuffer::new(shared::MAX_PENDING_BYTES),
        };
        client.send(&Packet::ConnectRequest).await;
        client
    }

    async fn send(&mut self, packet: &Packet) {
        self.send_raw(&packet.encode()).await;
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    /// Next packet, or `None` once the server has closed the connection.
    async fn next(&mut self) -> Option<Packet> {
        loop {
            if let Some(packet) = self.buffer.next_packet().unwrap() {
                return Some(packet);
            }
            let mut buf = [0u8; 1024];
            let read = timeout(WAIT, self.stream.read(&mut buf))
                .await
                .expect("timed out waiting for server");
            match read {
                Ok(0) | Err(_) => return None,
                Ok(n) => self.buffer.extend(&buf[..n]).unwrap(),
            }
        }
    }

    async fn recv(&mut self) -> Packet {
        self.next().await.expect("connection closed unexpectedly")
    }

    /// Skips packets until one matches.
    async fn recv_until(&mut self, predicate: impl Fn(&Packet) -> bool) -> Packet {
        loop {
            let packet = self.recv().await;
            if predicate(&packet) {
                return packet;
            }
        }
    }

    /// Drains remaining packets and asserts the server hangs up.
    async fn expect_closed(&mut self) {
        while self.next().await.is_some() {}
    }
}

/// Connects two clients and consumes their handshake up to GAME_START.
async fn start_match(addr: SocketAddr) -> (TestClient, TestClient) {
    let mut first = TestClient::connect(addr).await;
    first
        .recv_until(|p| matches!(p, Packet::MapData(_)))
        .await;
    let mut second = TestClient::connect(addr).await;

    for client in [&mut first, &mut second] {
        client
            .recv_until(|p| matches!(p, Packet::GameStart { .. }))
            .await;
    }
    (first, second)
}

fn is_game_over(packet: &Packet) -> bool {
    matches!(packet, Packet::GameOver { .. })
}

/// CONNECTION AND HANDSHAKE TESTS
mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn players_get_sequential_ids_and_map() {
        let server = TestServer::start("_____c____\n__________\n_____e____\n").await;

        let mut first = TestClient::connect(server.addr).await;
        assert_eq!(
            first.recv().await,
            Packet::ConnectResponse {
                player_id: 1,
                player_count: 1
            }
        );
        match first.recv().await {
            Packet::MapData(map) => {
                assert_eq!((map.width(), map.height()), (10, 3));
            }
            other => panic!("expected MAP_DATA, got {:?}", other),
        }

        let mut second = TestClient::connect(server.addr).await;
        assert_eq!(
            second.recv().await,
            Packet::ConnectResponse {
                player_id: 2,
                player_count: 2
            }
        );
        assert!(matches!(second.recv().await, Packet::MapData(_)));

        for client in [&mut first, &mut second] {
            assert_eq!(
                client.recv().await,
                Packet::GameStart {
                    player_count: 2,
                    countdown: 0
                }
            );
            match client.recv().await {
                Packet::GameStateUpdate { players } => {
                    let ids: Vec<u8> = players.iter().map(|p| p.id).collect();
                    assert_eq!(ids, vec![1, 2]);
                    for player in &players {
                        assert_eq!(player.state, PlayerState::Ready);
                        assert_approx_eq!(player.position.x, 1.0);
                        assert_approx_eq!(player.position.y, 1.0);
                    }
                }
                other => panic!("expected GAME_STATE_UPDATE, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn third_client_is_turned_away() {
        let server = TestServer::start("__________\n__________\n").await;
        let (_first, _second) = start_match(server.addr).await;

        let mut third = TestClient::connect(server.addr).await;
        assert_eq!(third.next().await, None);
    }

    #[tokio::test]
    async fn unknown_packet_type_drops_connection() {
        let server = TestServer::start("__________\n__________\n").await;

        let mut client = TestClient::connect(server.addr).await;
        client
            .recv_until(|p| matches!(p, Packet::MapData(_)))
            .await;
        client.send_raw(&[0x07, 0x00]).await;
        client.expect_closed().await;

        // The slot is free again.
        let mut next = TestClient::connect(server.addr).await;
        assert_eq!(
            next.recv().await,
            Packet::ConnectResponse {
                player_id: 1,
                player_count: 1
            }
        );
    }
}

/// MATCH LIFECYCLE TESTS
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn electric_square_kills_and_survivor_wins() {
        let server = TestServer::start("_____\n_____\n___e_\n").await;
        let (mut first, mut second) = start_match(server.addr).await;

        // Player 2 climbs to the top row as soon as the simulation runs.
        second
            .recv_until(|p| {
                matches!(p, Packet::GameStateUpdate { players }
                    if players.iter().all(|p| p.state == PlayerState::Playing))
            })
            .await;
        second.send(&Packet::PlayerInput { jetpack: true }).await;

        for client in [&mut first, &mut second] {
            assert_eq!(
                client
                    .recv_until(|p| matches!(p, Packet::PlayerDeath { .. }))
                    .await,
                Packet::PlayerDeath { player_id: 1 }
            );
            assert_eq!(
                client.recv_until(is_game_over).await,
                Packet::GameOver { winner: Some(2) }
            );
            client.expect_closed().await;
        }
    }

    #[tokio::test]
    async fn disconnect_mid_match_ends_without_winner() {
        let row = "_".repeat(30);
        let server = TestServer::start(&format!("{row}\n{row}\n")).await;
        let (first, mut second) = start_match(server.addr).await;

        drop(first);

        assert_eq!(
            second.recv_until(is_game_over).await,
            Packet::GameOver { winner: None }
        );
        second.expect_closed().await;
    }

    #[tokio::test]
    async fn disconnect_packet_closes_connection() {
        let server = TestServer::start("__________\n__________\n").await;

        let mut client = TestClient::connect(server.addr).await;
        client
            .recv_until(|p| matches!(p, Packet::MapData(_)))
            .await;
        client.send(&Packet::PlayerDisconnect).await;
        client.expect_closed().await;
    }

    #[tokio::test]
    async fn server_resets_for_next_match() {
        let row = "_".repeat(26);
        let server = TestServer::start(&format!("___c{}\n{row}\n", &row[4..])).await;

        let (first, mut second) = start_match(server.addr).await;
        drop(first);
        second.recv_until(is_game_over).await;
        second.expect_closed().await;

        let mut first = TestClient::connect(server.addr).await;
        assert_eq!(
            first.recv().await,
            Packet::ConnectResponse {
                player_id: 1,
                player_count: 1
            }
        );
        match first.recv().await {
            Packet::MapData(map) => {
                assert_eq!(map.tile(3, 0), Some(shared::TileType::Coin));
                assert_eq!(map.coin_state(3, 0), Some(shared::CoinState::Available));
            }
            other => panic!("expected MAP_DATA, got {:?}", other),
        }

        let mut second = TestClient::connect(server.addr).await;
        second
            .recv_until(|p| matches!(p, Packet::GameStart { .. }))
            .await;
        first
            .recv_until(|p| matches!(p, Packet::GameStart { .. }))
            .await;
    }

    #[tokio::test]
    async fn coins_are_collected_once_per_player() {
        let server = TestServer::start("__c_______\n__c_______\n").await;
        let (mut first, mut second) = start_match(server.addr).await;

        // Both players run the same line, so player 1 always reaches a coin
        // first within the tick and player 2 clears it.
        let mut pickups = Vec::new();
        loop {
            match first.recv().await {
                Packet::CoinCollected {
                    player_id,
                    x,
                    y,
                    score,
                    coin_state,
                } => pickups.push((player_id, x, y, score, coin_state)),
                Packet::GameOver { winner } => {
                    assert_eq!(winner, None);
                    break;
                }
                _ => {}
            }
        }

        assert!(!pickups.is_empty());
        assert_eq!(pickups.len() % 2, 0);
        for (n, pair) in pickups.chunks(2).enumerate() {
            let (p1, x1, y1, score1, state1) = pair[0];
            let (p2, x2, y2, score2, state2) = pair[1];
            assert_eq!((p1, p2), (1, 2));
            assert_eq!((x1, y1), (x2, y2));
            assert_eq!(x1, 2);
            assert_eq!(state1, CoinState::CollectedByP1);
            assert_eq!(state2, CoinState::CollectedByBoth);
            assert_eq!((score1, score2), (n as u8 + 1, n as u8 + 1));
        }

        // The other player saw the same pickups.
        let seen = second
            .recv_until(|p| matches!(p, Packet::CoinCollected { .. }))
            .await;
        let (player_id, x, y, score, coin_state) = pickups[0];
        assert_eq!(
            seen,
            Packet::CoinCollected {
                player_id,
                x,
                y,
                score,
                coin_state
            }
        );
    }

    #[tokio::test]
    async fn both_finishing_ends_match() {
        let server = TestServer::start("___\n___\n").await;
        let (mut first, mut second) = start_match(server.addr).await;

        // Equal scores, so nobody wins.
        for client in [&mut first, &mut second] {
            assert_eq!(
                client.recv_until(is_game_over).await,
                Packet::GameOver { winner: None }
            );
        }
    }
}
