//! Outbound packet delivery.

use crate::client_manager::{ClientId, ClientManager};
use log::{debug, warn};
use shared::Packet;

/// Formats bytes as space separated uppercase hex pairs.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Encodes packets and writes them to one or all connected clients.
///
/// A client that cannot keep up simply misses that packet. A client that
/// received only part of a packet is remembered until [`take_broken`]
/// collects it for disconnection.
///
/// [`take_broken`]: Broadcaster::take_broken
#[derive(Debug, Default)]
pub struct Broadcaster {
    debug: bool,
    broken: Vec<ClientId>,
}

impl Broadcaster {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            broken: Vec::new(),
        }
    }

    /// Returns true if the whole packet was written.
    pub fn send_to(
        &mut self,
        clients: &ClientManager,
        client_id: ClientId,
        packet: &Packet,
    ) -> bool {
        self.send_bytes(clients, client_id, &packet.encode())
    }

    /// Sends `packet` to every connected client in connection order.
    ///
    /// Returns how many clients received it.
    pub fn broadcast(&mut self, clients: &ClientManager, packet: &Packet) -> usize {
        let bytes = packet.encode();
        clients
            .client_ids()
            .into_iter()
            .filter(|&client_id| self.send_bytes(clients, client_id, &bytes))
            .count()
    }

    /// Clients whose streams were cut mid-packet since the last call.
    pub fn take_broken(&mut self) -> Vec<ClientId> {
        std::mem::take(&mut self.broken)
    }

    fn send_bytes(&mut self, clients: &ClientManager, client_id: ClientId, bytes: &[u8]) -> bool {
        match clients.send(client_id, bytes) {
            Ok(()) => {
                if self.debug {
                    debug!(
                        "Sent {} bytes to client {}: {}",
                        bytes.len(),
                        client_id,
                        hex_dump(bytes)
                    );
                }
                true
            }
            Err(e) => {
                warn!("Failed to send to client {}: {}", client_id, e);
                if e.breaks_stream() && !self.broken.contains(&client_id) {
                    self.broken.push(client_id);
                }
                false
            }
        }
    }
}
