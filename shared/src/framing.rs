//! Reassembles packets from a TCP byte stream.

use crate::error::ProtocolError;
use crate::protocol::{packet_size, Packet};

/// Accumulates received bytes and yields complete packets.
///
/// Partial packets stay buffered until the rest arrives. A packet that frames
/// correctly but fails to decode is consumed and reported, so the stream stays
/// aligned. An unknown type tag is reported without consuming anything: the
/// stream cannot be resynchronized and the owner should drop the connection.
#[derive(Debug)]
pub struct PacketBuffer {
    data: Vec<u8>,
    max_len: usize,
}

impl PacketBuffer {
    pub fn new(max_len: usize) -> Self {
        Self {
            data: Vec::new(),
            max_len,
        }
    }

    /// Appends received bytes, refusing to grow past the configured bound.
    pub fn extend(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let need = self.data.len() + bytes.len();
        if need > self.max_len {
            return Err(ProtocolError::BufferOverflow {
                need,
                max: self.max_len,
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Pops the next complete packet, or `Ok(None)` if more bytes are needed.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, ProtocolError> {
        let Some(size) = packet_size(&self.data)? else {
            return Ok(None);
        };
        let frame: Vec<u8> = self.data.drain(..size).collect();
        Packet::decode(&frame).map(Some)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
