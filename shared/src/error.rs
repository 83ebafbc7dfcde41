use std::io;
use std::path::PathBuf;

/// Failures while framing or decoding wire packets.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown packet type: {0:#04x}")]
    UnknownPacketType(u8),

    #[error("invalid {field} value: {value}")]
    InvalidField { field: &'static str, value: u8 },

    #[error("invalid {packet} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        packet: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("buffer overflow: need {need} bytes, max {max}")]
    BufferOverflow { need: usize, max: usize },

    #[error("malformed map payload: {0}")]
    Map(#[from] MapLoadError),
}

impl ProtocolError {
    /// True when the byte stream can no longer be split into packets.
    ///
    /// A connection that hits one of these must be dropped; anything else only
    /// costs the offending packet.
    pub fn breaks_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownPacketType(_) | ProtocolError::BufferOverflow { .. }
        )
    }
}

/// Failures while loading or validating a map.
#[derive(Debug, thiserror::Error)]
pub enum MapLoadError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("map contains no rows")]
    Empty,

    #[error("row {row} has length {found}, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("map is {width}x{height}, each dimension must be at most {max}")]
    TooLarge { width: usize, height: usize, max: usize },

    #[error("grid has {found} cells, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}
