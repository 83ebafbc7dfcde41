use shared::MapLoadError;
use std::io;

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("socket error: {0}")]
    Socket(#[from] io::Error),

    #[error("map loader error: {0}")]
    MapLoad(#[from] MapLoadError),
}

/// Why a packet did not reach a client.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("client not connected")]
    NotConnected,

    #[error("write failed: {0}")]
    Io(#[from] io::Error),

    #[error("partial write of {written} of {len} bytes")]
    Partial { written: usize, len: usize },
}

impl SendError {
    /// The peer holds a truncated packet and can no longer frame the stream.
    pub fn breaks_stream(&self) -> bool {
        matches!(self, SendError::Partial { .. })
    }
}
