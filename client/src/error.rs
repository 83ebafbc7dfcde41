use shared::ProtocolError;
use std::io;

/// Errors that end a client session.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("socket error: {0}")]
    Socket(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed by server")]
    ConnectionClosed,
}
