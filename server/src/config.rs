use shared::{MAX_CLIENTS, MIN_PLAYERS, TICK_MS};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings for one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub map_path: PathBuf,
    /// Hex-dump every packet sent and received.
    pub debug: bool,
    pub tick_duration: Duration,
    pub max_clients: usize,
    pub min_players: usize,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16, map_path: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            port,
            map_path: map_path.into(),
            debug: false,
            tick_duration: Duration::from_millis(TICK_MS),
            max_clients: MAX_CLIENTS,
            min_players: MIN_PLAYERS,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
