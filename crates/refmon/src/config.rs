//! Monitor configuration.
//!
//! Durations are carried as millisecond fields so a JSON config file stays
//! flat; accessors hand out `Duration` values.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::GamePhase;

/// Well-known port the controller broadcasts on, also used for answers.
pub const DEFAULT_PORT: u16 = 3838;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Address the receiver binds; the controller broadcasts to this port.
    pub listen_addr: SocketAddr,
    /// Port acks are sent back to on the packet's source address.
    pub answer_port: u16,
    pub team: u8,
    pub player: u8,
    /// Ack message byte requests manual penalization when set.
    pub man_penalize: bool,
    pub recv_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Grace window between the graceful signal and the forced kill.
    pub grace_timeout_ms: u64,
    /// Final bounded wait to reap a killed child.
    pub reap_timeout_ms: u64,
    pub latency_capacity: usize,
    /// Raw primary-state value to executable. Absent entries mean Idle.
    pub scripts: HashMap<u8, PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            answer_port: DEFAULT_PORT,
            team: 1,
            player: 1,
            man_penalize: true,
            recv_timeout_ms: 500,
            poll_interval_ms: 100,
            grace_timeout_ms: 1000,
            reap_timeout_ms: 1000,
            latency_capacity: 1000,
            scripts: HashMap::new(),
        }
    }
}

impl MonitorConfig {
    /// Load from a JSON file; absent fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_answer_port(mut self, port: u16) -> Self {
        self.answer_port = port;
        self
    }

    pub fn with_identity(mut self, team: u8, player: u8) -> Self {
        self.team = team;
        self.player = player;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_grace_timeout(mut self, timeout: Duration) -> Self {
        self.grace_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_reap_timeout(mut self, timeout: Duration) -> Self {
        self.reap_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_latency_capacity(mut self, capacity: usize) -> Self {
        self.latency_capacity = capacity;
        self
    }

    /// Map a game phase to the executable run while that phase is active.
    pub fn with_script(mut self, phase: GamePhase, path: impl Into<PathBuf>) -> Self {
        self.scripts.insert(phase.raw(), path.into());
        self
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace_timeout(&self) -> Duration {
        Duration::from_millis(self.grace_timeout_ms)
    }

    pub fn reap_timeout(&self) -> Duration {
        Duration::from_millis(self.reap_timeout_ms)
    }
}
