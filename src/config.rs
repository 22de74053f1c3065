use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Network section: where and how the server listens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface to bind, e.g. "127.0.0.1". None binds every interface.
    pub interface: Option<String>,
    /// TCP port to listen on.
    pub port: u16,
    /// Listen backlog passed to the socket.
    pub listen: u32,
    /// Bind an IPv6 socket instead of IPv4 (mutually exclusive).
    pub ipv6: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: None,
            port: 8080,
            listen: 5,
            ipv6: false,
        }
    }
}

/// Resource limits consumed by the connection engine.
///
/// A zero value means "unlimited" for the max_* and cache fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum simultaneous clients; further accepts are dropped.
    pub max_clients: usize,
    /// Maximum connections assigned to one worker thread.
    pub clients_per_thread: usize,
    /// Worker threads the pool never shrinks below.
    pub thread_floor: usize,
    /// Maximum number of request header lines.
    pub max_headers: usize,
    /// Maximum length of a single header line, in bytes.
    pub max_header_line: usize,
    /// Maximum request body size, in bytes.
    pub max_content_length: usize,
    /// Idle timeout for a connection, in seconds.
    pub timeout_secs: u64,
    /// Idle timeout before an empty worker thread is reaped, in seconds.
    pub thread_timeout_secs: u64,
    /// Maximum number of entries in the mapped-file cache.
    pub cache_size: usize,
    /// Files at or above this size are never cached, in bytes.
    pub cache_max_file_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_clients: 0,
            clients_per_thread: 5,
            thread_floor: 0,
            max_headers: 64,
            max_header_line: 2048,
            max_content_length: 0,
            timeout_secs: 5,
            thread_timeout_secs: 2,
            cache_size: 64,
            cache_max_file_size: 0,
        }
    }
}

impl Limits {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn thread_timeout(&self) -> Duration {
        Duration::from_secs(self.thread_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub network: NetworkConfig,
    pub limits: Limits,
    /// Root directory served under /_www.
    pub www_root: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load from the path in the FOLIO_CONFIG env var, or defaults.
    pub fn load() -> Result<Self> {
        match std::env::var_os("FOLIO_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }
}
