//! Process configuration for the server and the client.
//!
//! Both structs have complete defaults and may be overlaid from a JSON file;
//! missing fields keep their default.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::keys::{DEFAULT_PUBLIC_KEY_PATH, DEFAULT_SECRET_KEY_PATH};
use crate::protocol::DEFAULT_MAX_FRAME_BYTES;

pub const DEFAULT_PORT: u16 = 6774;
pub const DEFAULT_IO_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub public_key_path: PathBuf,
    pub max_request_bytes: usize,
    pub io_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            public_key_path: PathBuf::from(DEFAULT_PUBLIC_KEY_PATH),
            max_request_bytes: DEFAULT_MAX_FRAME_BYTES,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    pub fn addr(&self) -> String {
        host_port(&self.bind, self.port)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub secret_key_path: PathBuf,
    pub max_reply_bytes: usize,
    pub io_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            secret_key_path: PathBuf::from(DEFAULT_SECRET_KEY_PATH),
            max_reply_bytes: DEFAULT_MAX_FRAME_BYTES,
            io_timeout_secs: DEFAULT_IO_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    /// Client config pointing at an already bound server address.
    pub fn for_addr(addr: SocketAddr, secret_key_path: impl Into<PathBuf>) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
            secret_key_path: secret_key_path.into(),
            ..Self::default()
        }
    }

    pub fn addr(&self) -> String {
        host_port(&self.host, self.port)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

/// `host:port`, with IPv6 literals bracketed.
fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let unreadable = |reason: String| ConfigError::Unreadable {
        path: path.display().to_string(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|err| unreadable(err.to_string()))?;
    let config = serde_json::from_str(&text).map_err(|err| unreadable(err.to_string()))?;
    Ok(config)
}
