//! Worker configuration loading.
//!
//! A worker reads `config/<hostname>-slave-config.json`:
//!
//! ```json
//! { "masters": [ { "hostname": "mill-1", "ip": "10.0.0.5", "port": 33310 } ] }
//! ```
//!
//! `ip` and `port` are optional; a missing port defaults to the cluster
//! port and a missing ip is resolved by name lookup. Failure to read or
//! parse the file is fatal at startup.

use crate::error::NodeError;
use gridmill_proto::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = "config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub masters: Vec<MasterTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterTarget {
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl MasterTarget {
    /// Resolves this target to a socket address, looking the hostname up
    /// when no explicit ip is configured.
    pub fn resolve(&self) -> Result<SocketAddr, NodeError> {
        let port = self.port.unwrap_or(DEFAULT_PORT);
        match &self.ip {
            Some(ip) => {
                let ip = ip
                    .parse()
                    .map_err(|_| NodeError::Resolve(self.hostname.clone()))?;
                Ok(SocketAddr::new(ip, port))
            }
            None => (self.hostname.as_str(), port)
                .to_socket_addrs()
                .map_err(|_| NodeError::Resolve(self.hostname.clone()))?
                .next()
                .ok_or_else(|| NodeError::Resolve(self.hostname.clone())),
        }
    }
}

/// `config/<hostname>-slave-config.json` under the working directory.
pub fn default_config_path() -> PathBuf {
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    PathBuf::from(CONFIG_DIR).join(format!("{}-slave-config.json", hostname))
}

pub fn load_worker_config(path: &Path) -> Result<WorkerConfig, NodeError> {
    let data = fs::read_to_string(path).map_err(|err| NodeError::Config {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })?;
    serde_json::from_str(&data).map_err(|err| NodeError::Config {
        path: path.to_path_buf(),
        detail: err.to_string(),
    })
}
