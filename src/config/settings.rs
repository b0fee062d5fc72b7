use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::sync::Semaphore;

use super::{DEFAULT_HOST, DEFAULT_INGEST_PORT, DEFAULT_WEB_PORT};
use crate::error::{RelayError, Result};

/// Top-level service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// TCP endpoint that receives scan records.
    #[serde(default = "ListenerConfig::ingest_default")]
    pub ingest: ListenerConfig,

    /// HTTP endpoint that serves scan records.
    #[serde(default = "ListenerConfig::web_default")]
    pub web: ListenerConfig,

    /// Optional bounds on ingestion connections. All unset by default.
    #[serde(default)]
    pub limits: IngestLimits,

    /// Append logs to this file in addition to stderr.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ingest: ListenerConfig::ingest_default(),
            web: ListenerConfig::web_default(),
            limits: IngestLimits::default(),
            log_file: None,
        }
    }
}

/// A host/port pair to listen on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl ListenerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn ingest_default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_INGEST_PORT)
    }

    fn web_default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_WEB_PORT)
    }

    /// Resolve to the first socket address the host name maps to.
    pub async fn resolve(&self) -> Result<SocketAddr> {
        let display = format!("{}:{}", self.host, self.port);
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| RelayError::Address {
                addr: display.clone(),
                reason: e.to_string(),
            })?;
        addrs.next().ok_or_else(|| RelayError::Address {
            addr: display,
            reason: "host resolved to no addresses".into(),
        })
    }
}

/// Hardening knobs for the ingestion listener.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestLimits {
    /// Connections handled at once. Unbounded when unset.
    #[serde(default)]
    pub max_connections: Option<usize>,

    /// Deadline for reading a whole submission. No deadline when unset.
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,

    /// Largest accepted submission. Unlimited when unset.
    #[serde(default)]
    pub max_payload_bytes: Option<u64>,
}

impl RelayConfig {
    /// Load config from a YAML file. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| RelayError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply `SCAN_RELAY_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; `apply_env` uses the environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SCAN_RELAY_SOCKET_HOST") {
            self.ingest.host = v;
        }
        if let Some(v) = lookup("SCAN_RELAY_SOCKET_PORT") {
            self.ingest.port = parse_port("SCAN_RELAY_SOCKET_PORT", &v)?;
        }
        if let Some(v) = lookup("SCAN_RELAY_WEB_HOST") {
            self.web.host = v;
        }
        if let Some(v) = lookup("SCAN_RELAY_WEB_PORT") {
            self.web.port = parse_port("SCAN_RELAY_WEB_PORT", &v)?;
        }
        Ok(())
    }

    /// Reject configurations that cannot start.
    pub fn validate(&self) -> Result<()> {
        if self.ingest.port != 0
            && self.ingest.port == self.web.port
            && self.ingest.host == self.web.host
        {
            return Err(RelayError::InvalidConfig {
                reason: format!(
                    "ingest and web listeners both use {}:{}",
                    self.web.host, self.web.port
                ),
            });
        }
        if let Some(n) = self.limits.max_connections {
            if n == 0 || n > Semaphore::MAX_PERMITS {
                return Err(RelayError::InvalidConfig {
                    reason: format!(
                        "max_connections must be between 1 and {}, got {}",
                        Semaphore::MAX_PERMITS,
                        n
                    ),
                });
            }
        }
        if self.limits.read_timeout_secs == Some(0) {
            return Err(RelayError::InvalidConfig {
                reason: "read_timeout_secs must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| RelayError::InvalidConfig {
            reason: format!("{key} is not a valid port: {value:?}"),
        })
}
