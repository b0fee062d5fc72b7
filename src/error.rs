use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("invalid listen address {addr}: {reason}")]
    Address { addr: String, reason: String },

    #[error("ingest error: {reason}")]
    Ingest { reason: String },

    #[error("ingest timeout after {timeout_secs}s")]
    IngestTimeout { timeout_secs: u64 },

    #[error("submission rejected: {message}")]
    Rejected { message: String },

    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("service error: {reason}")]
    Service { reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error: status={status}, body={body}")]
    Api { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, RelayError>;
