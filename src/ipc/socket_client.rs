use std::net::SocketAddr;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{RelayError, Result};
use crate::ipc::IngestAck;
use crate::record::ScanRecord;

/// Largest acknowledgment the client will read.
const MAX_ACK_BYTES: u64 = 1_048_576;

/// Producer-side client for the ingestion listener.
pub struct IngestClient {
    addr: SocketAddr,
    timeout_secs: u64,
}

impl IngestClient {
    pub fn new(addr: SocketAddr, timeout_secs: u64) -> Self {
        Self { addr, timeout_secs }
    }

    /// Submit a typed record.
    pub async fn submit(&self, record: &ScanRecord) -> Result<IngestAck> {
        let payload = serde_json::to_vec(record)?;
        self.submit_bytes(&payload).await
    }

    /// Submit an arbitrary JSON document.
    pub async fn submit_value(&self, document: &Value) -> Result<IngestAck> {
        let payload = serde_json::to_vec(document)?;
        self.submit_bytes(&payload).await
    }

    /// Send raw bytes as one submission and wait for the acknowledgment.
    ///
    /// An `error` acknowledgment is returned as [`RelayError::Rejected`].
    pub async fn submit_bytes(&self, payload: &[u8]) -> Result<IngestAck> {
        let timeout = std::time::Duration::from_secs(self.timeout_secs);

        let result = tokio::time::timeout(timeout, async {
            let mut stream =
                TcpStream::connect(self.addr)
                    .await
                    .map_err(|e| RelayError::Ingest {
                        reason: format!("connect to {} failed: {}", self.addr, e),
                    })?;

            stream
                .write_all(payload)
                .await
                .map_err(|e| RelayError::Ingest {
                    reason: format!("write failed: {}", e),
                })?;
            // End of stream marks the end of the submission.
            stream.shutdown().await.map_err(|e| RelayError::Ingest {
                reason: format!("shutdown write failed: {}", e),
            })?;

            let mut response_buf = Vec::new();
            stream
                .take(MAX_ACK_BYTES)
                .read_to_end(&mut response_buf)
                .await
                .map_err(|e| RelayError::Ingest {
                    reason: format!("read failed: {}", e),
                })?;

            if response_buf.is_empty() {
                return Err(RelayError::Ingest {
                    reason: "connection closed without acknowledgment".into(),
                });
            }

            let ack: IngestAck =
                serde_json::from_slice(&response_buf).map_err(|e| RelayError::Ingest {
                    reason: format!("invalid acknowledgment JSON: {}", e),
                })?;

            Ok::<IngestAck, RelayError>(ack)
        })
        .await;

        match result {
            Ok(Ok(ack)) if ack.is_success() => Ok(ack),
            Ok(Ok(ack)) => Err(RelayError::Rejected {
                message: ack.message,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RelayError::IngestTimeout {
                timeout_secs: self.timeout_secs,
            }),
        }
    }
}
