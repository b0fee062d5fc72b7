use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::{Notify, Semaphore};
use tracing::Instrument;

use crate::config::IngestLimits;
use crate::error::{RelayError, Result};
use crate::ipc::{IngestAck, READ_CHUNK_SIZE};
use crate::record::resolve_scan_id;
use crate::store::ResultStore;

const LISTEN_BACKLOG: u32 = 128;
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// What happened to a single ingestion connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Decoded and stored; a success ack was sent.
    Stored { scan_id: String },
    /// Not a JSON object (or over the payload limit); an error ack was sent.
    Rejected,
    /// The peer closed without sending anything; nothing was sent back.
    Empty,
}

/// TCP listener that accepts finished scan records from producers.
///
/// Each connection carries exactly one JSON document, terminated by the
/// peer shutting down its write side.
pub struct IngestListener {
    listener: TcpListener,
    store: Arc<ResultStore>,
    limits: IngestLimits,
    shutdown_signal: Arc<Notify>,
}

impl IngestListener {
    /// Bind `addr` with address reuse enabled. Use port 0 for an ephemeral port.
    pub async fn bind(
        addr: SocketAddr,
        store: Arc<ResultStore>,
        limits: IngestLimits,
    ) -> Result<Self> {
        let bind_err = |e: std::io::Error| RelayError::Bind {
            addr,
            reason: e.to_string(),
        };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_err)?;
        socket.set_reuseaddr(true).map_err(bind_err)?;
        socket.bind(addr).map_err(bind_err)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

        Ok(Self {
            listener,
            store,
            limits,
            shutdown_signal: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle that stops the accept loop when notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown_signal.clone()
    }

    /// Accept connections until shutdown. Each connection is handled in a spawned task.
    pub async fn serve(self) -> Result<()> {
        let local_addr = self.local_addr()?;
        tracing::info!(addr = %local_addr, "ingestion listener started");

        let limiter = self
            .limits
            .max_connections
            .map(|n| Arc::new(Semaphore::new(n.clamp(1, Semaphore::MAX_PERMITS))));
        let limits = Arc::new(self.limits.clone());
        let shutdown = self.shutdown_signal.clone();

        loop {
            let permit = match &limiter {
                Some(limiter) => tokio::select! {
                    permit = limiter.clone().acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => break,
                    },
                    _ = shutdown.notified() => break,
                },
                None => None,
            };

            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            tracing::info!(%peer, "connection accepted");
                            let store = self.store.clone();
                            let limits = limits.clone();
                            let span = tracing::info_span!("ingest", %peer);
                            tokio::spawn(
                                async move {
                                    let _permit = permit;
                                    match handle_connection(stream, &store, &limits).await {
                                        Ok(ConnectionOutcome::Stored { scan_id }) => {
                                            tracing::info!(%scan_id, "received scan results");
                                        }
                                        Ok(ConnectionOutcome::Rejected) => {
                                            tracing::error!("invalid JSON data");
                                        }
                                        Ok(ConnectionOutcome::Empty) => {
                                            tracing::debug!("empty submission, closing");
                                        }
                                        Err(e) => {
                                            tracing::error!(error = %e, "error handling client");
                                        }
                                    }
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "accept error");
                            // Usually fd exhaustion; let in-flight connections drain.
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
                _ = shutdown.notified() => break,
            }
        }

        tracing::info!(addr = %local_addr, "ingestion listener stopped");
        Ok(())
    }
}

/// Read one submission from `stream`, store it, and acknowledge it.
///
/// The stream is closed (dropped) by the caller in every case.
pub async fn handle_connection<S>(
    mut stream: S,
    store: &ResultStore,
    limits: &IngestLimits,
) -> Result<ConnectionOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let payload = match limits.read_timeout_secs {
        Some(timeout_secs) => tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            read_payload(&mut stream, limits.max_payload_bytes),
        )
        .await
        .map_err(|_| RelayError::IngestTimeout { timeout_secs })??,
        None => read_payload(&mut stream, limits.max_payload_bytes).await?,
    };

    let document = match payload {
        Payload::Empty => return Ok(ConnectionOutcome::Empty),
        Payload::Oversized => None,
        Payload::Complete(buf) => decode_document(&buf),
    };

    let (ack, outcome) = match document {
        Some(document) => {
            let scan_id = resolve_scan_id(&document);
            store.put(scan_id.clone(), Value::Object(document));
            (
                IngestAck::received(&scan_id),
                ConnectionOutcome::Stored { scan_id },
            )
        }
        None => (IngestAck::invalid_json(), ConnectionOutcome::Rejected),
    };

    let body = serde_json::to_vec(&ack)?;
    stream
        .write_all(&body)
        .await
        .map_err(|e| RelayError::Ingest {
            reason: format!("write failed: {}", e),
        })?;
    stream.shutdown().await.map_err(|e| RelayError::Ingest {
        reason: format!("shutdown failed: {}", e),
    })?;

    Ok(outcome)
}

enum Payload {
    Empty,
    Oversized,
    Complete(Vec<u8>),
}

/// Read fixed-size chunks until the peer closes its write side.
async fn read_payload<S>(stream: &mut S, max_bytes: Option<u64>) -> Result<Payload>
where
    S: AsyncRead + Unpin,
{
    let mut data = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        let n = stream.read(&mut chunk).await.map_err(|e| RelayError::Ingest {
            reason: format!("read failed: {}", e),
        })?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
        if max_bytes.is_some_and(|max| data.len() as u64 > max) {
            return Ok(Payload::Oversized);
        }
    }

    if data.is_empty() {
        Ok(Payload::Empty)
    } else {
        Ok(Payload::Complete(data))
    }
}

/// Decode a UTF-8 JSON object. Anything else is treated as invalid.
fn decode_document(buf: &[u8]) -> Option<Map<String, Value>> {
    let text = std::str::from_utf8(buf).ok()?;
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(document)) => Some(document),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "payload is not valid JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::duplex;
    use tokio_test::io::Builder;

    const INVALID_ACK: &[u8] = br#"{"status":"error","message":"Invalid JSON data"}"#;

    /// Write `payload`, close the write side, and collect the reply.
    async fn exchange(
        payload: &[u8],
        store: &ResultStore,
        limits: &IngestLimits,
    ) -> (ConnectionOutcome, Vec<u8>) {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(payload).await.unwrap();
        client.shutdown().await.unwrap();

        let outcome = handle_connection(server, store, limits).await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        (outcome, reply)
    }

    #[tokio::test]
    async fn test_stores_and_acknowledges() {
        let store = ResultStore::new();
        let (outcome, reply) = exchange(
            br#"{"scan_id":"s1","target":"10.0.0.1"}"#,
            &store,
            &IngestLimits::default(),
        )
        .await;

        assert_eq!(
            outcome,
            ConnectionOutcome::Stored {
                scan_id: "s1".into()
            }
        );
        assert_eq!(
            reply,
            br#"{"status":"success","scan_id":"s1","message":"Results received successfully"}"#
        );
        assert_eq!(
            store.get("s1").unwrap(),
            json!({"scan_id": "s1", "target": "10.0.0.1"})
        );
    }

    #[tokio::test]
    async fn test_payload_larger_than_one_chunk() {
        let store = ResultStore::new();
        let description = "x".repeat(READ_CHUNK_SIZE * 3);
        let doc = json!({"scan_id": "big", "nikto": [{"description": description}]});
        let payload = serde_json::to_vec(&doc).unwrap();

        let (outcome, _) = exchange(&payload, &store, &IngestLimits::default()).await;
        assert_eq!(
            outcome,
            ConnectionOutcome::Stored {
                scan_id: "big".into()
            }
        );
        assert_eq!(store.get("big").unwrap(), doc);
    }

    #[tokio::test]
    async fn test_invalid_json_gets_error_ack() {
        let store = ResultStore::new();
        let (outcome, reply) = exchange(b"{not json", &store, &IngestLimits::default()).await;

        assert_eq!(outcome, ConnectionOutcome::Rejected);
        assert_eq!(reply, INVALID_ACK);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_gets_error_ack() {
        let store = ResultStore::new();
        let (outcome, reply) =
            exchange(&[0x7b, 0xff, 0xfe, 0x7d], &store, &IngestLimits::default()).await;

        assert_eq!(outcome, ConnectionOutcome::Rejected);
        assert_eq!(reply, INVALID_ACK);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_non_object_document_rejected() {
        let store = ResultStore::new();
        let (outcome, reply) = exchange(b"[1, 2, 3]", &store, &IngestLimits::default()).await;

        assert_eq!(outcome, ConnectionOutcome::Rejected);
        assert_eq!(reply, INVALID_ACK);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_empty_payload_sends_nothing() {
        let store = ResultStore::new();
        let (outcome, reply) = exchange(b"", &store, &IngestLimits::default()).await;

        assert_eq!(outcome, ConnectionOutcome::Empty);
        assert!(reply.is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_payload_rejected() {
        let store = ResultStore::new();
        let limits = IngestLimits {
            max_payload_bytes: Some(8),
            ..Default::default()
        };
        // Rejected as soon as the limit is crossed, before end of stream.
        let mock = Builder::new()
            .read(br#"{"scan_id":"too-long"}"#)
            .write(INVALID_ACK)
            .build();

        let outcome = handle_connection(mock, &store, &limits).await.unwrap();
        assert_eq!(outcome, ConnectionOutcome::Rejected);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_read_error_is_reported() {
        let store = ResultStore::new();
        let mock = Builder::new()
            .read(br#"{"scan_id":"#)
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            ))
            .build();

        let result = handle_connection(mock, &store, &IngestLimits::default()).await;
        assert!(matches!(result, Err(RelayError::Ingest { .. })));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_peer_times_out() {
        let store = ResultStore::new();
        let limits = IngestLimits {
            read_timeout_secs: Some(1),
            ..Default::default()
        };
        // The write side is never closed.
        let (mut client, server) = duplex(1024);
        client.write_all(br#"{"scan_id":"slow""#).await.unwrap();

        let result = handle_connection(server, &store, &limits).await;
        assert!(matches!(
            result,
            Err(RelayError::IngestTimeout { timeout_secs: 1 })
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_connection_limit_still_serves() {
        let store = Arc::new(ResultStore::new());
        let limits = IngestLimits {
            max_connections: Some(usize::MAX),
            ..Default::default()
        };
        let listener = IngestListener::bind("127.0.0.1:0".parse().unwrap(), store.clone(), limits)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = listener.shutdown_handle();
        let task = tokio::spawn(listener.serve());

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client.write_all(br#"{"scan_id":"wide"}"#).await.unwrap();
        client.shutdown().await.unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        let ack: IngestAck = serde_json::from_slice(&reply).unwrap();
        assert_eq!(ack, IngestAck::received("wide"));

        shutdown.notify_one();
        task.await.unwrap().unwrap();
        assert!(store.get("wide").is_some());
    }
}
