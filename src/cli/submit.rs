use std::path::Path;

use crate::config::ListenerConfig;
use crate::error::Result;
use crate::ipc::socket_client::IngestClient;

/// Push a scan record file to an ingestion listener and print the acknowledgment.
pub async fn run_submit(file: &Path, host: &str, port: u16, timeout_secs: u64) -> Result<()> {
    let payload = std::fs::read(file)?;
    let addr = ListenerConfig::new(host, port).resolve().await?;

    let client = IngestClient::new(addr, timeout_secs);
    let ack = client.submit_bytes(&payload).await?;

    println!("{}", serde_json::to_string_pretty(&ack)?);
    Ok(())
}
