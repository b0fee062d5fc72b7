pub mod socket_client;
pub mod socket_server;

use serde::{Deserialize, Serialize};

/// Size of each read from an ingestion connection.
pub const READ_CHUNK_SIZE: usize = 4096;

pub const ACK_RECEIVED: &str = "Results received successfully";
pub const ACK_INVALID_JSON: &str = "Invalid JSON data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Error,
}

/// Reply written to a producer once its submission has been decoded (or not).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestAck {
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
    pub message: String,
}

impl IngestAck {
    pub fn received(scan_id: &str) -> Self {
        Self {
            status: AckStatus::Success,
            scan_id: Some(scan_id.to_string()),
            message: ACK_RECEIVED.to_string(),
        }
    }

    pub fn invalid_json() -> Self {
        Self {
            status: AckStatus::Error,
            scan_id: None,
            message: ACK_INVALID_JSON.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AckStatus::Success
    }
}
