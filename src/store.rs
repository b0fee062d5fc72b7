use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// Snapshot of every stored record, keyed by scan id.
pub type Snapshot = HashMap<String, Value>;

/// In-memory scan results, shared by the ingestion listener and the HTTP API.
///
/// Every operation takes the same lock and only touches the map while
/// holding it. Records are never evicted.
#[derive(Debug, Default)]
pub struct ResultStore {
    results: Mutex<HashMap<String, Value>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record stored under `scan_id`.
    pub fn put(&self, scan_id: impl Into<String>, record: Value) {
        let scan_id = scan_id.into();
        let replaced = {
            let mut results = self.results.lock().unwrap_or_else(|e| e.into_inner());
            results.insert(scan_id.clone(), record).is_some()
        };
        tracing::info!(scan_id = %scan_id, replaced, "added scan result");
    }

    pub fn get(&self, scan_id: &str) -> Option<Value> {
        let results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        results.get(scan_id).cloned()
    }

    /// Point-in-time copy of all records. Later writes do not affect it.
    pub fn list_all(&self) -> Snapshot {
        let results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        results.clone()
    }

    pub fn len(&self) -> usize {
        let results = self.results.lock().unwrap_or_else(|e| e.into_inner());
        results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
