use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One open port reported by the port scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortFinding {
    pub port: u16,
    pub protocol: String,
    pub state: String,
    pub service: String,
    pub version: String,
}

/// One injectable parameter reported by the SQL-injection scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlFinding {
    pub vulnerability_type: String,
    pub parameter: String,
    pub payload: String,
    pub description: String,
}

/// One issue reported by the web-vulnerability scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebFinding {
    pub osvdb_id: String,
    pub method: String,
    pub uri: String,
    pub description: String,
}

/// Derived counts attached by the producer once all scanners finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub total_open_ports: usize,
    pub sql_vulnerabilities: usize,
    pub web_vulnerabilities: usize,
    pub scan_completed: String,
}

impl ScanSummary {
    /// Count the findings of a record, stamping the completion time as now.
    pub fn from_findings(record: &ScanRecord) -> Self {
        Self {
            total_open_ports: record.port_findings.len(),
            sql_vulnerabilities: record.sql_findings.len(),
            web_vulnerabilities: record.web_findings.len(),
            scan_completed: now_iso8601(),
        }
    }
}

/// The unified document a scan producer submits.
///
/// The service stores submissions as raw JSON objects, so this type is the
/// producer-side view of the shape. Finding lists keep the scanner names
/// as their wire keys. Fields the model does not know about are carried in
/// `extra` and survive a decode/encode cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
    pub target: String,
    pub timestamp: String,
    #[serde(rename = "nmap", default)]
    pub port_findings: Vec<PortFinding>,
    #[serde(rename = "sqlmap", default)]
    pub sql_findings: Vec<SqlFinding>,
    #[serde(rename = "nikto", default)]
    pub web_findings: Vec<WebFinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ScanSummary>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScanRecord {
    /// Start an empty record for `target`, timestamped now.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            scan_id: None,
            target: target.into(),
            timestamp: now_iso8601(),
            port_findings: Vec::new(),
            sql_findings: Vec::new(),
            web_findings: Vec::new(),
            summary: None,
            extra: Map::new(),
        }
    }

    pub fn with_scan_id(mut self, scan_id: impl Into<String>) -> Self {
        self.scan_id = Some(scan_id.into());
        self
    }

    /// Recompute `summary` from the current finding lists.
    pub fn summarize(&mut self) {
        self.summary = Some(ScanSummary::from_findings(self));
    }

    /// True when a summary is present and its counts match the findings.
    pub fn summary_consistent(&self) -> bool {
        match &self.summary {
            Some(s) => {
                s.total_open_ports == self.port_findings.len()
                    && s.sql_vulnerabilities == self.sql_findings.len()
                    && s.web_vulnerabilities == self.web_findings.len()
            }
            None => false,
        }
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Resolve the store key for a decoded submission.
///
/// String ids are used verbatim. Numeric and boolean ids use their JSON
/// text. A missing, null or empty id is replaced by `scan_<unix_seconds>`.
pub fn resolve_scan_id(document: &Map<String, Value>) -> String {
    match document.get("scan_id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        _ => synthesize_scan_id(),
    }
}

/// `scan_<unix_seconds>`. Two calls in the same second collide.
pub fn synthesize_scan_id() -> String {
    format!("scan_{}", Utc::now().timestamp())
}
