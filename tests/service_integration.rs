//! End-to-end tests: supervisor running both listeners, producer on TCP, consumer on HTTP.

use std::sync::Arc;

use serde_json::{json, Value};

use scan_relay::cli::fetch::fetch_scans;
use scan_relay::config::{ListenerConfig, RelayConfig};
use scan_relay::error::RelayError;
use scan_relay::ipc::socket_client::IngestClient;
use scan_relay::store::ResultStore;
use scan_relay::supervisor::{RunningServices, ServiceKind, ServiceSupervisor};

fn loopback_config() -> RelayConfig {
    RelayConfig {
        ingest: ListenerConfig::new("127.0.0.1", 0),
        web: ListenerConfig::new("127.0.0.1", 0),
        ..Default::default()
    }
}

async fn start() -> RunningServices {
    ServiceSupervisor::new(loopback_config(), Arc::new(ResultStore::new()))
        .start()
        .await
        .unwrap()
}

fn base_url(services: &RunningServices) -> String {
    format!("http://{}", services.web_addr())
}

#[tokio::test]
async fn submitted_record_is_served_over_http() {
    let services = start().await;
    let doc = json!({
        "scan_id": "s1",
        "target": "10.0.0.1",
        "timestamp": "2024-05-01T12:00:00",
        "nmap": [{"port": 80, "protocol": "tcp", "state": "open", "service": "http", "version": "Apache"}],
        "sqlmap": [],
        "nikto": [],
        "summary": {
            "total_open_ports": 1,
            "sql_vulnerabilities": 0,
            "web_vulnerabilities": 0,
            "scan_completed": "2024-05-01T12:05:00"
        }
    });

    let ack = IngestClient::new(services.ingest_addr(), 5)
        .submit_value(&doc)
        .await
        .unwrap();
    assert_eq!(ack.scan_id.as_deref(), Some("s1"));

    let body = fetch_scans(&base_url(&services), Some("s1")).await.unwrap();
    assert_eq!(body, json!({"status": "success", "scan": doc}));

    services.shutdown().await.unwrap();
}

#[tokio::test]
async fn snapshot_count_tracks_submissions() {
    let services = start().await;
    let client = IngestClient::new(services.ingest_addr(), 5);

    for id in ["c", "a", "b"] {
        client
            .submit_value(&json!({"scan_id": id, "target": id}))
            .await
            .unwrap();
    }
    // Malformed submission must not change the count.
    assert!(matches!(
        client.submit_bytes(b"{oops").await,
        Err(RelayError::Rejected { .. })
    ));

    let body = fetch_scans(&base_url(&services), None).await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["scans"].as_object().unwrap().len(), 3);

    services.shutdown().await.unwrap();
}

#[tokio::test]
async fn miss_over_http_is_200() {
    let services = start().await;

    let response = reqwest::get(format!("{}/api/scans/nope", base_url(&services)))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "error", "message": "Scan not found"}));

    let response = reqwest::get(format!("{}/missing", base_url(&services)))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(matches!(
        fetch_scans(&format!("{}/missing", base_url(&services)), None).await,
        Err(RelayError::Api { status: 404, .. })
    ));

    services.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_lose_nothing() {
    const M: usize = 50;
    let services = start().await;
    let ingest_addr = services.ingest_addr();

    let mut tasks = Vec::new();
    for i in 0..M {
        tasks.push(tokio::spawn(async move {
            IngestClient::new(ingest_addr, 10)
                .submit_value(&json!({"scan_id": format!("p{i}"), "target": "10.1.1.1"}))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let body = fetch_scans(&base_url(&services), None).await.unwrap();
    let scans = body["scans"].as_object().unwrap();
    assert_eq!(scans.len(), M);
    assert!((0..M).all(|i| scans.contains_key(&format!("p{i}"))));

    services.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_releases_both_ports() {
    let services = start().await;
    let ingest_addr = services.ingest_addr();
    let web_addr = services.web_addr();

    services.shutdown().await.unwrap();

    assert!(tokio::net::TcpListener::bind(ingest_addr).await.is_ok());
    assert!(tokio::net::TcpListener::bind(web_addr).await.is_ok());
}

#[tokio::test]
async fn bind_conflict_fails_start() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = taken.local_addr().unwrap().port();

    let config = RelayConfig {
        web: ListenerConfig::new("127.0.0.1", port),
        ..loopback_config()
    };
    let result = ServiceSupervisor::new(config, Arc::new(ResultStore::new()))
        .start()
        .await;
    assert!(matches!(result, Err(RelayError::Bind { .. })));
}

#[tokio::test]
async fn wait_reports_each_service_once() {
    let mut services = start().await;
    let ingest_addr = services.ingest_addr();

    // Stop only the HTTP side; ingestion keeps working.
    services.shutdown_service(ServiceKind::Web);

    let (kind, result) = services.wait().await.unwrap();
    assert_eq!(kind, ServiceKind::Web);
    assert!(result.is_ok());

    let ack = IngestClient::new(ingest_addr, 5)
        .submit_value(&json!({"scan_id": "still-up"}))
        .await
        .unwrap();
    assert!(ack.is_success());

    services.shutdown().await.unwrap();
}
