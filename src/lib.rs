//! Receive normalized security-scan results over TCP and serve them over HTTP.
//!
//! Producers push one JSON record per connection to the ingestion listener
//! ([`ipc::socket_server::IngestListener`]). Records land in a shared
//! [`store::ResultStore`] and are read back through the HTTP API built by
//! [`http::router`]. [`supervisor::ServiceSupervisor`] runs both listeners.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod ipc;
pub mod logging;
pub mod record;
pub mod store;
pub mod supervisor;
