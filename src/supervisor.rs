use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::http::QueryService;
use crate::ipc::socket_server::IngestListener;
use crate::store::ResultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Ingest,
    Web,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Ingest => write!(f, "ingestion listener"),
            ServiceKind::Web => write!(f, "web server"),
        }
    }
}

/// Owns both listeners and the store they share.
pub struct ServiceSupervisor {
    config: RelayConfig,
    store: Arc<ResultStore>,
}

impl ServiceSupervisor {
    pub fn new(config: RelayConfig, store: Arc<ResultStore>) -> Self {
        Self { config, store }
    }

    /// Bind both listeners, then run each loop in its own task.
    ///
    /// Nothing is spawned unless both binds succeed.
    pub async fn start(self) -> Result<RunningServices> {
        let ingest_addr = self.config.ingest.resolve().await?;
        let web_addr = self.config.web.resolve().await?;

        let ingest =
            IngestListener::bind(ingest_addr, self.store.clone(), self.config.limits.clone())
                .await?;
        let web = QueryService::bind(web_addr, self.store.clone()).await?;

        let ingest_addr = ingest.local_addr()?;
        let web_addr = web.local_addr()?;
        let ingest_shutdown = ingest.shutdown_handle();
        let web_shutdown = web.shutdown_handle();

        let ingest_task = tokio::spawn(ingest.serve());
        let web_task = tokio::spawn(web.serve());

        Ok(RunningServices {
            ingest_addr,
            web_addr,
            ingest_shutdown,
            web_shutdown,
            ingest_task: Some(ingest_task),
            web_task: Some(web_task),
        })
    }
}

/// Handles to the two running service loops.
pub struct RunningServices {
    ingest_addr: SocketAddr,
    web_addr: SocketAddr,
    ingest_shutdown: Arc<Notify>,
    web_shutdown: Arc<Notify>,
    ingest_task: Option<JoinHandle<Result<()>>>,
    web_task: Option<JoinHandle<Result<()>>>,
}

impl RunningServices {
    pub fn ingest_addr(&self) -> SocketAddr {
        self.ingest_addr
    }

    pub fn web_addr(&self) -> SocketAddr {
        self.web_addr
    }

    /// Signal a single service to stop. The other one keeps running.
    pub fn shutdown_service(&self, kind: ServiceKind) {
        match kind {
            ServiceKind::Ingest => self.ingest_shutdown.notify_one(),
            ServiceKind::Web => self.web_shutdown.notify_one(),
        }
    }

    /// Wait for the next service loop to exit. Returns `None` once both have.
    ///
    /// The other loop keeps running; an exit is reported, not propagated.
    pub async fn wait(&mut self) -> Option<(ServiceKind, Result<()>)> {
        let (kind, joined) = match (self.ingest_task.as_mut(), self.web_task.as_mut()) {
            (Some(ingest), Some(web)) => tokio::select! {
                joined = ingest => (ServiceKind::Ingest, joined),
                joined = web => (ServiceKind::Web, joined),
            },
            (Some(ingest), None) => (ServiceKind::Ingest, ingest.await),
            (None, Some(web)) => (ServiceKind::Web, web.await),
            (None, None) => return None,
        };

        match kind {
            ServiceKind::Ingest => self.ingest_task = None,
            ServiceKind::Web => self.web_task = None,
        }
        Some((kind, flatten_join(kind, joined)))
    }

    /// Stop accepting on both listeners and wait for both loops to finish.
    ///
    /// Returns the first failure either loop reported.
    pub async fn shutdown(mut self) -> Result<()> {
        self.shutdown_service(ServiceKind::Ingest);
        self.shutdown_service(ServiceKind::Web);

        let mut first_err = None;
        for (kind, task) in [
            (ServiceKind::Ingest, self.ingest_task.take()),
            (ServiceKind::Web, self.web_task.take()),
        ] {
            let Some(task) = task else { continue };
            if let Err(e) = flatten_join(kind, task.await) {
                tracing::error!(service = %kind, error = %e, "service failed during shutdown");
                first_err.get_or_insert(e);
            }
        }

        tracing::info!("all services stopped");
        first_err.map_or(Ok(()), Err)
    }
}

fn flatten_join(
    kind: ServiceKind,
    joined: std::result::Result<Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(RelayError::Service {
            reason: format!("{} task failed: {}", kind, e),
        }),
    }
}
