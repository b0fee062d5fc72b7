use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{RelayConfig, CONFIG_ENV};
use crate::error::{RelayError, Result};
use crate::store::ResultStore;
use crate::supervisor::ServiceSupervisor;

/// Command-line overrides for `serve`. Unset fields keep the configured value.
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    pub config: Option<PathBuf>,
    pub socket_host: Option<String>,
    pub socket_port: Option<u16>,
    pub web_host: Option<String>,
    pub web_port: Option<u16>,
    pub log_file: Option<PathBuf>,
}

impl ServeOptions {
    /// Defaults, then the YAML file, then `SCAN_RELAY_*` variables, then flags.
    pub fn resolve_config(&self) -> Result<RelayConfig> {
        let path = self
            .config
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) if !path.exists() => {
                return Err(RelayError::InvalidConfig {
                    reason: format!("config file not found: {}", path.display()),
                });
            }
            Some(path) => RelayConfig::load_from(&path)?,
            None => RelayConfig::default(),
        };
        config.apply_env()?;
        self.apply_flags(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply_flags(&self, config: &mut RelayConfig) {
        if let Some(host) = &self.socket_host {
            config.ingest.host = host.clone();
        }
        if let Some(port) = self.socket_port {
            config.ingest.port = port;
        }
        if let Some(host) = &self.web_host {
            config.web.host = host.clone();
        }
        if let Some(port) = self.web_port {
            config.web.port = port;
        }
        if let Some(path) = &self.log_file {
            config.log_file = Some(path.clone());
        }
    }
}

/// Run both services until Ctrl+C.
pub async fn run_serve(opts: ServeOptions) -> Result<()> {
    let config = opts.resolve_config()?;
    crate::logging::init(config.log_file.as_deref())?;

    let store = Arc::new(ResultStore::new());
    let mut services = ServiceSupervisor::new(config, store).start().await?;
    tracing::info!(
        ingest = %services.ingest_addr(),
        web = %services.web_addr(),
        "scan-relay running"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                break;
            }
            exited = services.wait() => match exited {
                Some((kind, Ok(()))) => tracing::warn!(service = %kind, "service stopped"),
                Some((kind, Err(e))) => {
                    tracing::error!(service = %kind, error = %e, "service failed");
                }
                None => break,
            },
        }
    }

    services.shutdown().await
}
