use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use scan_relay::cli;
use scan_relay::cli::serve::ServeOptions;
use scan_relay::config::{DEFAULT_INGEST_PORT, DEFAULT_WEB_PORT};

#[derive(Parser)]
#[command(name = "scan-relay", version, about = "Collect scan results over TCP and serve them over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion listener and the web server
    Serve {
        /// YAML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Ingestion listener host
        #[arg(long)]
        socket_host: Option<String>,
        /// Ingestion listener port
        #[arg(long)]
        socket_port: Option<u16>,
        /// Web server host
        #[arg(long)]
        web_host: Option<String>,
        /// Web server port
        #[arg(long)]
        web_port: Option<u16>,
        /// Also append logs to this file
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Push a scan record (JSON file) to an ingestion listener
    Submit {
        /// Path to the JSON record
        file: PathBuf,
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(long, default_value_t = DEFAULT_INGEST_PORT)]
        port: u16,
        /// Seconds to wait for the acknowledgment
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
    /// Query the web server's scan API
    Fetch {
        /// Base URL of the web server
        #[arg(long, default_value_t = format!("http://localhost:{DEFAULT_WEB_PORT}"))]
        url: String,
        /// Fetch a single scan instead of all of them
        #[arg(long)]
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    match args.command {
        Commands::Serve {
            config,
            socket_host,
            socket_port,
            web_host,
            web_port,
            log_file,
        } => {
            let opts = ServeOptions {
                config,
                socket_host,
                socket_port,
                web_host,
                web_port,
                log_file,
            };
            cli::serve::run_serve(opts).await.context("serve failed")?;
        }
        Commands::Submit {
            file,
            host,
            port,
            timeout,
        } => {
            cli::submit::run_submit(&file, &host, port, timeout)
                .await
                .with_context(|| format!("failed to submit {}", file.display()))?;
        }
        Commands::Fetch { url, id } => {
            cli::fetch::run_fetch(&url, id.as_deref())
                .await
                .with_context(|| format!("failed to fetch scans from {url}"))?;
        }
    }

    Ok(())
}
