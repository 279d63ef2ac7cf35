//! Storage proxy binary
//!
//! Serves the storage management API over HTTP and executes calls on the
//! configured host backend.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use std::path::PathBuf;
use std::sync::Arc;

use storage_proxy::config::{Backend, Config};
use storage_proxy::server::{http, ApiServers};

#[derive(Parser, Debug)]
#[command(name = "storage-proxy")]
#[command(about = "Host storage control-plane proxy", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Host backend (powershell or loopback), overrides the config file
    #[arg(long)]
    backend: Option<Backend>,

    /// Log level, overrides the config file
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(backend) = cli.backend {
        config.host.backend = backend;
    }
    if let Some(level) = cli.log_level {
        config.server.log_level = level;
    }
    config.validate()?;

    let level = config.server.log_level.as_str();
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    log::info!("Starting storage proxy");
    log::info!("  Bind address: {}", config.server.bind);
    log::info!("  Backend: {:?}", config.host.backend);
    log::info!("  Max request: {} bytes", config.server.max_request_bytes);

    let servers = ApiServers::from_config(&config);
    let dispatcher = servers.dispatcher(&config)?;
    let app = http::router(Arc::new(dispatcher), config.server.max_request_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    log::info!("Listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}
