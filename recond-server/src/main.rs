//! # Recond Server
//!
//! Backend for a security-reconnaissance dashboard.
//!
//! ## Overview
//!
//! - **Project API**: create projects and manage their target scope
//!   (wildcards, domains, out-of-scope entries) over HTTP
//! - **Recon jobs**: one cancellable, pausable multi-tool job per project,
//!   driven by start/pause/resume/stop messages over WebSocket
//! - **Live console**: job log lines and progress streamed to every
//!   connected session bound to the project

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recond_server::{
    infra::{app_state::AppState, config::Config},
    routes,
};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "recond-server")]
#[command(about = "Reconnaissance dashboard backend with live recon job streaming")]
struct Cli {
    /// Server host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Server port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Root directory for project scopes and tool results
    #[arg(long, env = "RECOND_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "recond_server=info,recond_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server_host = host;
    }
    if let Some(port) = cli.port {
        config.server_port = port;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    config
        .ensure_directories()
        .context("failed to create data directory")?;

    let state = AppState::new(config.clone());
    let router = routes::create_router(state);

    let listener =
        tokio::net::TcpListener::bind((config.server_host.as_str(), config.server_port))
            .await
            .with_context(|| {
                format!(
                    "failed to bind {}:{}",
                    config.server_host, config.server_port
                )
            })?;
    info!(
        "recond server listening on {}",
        listener.local_addr().context("no local address")?
    );

    axum::serve(listener, router).await.context("server error")?;
    Ok(())
}
