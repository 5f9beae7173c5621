// ABOUTME: Cardbox server binary: loads configuration, wires dependencies, serves HTTP
// ABOUTME: Shuts down gracefully on SIGINT and SIGTERM

// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2026 Cardbox Project

//! Cardbox server entry point.

use anyhow::{Context, Result};
use cardbox::config::environment::ServerConfig;
use cardbox::database::Database;
use cardbox::routes::{build_router, AppState};
use cardbox::{logging, storage};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "cardbox-server",
    about = "Flashcard deck server with progress tracking",
    version
)]
struct Args {
    /// HTTP port to bind (overrides HTTP_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // fall back to defaults when argument parsing fails under odd launchers
    let args = Args::try_parse().unwrap_or_else(|e| {
        if e.kind() == clap::error::ErrorKind::DisplayHelp
            || e.kind() == clap::error::ErrorKind::DisplayVersion
        {
            e.exit();
        }
        eprintln!("warning: ignoring unrecognized arguments: {e}");
        Args { port: None }
    });

    let mut config = ServerConfig::from_env().context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.http_port = port;
    }

    logging::init_from_env(&config.log_level, &config.environment)?;
    info!("starting cardbox-server: {}", config.summary());

    let database = Database::new(&config.database.url)
        .await
        .context("failed to initialize database")?;
    let storage = storage::from_config(&config.storage)
        .await
        .context("failed to initialize deck storage")?;

    let port = config.http_port;
    let state = Arc::new(
        AppState::new(config, database, storage)
            .map_err(|e| anyhow::anyhow!("failed to build application state: {e}"))?,
    );
    let router = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Resolve when SIGINT or SIGTERM arrives
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
