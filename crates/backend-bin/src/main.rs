// ============================
// formgate-backend-bin/src/main.rs
// ============================
//! Tokio / Axum entry‑point for the formgate server.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use formgate_backend_lib::{
    auth::hash_password,
    config::{LogFormat, Settings},
    router::create_router,
    AppState,
};

#[derive(Debug, Parser)]
#[command(name = "formgate", version, about = "Form-login security front")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Configuration file; defaults to ./formgate.toml when present
        #[arg(short, long, env = "FORMGATE_CONFIG")]
        config: Option<PathBuf>,
        /// Override the configured listen address
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Print the scrypt hash of a password for the `users` table
    HashPassword {
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve {
        config: None,
        bind: None,
    }) {
        Command::Serve { config, bind } => serve(config, bind).await,
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
            Ok(())
        },
    }
}

async fn serve(config: Option<PathBuf>, bind: Option<SocketAddr>) -> anyhow::Result<()> {
    let mut settings = match &config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if let Some(bind) = bind {
        settings.bind_addr = bind;
    }
    init_tracing(&settings);

    let state = Arc::new(AppState::new(&settings)?);
    let background = state.spawn_background_tasks();
    let app = create_router(state);

    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    info!(addr = %settings.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for task in background {
        task.abort();
    }
    info!("server stopped");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let json = settings.log_format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
