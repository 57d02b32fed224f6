#![forbid(unsafe_code)]

//! `agent-foreman`: supervisor daemon for tmux-backed agent sessions.
//!
//! Bootstraps configuration and the database, reconciles the registry with
//! the live tmux sessions, starts the monitoring scheduler, and serves the
//! IPC socket for `agent-foreman-ctl`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use agent_foreman::clock::SystemClock;
use agent_foreman::config::GlobalConfig;
use agent_foreman::ipc::server::spawn_ipc_server;
use agent_foreman::persistence::db;
use agent_foreman::session::TmuxSessions;
use agent_foreman::state::AppState;
use agent_foreman::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-foreman", about = "Agent session supervisor daemon", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Do not start the monitoring scheduler, regardless of configuration.
    #[arg(long)]
    no_monitor: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("agent-foreman bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let config = Arc::new(GlobalConfig::load_from_path(&args.config)?);
    info!("configuration loaded");

    // ── Initialize database ─────────────────────────────
    let db = Arc::new(db::connect(&config.db_path).await?);
    info!(memory = config.is_memory_db(), "database connected");

    // ── Build shared application state ──────────────────
    let sessions = Arc::new(TmuxSessions::new(&config.session));
    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        db,
        sessions,
        Arc::new(SystemClock),
    ));

    // ── Heal agents whose sessions died while we were down ──
    match state
        .supervisor
        .reconcile()
        .instrument(info_span!("startup_reconcile"))
        .await
    {
        Ok(healed) if healed > 0 => warn!(healed, "agents without live sessions marked offline"),
        Ok(_) => info!("registry consistent with live sessions"),
        Err(err) => error!(%err, "startup reconciliation failed"),
    }

    // ── Start monitoring scheduler ──────────────────────
    if config.monitor.autostart && !args.no_monitor {
        state.monitor.start().await?;
    } else {
        info!("monitoring scheduler not started");
    }

    // ── Start IPC server ────────────────────────────────
    let ct = CancellationToken::new();
    let ipc_handle = spawn_ipc_server(Arc::clone(&state), ct.clone())?;
    info!("agent-foreman ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    if state.monitor.is_running().await {
        match state.monitor.stop().await {
            Ok(stats) => info!(
                ticks = stats.ticks,
                reminders_sent = stats.reminders_sent,
                errors = stats.errors,
                "monitoring scheduler stopped"
            ),
            Err(err) => error!(%err, "failed to stop monitoring scheduler"),
        }
    }

    if let Err(err) = ipc_handle.await {
        error!(%err, "ipc server task failed");
    }
    info!("agent-foreman shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
