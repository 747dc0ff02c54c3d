//! Battalion server
//!
//! Startup order matters: matches left mid-game by a previous process are
//! restored into live sessions before the clock sweeper starts, so a player
//! whose time ran out while the server was down loses on the first sweep.
//! Only then does the listener accept lobby, command and view traffic.

mod app;
mod config;
mod game;
mod http;
mod store;
mod util;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::SessionRegistry;
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config.log_level);
    init_server_time();

    let backend = if config.supabase.is_some() { "supabase" } else { "memory" };
    info!(addr = %config.server_addr, backend, "Battalion server starting");

    let state = AppState::new(config.clone());
    restore_sessions(&state.sessions, config.clock_sweep_interval).await?;

    let listener = TcpListener::bind(config.server_addr).await?;
    info!(addr = %config.server_addr, "Accepting lobby, match and /ws traffic");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Battalion server stopped");
    Ok(())
}

/// Brings unfinished matches back to life, then hands clock expiry to the sweeper.
async fn restore_sessions(
    sessions: &Arc<SessionRegistry>,
    sweep_every: Duration,
) -> anyhow::Result<()> {
    let resumed = sessions.resume_unfinished().await?;
    if resumed > 0 {
        info!(resumed, "Restored unfinished matches");
    }

    let sweeper = sessions.clone();
    tokio::spawn(async move { sweeper.run_clock_sweeper(sweep_every).await });
    info!(every_ms = sweep_every.as_millis() as u64, "Clock sweeper running");
    Ok(())
}

fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM. In-flight commands finish; live sessions are
/// already persisted after every applied command, so nothing is flushed here.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, draining connections"),
        _ = terminate => info!("SIGTERM received, draining connections"),
    }
}
