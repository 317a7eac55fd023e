//! sessiond-server - Agent session lifecycle server
//!
//! HTTP API in front of the per-session lifecycle actors, plus the
//! background alarm loop that drives them.

use anyhow::Context;
use clap::Parser;
use sessiond_core::clock::SystemClock;
use sessiond_core::notifier::{HttpNotifier, NoopNotifier, Notifier};
use sessiond_core::session::{ActorContext, SessionPolicy};
use sessiond_core::{Database, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod config;
mod error;
mod routes;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("sessiond_server=info".parse()?)
                .add_directive("sessiond_core=info".parse()?),
        )
        .init();

    info!("sessiond-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let args = cli::Args::parse();
    let mut config = config::Config::load(args.data_dir.clone())?;
    args.apply(&mut config);
    info!("Config loaded from {:?}", config.config_path);

    let db = Arc::new(
        Database::open_path(&config.database_path)
            .with_context(|| format!("Failed to open database {:?}", config.database_path))?,
    );
    info!("Database opened at {:?}", config.database_path);

    let notifier = build_notifier(&config)?;
    let ctx = ActorContext::new(db, notifier, Arc::new(SystemClock)).with_policy(SessionPolicy {
        prompt_max_duration: config.session.prompt_max_duration,
    });

    let registry = SessionRegistry::new(ctx);
    registry.recover()?;
    let alarm_loop = registry.spawn_alarm_loop();

    let bind = config.bind.clone();
    let state = state::AppState::new(config, registry);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    alarm_loop.abort();
    info!("Shutdown complete");

    Ok(())
}

/// Control-plane notifier from configuration
fn build_notifier(config: &config::Config) -> anyhow::Result<Arc<dyn Notifier>> {
    let Some(url) = &config.control_plane.url else {
        warn!("No control plane URL configured, session-over notifications are disabled");
        return Ok(Arc::new(NoopNotifier));
    };

    let token = config.control_plane_token()?.unwrap_or_default();
    if token.is_empty() {
        warn!("No control plane token configured, notifications will be unauthenticated");
    }

    let notifier = HttpNotifier::new(
        url,
        token,
        Duration::from_millis(config.control_plane.timeout_ms),
    )?;
    info!("Control plane notifications go to {}", notifier.endpoint());

    Ok(Arc::new(notifier))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down...");
}
