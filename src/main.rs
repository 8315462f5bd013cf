mod api;
mod blueprint;
mod config;
mod error;
mod executor;
mod models;
mod paths;
mod services;
mod tracker;
mod workspace;

use crate::config::Config;
use crate::executor::TofuDriver;
use crate::services::Orchestrator;
use crate::tracker::{StatusStore, StatusTracker};
use crate::workspace::WorkspaceManager;
use api::{AppState, create_router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn run_server<F>(shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terrarium=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Starting terrarium with config: {:?}", config);

    std::fs::create_dir_all(&config.workspace_root)?;

    // Restore the running-status map before accepting requests
    let tracker = StatusTracker::load(StatusStore::new(&config.status_file))?;

    let workspaces = WorkspaceManager::new(&config.workspace_root, tracker.clone());
    let driver = TofuDriver::new(
        &config.tofu_path,
        config.timeouts.clone(),
        config.max_output_bytes,
    );
    let orchestrator = Orchestrator::new(
        tracker.clone(),
        workspaces,
        Arc::new(driver),
        config.templates_dir.clone(),
    );

    match orchestrator.engine_version().await {
        Ok(version) => tracing::info!("Engine: {}", version),
        Err(err) => tracing::warn!("Engine is not usable yet: {}", err),
    }

    let ready = Arc::new(AtomicBool::new(false));
    let state = AppState {
        orchestrator,
        ready: ready.clone(),
    };

    // Create router
    let app = create_router(state, config.auth.clone(), &config.allow_origins);
    let app = app.layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let addr = addr.parse::<SocketAddr>()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    ready.store(true, Ordering::Release);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    ready.store(false, Ordering::Release);
    tracing::info!("Server stopped, saving running status map");
    tracker.persist()?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_server(shutdown_signal()).await
}
