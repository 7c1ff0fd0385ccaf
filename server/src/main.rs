//! Coachline HTTP server.
//!
//! Reads configuration from the environment (and `.env`), wires the engine to
//! the selected storage backend and serves the API until SIGINT or SIGTERM.

mod config;

use anyhow::Context;
use axum::{routing::get, Router};
use coachline_postgres::{PostgresRegistry, PostgresStore};
use coachline_runtime::metrics::MetricsServer;
use coachline_runtime::{Collaborators, ReservationEngine};
use coachline_testing::{FleetSeed, InMemoryRegistry, InMemoryStore};
use coachline_web::{build_router, AppState};
use config::{Config, LogFormat, PostgresConfig, StorageBackend};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_ERROR_EXIT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::from(CONFIG_ERROR_EXIT);
        }
    };

    init_tracing(config.log_format);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded .env");
    }

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Server failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "coachline=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        config = %serde_json::to_string(&config).unwrap_or_default(),
        "Starting Coachline server"
    );

    let collaborators = match &config.storage {
        StorageBackend::Memory => memory_backend(&config)?,
        StorageBackend::Postgres(pg) => postgres_backend(pg, &config).await?,
    };
    let engine = ReservationEngine::new(collaborators);

    if config.metrics.enabled {
        start_metrics(&config).await?;
    }

    let app = build_router(AppState::new(engine));
    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;
    info!(addr = %config.addr, "HTTP server listening");

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.wait_for(|stop| *stop).await;
            })
            .await
    });

    tokio::select! {
        result = &mut server => {
            return result.context("server task panicked")?.context("server error");
        }
        () = shutdown_signal() => {}
    }

    let _ = stop_tx.send(true);
    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(result) => result.context("server task panicked")?.context("server error")?,
        Err(_) => warn!(
            timeout_secs = config.shutdown_timeout,
            "Graceful shutdown timed out, dropping open connections"
        ),
    }

    info!("Server stopped");
    Ok(())
}

fn memory_backend(config: &Config) -> anyhow::Result<Collaborators> {
    let registry = match &config.fleet_seed_path {
        Some(path) => {
            let registry = InMemoryRegistry::from_seed(FleetSeed::from_path(path)?);
            let (buses, routes, users) = registry.counts();
            info!(path = %path.display(), buses, routes, users, "Fleet seed loaded");
            registry
        }
        None => {
            warn!("No FLEET_SEED_PATH set; the in-memory fleet is empty");
            InMemoryRegistry::new()
        }
    };

    let store = InMemoryStore::new();
    info!("Using in-memory storage");
    Ok(Collaborators::new(
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(registry),
    ))
}

async fn postgres_backend(pg: &PostgresConfig, config: &Config) -> anyhow::Result<Collaborators> {
    info!("Connecting to PostgreSQL...");
    let store = PostgresStore::connect(&pg.url, pg.max_connections, pg.connect_timeout).await?;
    store.migrate().await?;

    let registry = PostgresRegistry::new(store.pool().clone());
    if let Some(path) = &config.fleet_seed_path {
        let seed = FleetSeed::from_path(path)?;
        for bus in &seed.buses {
            registry.upsert_bus(bus).await?;
        }
        for route in &seed.routes {
            registry.upsert_route(route).await?;
        }
        for user in &seed.users {
            registry.upsert_user(user).await?;
        }
        info!(
            path = %path.display(),
            buses = seed.buses.len(),
            routes = seed.routes.len(),
            users = seed.users.len(),
            "Fleet seed applied"
        );
    }

    Ok(Collaborators::new(
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(registry),
    ))
}

async fn start_metrics(config: &Config) -> anyhow::Result<()> {
    let mut metrics = MetricsServer::new(config.metrics.addr);
    metrics.start()?;
    let metrics = Arc::new(metrics);

    let app = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = Arc::clone(&metrics);
            async move { metrics.render().unwrap_or_default() }
        }),
    );
    let listener = TcpListener::bind(config.metrics.addr)
        .await
        .with_context(|| format!("binding metrics listener {}", config.metrics.addr))?;
    info!(addr = %config.metrics.addr, "Metrics endpoint listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics server stopped");
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
