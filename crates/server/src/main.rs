//! condo-voting server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Router, middleware, routing::get};
use condo_api::{AppState, JwtVerifier, auth_middleware, health, router as api_router};
use condo_common::Config;
use condo_core::{HttpApartmentDirectory, VotingService};
use condo_db::repositories::VotingRepository;
use condo_queue::{AmqpVotingPublisher, SchedulerConfig, VotingJobExecutor, run_scheduler};
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
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
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "condo=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting condo-voting server...");

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Connect to database
    let db = condo_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    condo_db::migrate(&db).await?;
    info!("Migrations completed");

    // Collaborators
    let publisher = Arc::new(AmqpVotingPublisher::connect(&config.amqp).await?);
    let apartments = HttpApartmentDirectory::new(
        &config.apartment_service.base_url,
        config.apartment_service.timeout(),
    )?;

    let db = Arc::new(db);
    let voting_repo = VotingRepository::new(Arc::clone(&db));
    let voting_service = VotingService::new(
        Arc::new(voting_repo),
        Arc::new(apartments),
        publisher.clone(),
    );

    // Background sweep
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scheduler = run_scheduler(
        SchedulerConfig::from(&config.scheduler),
        Arc::new(VotingJobExecutor::new(voting_service.clone())),
        shutdown_rx,
    );
    info!(
        interval_secs = config.scheduler.voting_expiration_interval_secs,
        "Voting expiration sweep started"
    );

    let state = AppState {
        voting_service,
        jwt: JwtVerifier::new(&config.auth.jwt_secret),
    };

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let ip = config
        .server
        .host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("Invalid server host: {}", config.server.host))?;
    let addr = SocketAddr::from((ip, config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the sweep after in-flight requests have drained.
    let _ = shutdown_tx.send(());
    if let Err(e) = scheduler.await {
        error!(error = %e, "Voting expiration sweep did not stop cleanly");
    }
    if let Err(e) = publisher.close().await {
        error!(error = %e, "Failed to close AMQP connection");
    }

    info!("Server shutdown complete");
    Ok(())
}
