use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inkcal_api::calibration::database::PgCalibrationBackend;
use inkcal_api::calibration::local_cache::LocalFileCache;
use inkcal_api::calibration::CalibrationStore;
use inkcal_api::config::ServerConfig;
use inkcal_api::router::build_app_router;
use inkcal_api::state::AppState;
use inkcal_api::tuning::TuningCoordinator;
use inkcal_core::kind::CalibrationKind;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkcal_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = inkcal_db::create_pool(&database_url, config.calibration.db_timeout())
        .expect("DATABASE_URL is not a valid PostgreSQL URL");
    tracing::info!("Database connection pool created");

    // The service can run on the local cache and defaults, so an unreachable
    // database only degrades it.
    match inkcal_db::health_check(&pool).await {
        Ok(()) => {
            tracing::info!("Database health check passed");
            inkcal_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Database unreachable at startup, serving from fallback calibration",
            );
        }
    }

    // --- Calibration store ---
    let calibration_config = &config.calibration;
    let database = Arc::new(PgCalibrationBackend::new(
        pool.clone(),
        calibration_config.db_timeout(),
    ));
    let local_cache = Arc::new(LocalFileCache::new(&calibration_config.cache_dir));
    let calibration = Arc::new(CalibrationStore::new(
        database,
        local_cache,
        calibration_config.cache_ttl(),
    ));
    for kind in CalibrationKind::ALL {
        match calibration.get_current_calibration(kind).await {
            Ok(snapshot) => tracing::info!(
                kind = %kind,
                source = snapshot.source.as_str(),
                version = ?snapshot.version,
                "Calibration loaded",
            ),
            Err(e) => tracing::warn!(kind = %kind, error = %e, "Calibration preload failed"),
        }
    }

    let tuning = Arc::new(TuningCoordinator::new(calibration_config.tuner));

    // --- App state ---
    let state = AppState {
        pool: pool.clone(),
        config: Arc::new(config.clone()),
        calibration,
        tuning,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, closing database pool");
    if tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        pool.close(),
    )
    .await
    .is_err()
    {
        tracing::warn!("Database pool did not close within the shutdown timeout");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
