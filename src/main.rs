use std::sync::Arc;

use thermoband_api::api::{self, AppState};
use thermoband_api::auth::Authenticator;
use thermoband_api::config::Config;
use thermoband_api::db;
use thermoband_api::repositories::{PgDeviceRegistry, PgPatientStore, PgSampleStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting thermoband-api");

    let cfg_path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config/config.yaml".into());
    let cfg = Config::load(&cfg_path)?;
    info!("Configuration loaded");

    let pool = db::connect(&cfg.database).await?;
    sqlx::query("SELECT 1").execute(&pool).await?;
    info!("Connected to database");

    let authenticator = Authenticator::from_config(cfg.auth.as_ref()).await?;

    let state = AppState::new(
        Arc::new(PgPatientStore::new(pool.clone())),
        Arc::new(PgDeviceRegistry::new(pool.clone())),
        Arc::new(PgSampleStore::new(pool)),
        authenticator,
        cfg.dashboard.history_window_hours,
    );

    let router = api::create_router(state);
    let addr = cfg.api_bind_address();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    info!("API server listening on {}", addr);

    let serve = axum::serve(listener, router);
    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        }
    };

    if let Err(e) = serve.with_graceful_shutdown(shutdown).await {
        tracing::error!(error = %e, "API server error");
    }

    info!("Application shutdown complete");
    Ok(())
}
