use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use api_shared::ApiKey;
use clinic_core::{
    config::{database_url_from_env_value, transaction_timeout_from_env_value},
    db, CoreConfig, MedicalRecordService,
};

/// Main entry point for the clinic ledger
///
/// Resolves configuration once, applies database migrations, and serves the REST API.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `DATABASE_URL`: SQLite database URL (default: "sqlite://clinic.db?mode=rwc")
/// - `CLINIC_TX_TIMEOUT_MS`: upper bound on a ledger transaction (default: 5000)
/// - `CLINIC_API_KEY`: API key required on `/medical-records` routes (required)
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, migrations, or the server fail
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic=info".parse()?)
                .add_directive("clinic_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::new(
        database_url_from_env_value(std::env::var("DATABASE_URL").ok())?,
        transaction_timeout_from_env_value(std::env::var("CLINIC_TX_TIMEOUT_MS").ok())?,
    )?);
    let api_key = ApiKey::from_env_value(std::env::var("CLINIC_API_KEY").ok())?;

    let pool = db::connect(&cfg).await?;
    db::migrate(&pool).await?;

    let state = AppState {
        medical_records: MedicalRecordService::new(cfg.clone(), pool.clone()),
        api_key: Arc::new(api_key),
    };

    tracing::info!("++ Starting clinic REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, api_rest::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("-- Clinic REST stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
}
