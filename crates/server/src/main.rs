//! Software estimation service
//!
//! Serves team-experience classification and analogous cost estimation
//! over HTTP, with hot-swappable model artifacts.

use anyhow::Result;
use estimator_core::{
    health::{components, HealthRegistry},
    AuditLog, EstimationEngine, EstimatorMetrics, ModelStore,
};
use estimation_server::{api, config};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting estimation-server");

    let config = config::ServerConfig::load()?;
    info!(model_path = %config.model_path, api_port = config.api_port, "Server configured");

    let metrics = EstimatorMetrics::new();
    let health_registry = HealthRegistry::new();

    // Load model and historical data; a missing artifact degrades the
    // service instead of aborting startup
    let store = Arc::new(ModelStore::new(&config.model_path));
    let report = store
        .initialize(config.data_path.as_deref().map(Path::new))
        .await?;

    metrics.set_model_loaded(report.model_loaded);
    if report.model_loaded {
        health_registry.set_healthy(components::MODEL).await;
    } else {
        health_registry
            .set_degraded(components::MODEL, "no artifact on disk")
            .await;
    }
    match report.historical_records {
        Some(records) => {
            info!(records, "Analogous estimation backed by historical data");
            health_registry.set_healthy(components::HISTORICAL_DATA).await;
        }
        None => {
            health_registry
                .set_degraded(components::HISTORICAL_DATA, "no dataset, fallback in use")
                .await;
        }
    }

    // Audit failures never block serving
    let audit = match AuditLog::open(Path::new(&config.audit_db_path)) {
        Ok(log) => {
            health_registry.set_healthy(components::AUDIT_LOG).await;
            Some(log)
        }
        Err(e) => {
            warn!(error = %e, "Audit log unavailable, continuing without it");
            health_registry
                .set_degraded(components::AUDIT_LOG, e.to_string())
                .await;
            None
        }
    };

    let engine = EstimationEngine::new(store.clone(), config.analogous_fallback());

    let app_state = Arc::new(api::AppState {
        store,
        engine,
        health_registry: health_registry.clone(),
        metrics,
        audit,
        admin_token: config.admin_token.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });

    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    api_handle.abort();

    Ok(())
}
