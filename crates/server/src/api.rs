//! HTTP API for the estimation service
//!
//! Thin plumbing around the estimation engine and lifecycle manager:
//! request validation, bearer-token gating for model replacement, and
//! fire-and-forget audit logging.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use estimator_core::{
    audit,
    health::{components, ComponentStatus, HealthRegistry},
    AnalogousEstimate, AuditLog, EstimationEngine, EstimatorError, EstimatorMetrics,
    FeatureVector, Label, ModelStore,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub store: Arc<ModelStore>,
    pub engine: EstimationEngine,
    pub health_registry: HealthRegistry,
    pub metrics: EstimatorMetrics,
    /// Absent when the audit database failed to open; the service runs on
    pub audit: Option<AuditLog>,
    pub admin_token: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: FeatureVector,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub predictions: Vec<Label>,
}

#[derive(Debug, Deserialize)]
pub struct AnalogousRequest {
    pub size: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub detail: String,
    pub checksum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub kind: String,
}

impl ApiError {
    fn new(error: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
        }
    }
}

/// Map an estimator error to its HTTP status
fn status_for(err: &EstimatorError) -> StatusCode {
    match err {
        EstimatorError::ModelNotLoaded
        | EstimatorError::ColumnMismatch(_)
        | EstimatorError::HistoricalDataUnavailable(_) => StatusCode::BAD_REQUEST,
        EstimatorError::NotFound { .. }
        | EstimatorError::CorruptArtifact(_)
        | EstimatorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn estimator_error(err: &EstimatorError) -> (StatusCode, Json<ApiError>) {
    (
        status_for(err),
        Json(ApiError::new(err.to_string(), err.kind())),
    )
}

fn remote_note(addr: Option<ConnectInfo<SocketAddr>>) -> String {
    match addr {
        Some(ConnectInfo(addr)) => format!("remote={}", addr.ip()),
        None => "remote=unknown".to_string(),
    }
}

/// Health check: 200 while healthy or degraded (a service without a
/// loaded model still answers), 503 only when unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .unwrap_or_default();
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

async fn predict(
    State(state): State<Arc<AppState>>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, (StatusCode, Json<ApiError>)> {
    let start = Instant::now();
    let result = state.engine.predict(std::slice::from_ref(&req.features)).await;
    state
        .metrics
        .observe_prediction_latency(start.elapsed().as_secs_f64());

    match result {
        Ok(predictions) => {
            state.metrics.inc_predictions();
            if let Some(log) = &state.audit {
                audit::fire_and_forget(
                    log.log_prediction(&req.features, &predictions, &remote_note(addr)),
                    "prediction",
                );
            }
            Ok(Json(PredictResponse { predictions }))
        }
        Err(e) => {
            state.metrics.inc_prediction_errors();
            Err(estimator_error(&e))
        }
    }
}

async fn analogous(
    State(state): State<Arc<AppState>>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(req): Json<AnalogousRequest>,
) -> Result<Json<AnalogousEstimate>, (StatusCode, Json<ApiError>)> {
    if !req.size.is_finite() || req.size <= 0.0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("size must be a positive number", "invalid_size")),
        ));
    }

    let start = Instant::now();
    let result = state.engine.analogous_cost(req.size).await;
    state
        .metrics
        .observe_analogous_latency(start.elapsed().as_secs_f64());

    match result {
        Ok(estimate) => {
            state.metrics.inc_analogous(estimate.fallback_used);
            if let Some(log) = &state.audit {
                audit::fire_and_forget(
                    log.log_analogous(req.size, &estimate, &remote_note(addr)),
                    "analogous",
                );
            }
            Ok(Json(estimate))
        }
        Err(e) => Err(estimator_error(&e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// Verify the bearer token against the configured admin token
fn authorize(headers: &HeaderMap, admin_token: &str) -> Result<(), (StatusCode, Json<ApiError>)> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match token {
        None => Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("missing credentials", "unauthorized")),
        )),
        Some(token) if token != admin_token => Err((
            StatusCode::UNAUTHORIZED,
            Json(ApiError::new("invalid admin token", "unauthorized")),
        )),
        Some(_) => Ok(()),
    }
}

/// Replace the active model artifact. The previous artifact is kept as a
/// timestamped backup and restored when the upload fails to load.
async fn upload_model(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, (StatusCode, Json<ApiError>)> {
    authorize(&headers, &state.admin_token)?;

    let filename = query.filename.unwrap_or_else(|| "model.json".to_string());
    let lowered = filename.to_lowercase();
    if !lowered.ends_with(".json") && !lowered.ends_with(".model") {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                "only .json or .model artifacts accepted",
                "invalid_filename",
            )),
        ));
    }
    if body.is_empty() || body.len() > state.max_upload_bytes {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                format!(
                    "artifact must be between 1 and {} bytes",
                    state.max_upload_bytes
                ),
                "invalid_size",
            )),
        ));
    }

    match state.store.replace_model(&body).await {
        Ok(outcome) => {
            info!(checksum = %outcome.checksum, "Model replaced");
            state.metrics.inc_model_replacements();
            state.metrics.set_model_loaded(true);
            state.health_registry.set_healthy(components::MODEL).await;
            Ok(Json(UploadResponse {
                detail: "model uploaded and reloaded successfully".to_string(),
                checksum: outcome.checksum,
                backup_path: outcome.backup_path,
            }))
        }
        Err(e) => Err(estimator_error(&e)),
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/predict", post(predict))
        .route("/analogous", post(analogous))
        .route("/admin/upload-model", post(upload_model))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
