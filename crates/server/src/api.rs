//! HTTP API: health, metrics, idle detection and optimizer routes

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dashboard_lib::{
    anomaly::{IdleDetector, IdleReport},
    health::{ComponentStatus, HealthRegistry},
    lifecycle::{BatchSource, ModelLifecycle},
    observability::{DashboardMetrics, StructuredLogger},
    telemetry::SyntheticSampler,
    PipelineError, ResourceRecord,
};
use prometheus::{Encoder, TextEncoder};
use rand::SeedableRng;
use rand_pcg::Pcg64;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Shared application state
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: DashboardMetrics,
    pub logger: StructuredLogger,
    pub lifecycle: Arc<ModelLifecycle>,
    /// Detector over the replayed test partition
    pub detector: IdleDetector,
    /// Detector over synthetic live batches
    pub live_detector: IdleDetector,
    pub sampler: SyntheticSampler,
}

/// Pipeline error as an HTTP response
#[derive(Debug)]
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            PipelineError::ModelUnavailable { .. } | PipelineError::Artifact { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "model_unavailable")
            }
            PipelineError::Telemetry { .. } => (StatusCode::BAD_GATEWAY, "telemetry_unavailable"),
            PipelineError::InvalidCluster(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_cluster"),
            PipelineError::EmptyTrainingSet => (StatusCode::INTERNAL_SERVER_ERROR, "empty_training_set"),
        };
        error!(error = %self.0, code = code, "Request failed");
        (status, Json(json!({ "error": self.0.to_string(), "code": code }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state
        .health_registry
        .readiness(state.lifecycle.state().await)
        .await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

fn source_label(source: BatchSource) -> &'static str {
    match source {
        BatchSource::TestPartition => "test_partition",
        BatchSource::LiveSample => "live_sample",
    }
}

/// Idle resources among the held-out test batch
async fn idle_detection(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let mut rng = Pcg64::from_entropy();
    let (batch, source) = state.lifecycle.test_batch(&mut rng).await?;

    let start = Instant::now();
    let report = IdleReport::from_scored(state.lifecycle.analyze(&state.detector, &batch).await?);
    state
        .metrics
        .observe_detect(start.elapsed().as_secs_f64(), report.idle_count);
    state.logger.log_idle_detected(
        source_label(source),
        report.total_analyzed,
        report.idle_count,
        report.potential_savings,
    );

    Ok(Json(json!({ "idle_resources": report.idle_resources() })))
}

/// Every resource of a synthetic batch, annotated
async fn idle_detection_live(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let batch = {
        let mut rng = Pcg64::from_entropy();
        state.sampler.batch(&mut rng)
    };

    let start = Instant::now();
    let report = IdleReport::from_scored(state.lifecycle.analyze(&state.live_detector, &batch).await?);
    state
        .metrics
        .observe_detect(start.elapsed().as_secs_f64(), report.idle_count);
    state.logger.log_idle_detected(
        "synthetic",
        report.total_analyzed,
        report.idle_count,
        report.potential_savings,
    );

    Ok(Json(json!({
        "idle_resources": report.resources,
        "total_analyzed": report.total_analyzed,
        "potential_savings": report.potential_savings,
    })))
}

/// Recommendations for the held-out test batch
async fn optimizer(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let mut rng = Pcg64::from_entropy();
    let (batch, _) = state.lifecycle.test_batch(&mut rng).await?;
    let recommendations = state.lifecycle.optimize(&batch).await?;
    Ok(Json(json!({ "recommendations": recommendations })))
}

/// Recommendations for caller-supplied resources
async fn optimizer_batch(
    State(state): State<Arc<AppState>>,
    Json(resources): Json<Vec<ResourceRecord>>,
) -> ApiResult<impl IntoResponse> {
    let recommendations = state.lifecycle.optimize(&resources).await?;
    Ok(Json(json!({ "recommendations": recommendations })))
}

async fn model_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.lifecycle.status().await)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/ai/idle-detection", get(idle_detection))
        .route("/ai/idle-detection/live", get(idle_detection_live))
        .route("/optimizer", post(optimizer))
        .route("/optimizer/batch", post(optimizer_batch))
        .route("/model", get(model_status))
        .with_state(state)
}

pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
