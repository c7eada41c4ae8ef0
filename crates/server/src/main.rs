//! Cloud Dashboard - idle detection and optimization backend
//!
//! Trains the clustering model on startup when no artifacts exist, then
//! serves detection and recommendation routes.

use anyhow::{Context, Result};
use cloud_dashboard::{api, config::DashboardConfig};
use dashboard_lib::{
    anomaly::{IdleDetector, IdleDetectorConfig},
    artifacts::{ArtifactStore, FsArtifactStore, FsStoreConfig},
    health::HealthRegistry,
    lifecycle::ModelLifecycle,
    observability::{DashboardMetrics, StructuredLogger},
    pipeline::{ModelTrainer, TrainerConfig},
    telemetry::{CsvTelemetryStore, SyntheticConfig, SyntheticSampler},
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DASHBOARD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting cloud-dashboard");

    let config = DashboardConfig::load()?;
    info!(
        node_name = %config.node_name,
        artifact_dir = %config.artifact_dir.display(),
        telemetry_path = %config.telemetry_path.display(),
        "Dashboard configured"
    );

    let health_registry = HealthRegistry::with_all_components().await;

    let metrics = DashboardMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    let telemetry = Arc::new(CsvTelemetryStore::new(&config.telemetry_path));
    let artifacts = Arc::new(
        FsArtifactStore::new(FsStoreConfig {
            root: config.artifact_dir.clone(),
            generations_to_keep: config.generations_to_keep,
        })
        .context("failed to open artifact store")?,
    );
    let lifecycle = Arc::new(ModelLifecycle::new(
        telemetry,
        artifacts.clone(),
        ModelTrainer::new(TrainerConfig::with_seed(config.seed)),
        logger.clone(),
    ));

    // Startup guard runs before any request is served
    let startup = lifecycle.ensure_trained().await;
    if let Err(e) = &startup {
        error!(error = %e, "Startup training failed");
    }
    health_registry.record_training(&startup).await;

    let detector_config = |contamination: f64| IdleDetectorConfig {
        contamination,
        seed: config.seed,
        ..Default::default()
    };
    let app_state = Arc::new(api::AppState {
        health_registry: health_registry.clone(),
        metrics,
        logger: logger.clone(),
        lifecycle,
        detector: IdleDetector::new(detector_config(config.idle_contamination)),
        live_detector: IdleDetector::new(detector_config(config.live_contamination)),
        sampler: SyntheticSampler::new(SyntheticConfig {
            batch_size: config.live_batch_size,
            ..Default::default()
        }),
    });

    logger.log_startup(DASHBOARD_VERSION, artifacts.current_generation().as_deref());
    health_registry.set_initialized(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = api_handle => {
            let reason = match result {
                Ok(Ok(())) => "API server exited".to_string(),
                Ok(Err(e)) => format!("API server failed: {}", e),
                Err(e) => format!("API task panicked: {}", e),
            };
            logger.log_shutdown(&reason);
            anyhow::bail!(reason);
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
