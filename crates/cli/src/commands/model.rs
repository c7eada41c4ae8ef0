//! Model status and local training commands

use anyhow::{Context, Result};
use colored::Colorize;
use dashboard_lib::{
    artifacts::{ArtifactStore, FsArtifactStore, FsStoreConfig},
    lifecycle::{ModelLifecycle, ModelStatus},
    pipeline::{ModelTrainer, TrainOutcome, TrainerConfig},
    telemetry::CsvTelemetryStore,
    StructuredLogger,
};
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::ApiClient;
use crate::output::{color_status, format_timestamp, print_json, print_success, print_warning, OutputFormat};

/// Local training options
pub struct TrainOptions {
    pub telemetry_path: PathBuf,
    pub artifact_dir: PathBuf,
    pub generations_to_keep: usize,
    pub seed: u64,
    pub force: bool,
}

pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let status: ModelStatus = client.get("model").await?;

    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Table => print_status(&status),
    }
    Ok(())
}

fn print_status(status: &ModelStatus) {
    let state = serde_json::to_value(status.state)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    println!("{}", "Model Status".bold());
    println!("{}", "=".repeat(40));
    println!("State:        {}", color_status(&state));
    println!(
        "Generation:   {}",
        status.generation.as_deref().unwrap_or("-").cyan()
    );
    if let Some(trained_at) = status.trained_at {
        println!("Trained at:   {}", format_timestamp(trained_at));
    }
    if let (Some(train), Some(test)) = (status.train_size, status.test_size) {
        println!("Samples:      {} train / {} test", train, test);
    }
}

/// Run the startup guard, or a forced retrain, against local files
pub async fn train(options: TrainOptions, format: OutputFormat) -> Result<()> {
    let artifacts = Arc::new(
        FsArtifactStore::new(FsStoreConfig {
            root: options.artifact_dir.clone(),
            generations_to_keep: options.generations_to_keep,
        })
        .with_context(|| format!("Failed to open artifact store at {}", options.artifact_dir.display()))?,
    );
    let lifecycle = ModelLifecycle::new(
        Arc::new(CsvTelemetryStore::new(&options.telemetry_path)),
        artifacts.clone(),
        ModelTrainer::new(TrainerConfig::with_seed(options.seed)),
        StructuredLogger::new("dashctl"),
    );

    let outcome = if options.force {
        Some(lifecycle.retrain().await?)
    } else {
        lifecycle.ensure_trained().await?
    };

    if let OutputFormat::Json = format {
        return print_json(&outcome);
    }

    match outcome {
        None => print_success(&format!(
            "Artifacts already present (generation {}), nothing to do",
            artifacts.current_generation().unwrap_or_default()
        )),
        Some(TrainOutcome::Trained {
            generation,
            train_size,
            test_size,
            inertia,
            duration_ms,
        }) => print_success(&format!(
            "Trained {} on {} samples ({} held out), inertia {:.3}, {} ms",
            generation, train_size, test_size, inertia, duration_ms
        )),
        Some(TrainOutcome::InsufficientData { available, required }) => print_warning(&format!(
            "Not enough data to train: {} sample(s), need at least {}",
            available, required
        )),
    }
    Ok(())
}
