//! Model lifecycle: startup guard, forced retrain and serving state
//!
//! Training is the only writer of artifacts and runs under a single-writer
//! lock. State moves `Untrained -> Training -> Ready`; a failed or skipped
//! run falls back to the state it started from.

use crate::artifacts::{ArtifactStore, TestPartition};
use crate::error::{PipelineError, Result};
use crate::models::{ClusterAssignment, ResourceRecord, ResourceSample};
use crate::observability::{DashboardMetrics, StructuredLogger};
use crate::pipeline::{FeatureSource, ModelTrainer, Optimizer, ResourceAnalyzer, TrainOutcome};
use crate::telemetry::TelemetryStore;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Untrained,
    Training,
    Ready,
}

impl ModelState {
    pub fn as_gauge(&self) -> i64 {
        match self {
            ModelState::Untrained => 0,
            ModelState::Training => 1,
            ModelState::Ready => 2,
        }
    }
}

/// Snapshot returned by the status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub state: ModelState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_size: Option<usize>,
}

/// Where a replayed test batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSource {
    /// Exactly the held-out rows of the active generation
    TestPartition,
    /// Held-out rows no longer all present; sampled from the live store
    LiveSample,
}

pub struct ModelLifecycle {
    telemetry: Arc<dyn TelemetryStore>,
    artifacts: Arc<dyn ArtifactStore>,
    trainer: ModelTrainer,
    optimizer: Optimizer,
    state: RwLock<ModelState>,
    writer: Mutex<()>,
    metrics: DashboardMetrics,
    logger: StructuredLogger,
}

impl ModelLifecycle {
    pub fn new(
        telemetry: Arc<dyn TelemetryStore>,
        artifacts: Arc<dyn ArtifactStore>,
        trainer: ModelTrainer,
        logger: StructuredLogger,
    ) -> Self {
        let initial = if artifacts.exists() {
            ModelState::Ready
        } else {
            ModelState::Untrained
        };
        let metrics = DashboardMetrics::new();
        metrics.set_model_state(initial.as_gauge());
        if let Some(generation) = artifacts.current_generation() {
            metrics.set_generation(&generation);
        }

        Self {
            optimizer: Optimizer::new(artifacts.clone()),
            telemetry,
            artifacts,
            trainer,
            state: RwLock::new(initial),
            writer: Mutex::new(()),
            metrics,
            logger,
        }
    }

    pub fn telemetry(&self) -> &Arc<dyn TelemetryStore> {
        &self.telemetry
    }

    pub fn artifacts(&self) -> &Arc<dyn ArtifactStore> {
        &self.artifacts
    }

    pub async fn state(&self) -> ModelState {
        *self.state.read().await
    }

    /// Startup guard: train only when no valid artifact set exists.
    /// Returns `None` when training was not needed.
    pub async fn ensure_trained(&self) -> Result<Option<TrainOutcome>> {
        let _writer = self.writer.lock().await;

        if self.artifacts.exists() {
            info!(
                generation = self.artifacts.current_generation().as_deref().unwrap_or("unknown"),
                "Artifacts present, skipping startup training"
            );
            self.set_state(ModelState::Ready).await;
            return Ok(None);
        }

        info!("No valid artifacts found, training at startup");
        self.run_training().await.map(Some)
    }

    /// Forced retrain; always replaces the artifact set when there is enough data
    pub async fn retrain(&self) -> Result<TrainOutcome> {
        let _writer = self.writer.lock().await;
        self.run_training().await
    }

    async fn run_training(&self) -> Result<TrainOutcome> {
        let previous = self.state().await;
        self.set_state(ModelState::Training).await;
        let start = Instant::now();

        match self.trainer.train(self.telemetry.as_ref(), self.artifacts.as_ref()).await {
            Ok(outcome) => {
                match &outcome {
                    TrainOutcome::Trained {
                        generation,
                        train_size,
                        test_size,
                        inertia,
                        duration_ms,
                    } => {
                        self.metrics.observe_training(start.elapsed().as_secs_f64());
                        self.metrics.set_generation(generation);
                        self.logger.log_training_completed(
                            generation,
                            *train_size,
                            *test_size,
                            *inertia,
                            *duration_ms,
                        );
                        self.set_state(ModelState::Ready).await;
                    }
                    TrainOutcome::InsufficientData { available, required } => {
                        self.metrics.inc_trainings_skipped();
                        self.logger.log_training_skipped(*available, *required);
                        self.set_state(previous).await;
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                self.logger.log_training_failed(&e.to_string());
                self.set_state(previous).await;
                Err(e)
            }
        }
    }

    async fn set_state(&self, state: ModelState) {
        *self.state.write().await = state;
        self.metrics.set_model_state(state.as_gauge());
    }

    /// Fails while a training run is replacing the artifacts
    pub async fn ensure_serving(&self) -> Result<()> {
        let result = self.check_serving().await;
        if let Err(e) = &result {
            self.logger.log_model_unavailable(&e.to_string());
        }
        result
    }

    async fn check_serving(&self) -> Result<()> {
        if self.state().await == ModelState::Training {
            return Err(PipelineError::model_unavailable("training in progress"));
        }
        Ok(())
    }

    /// Run any analyzer over a batch. Analyzers that read persisted
    /// artifacts are refused while training is replacing them; stateless
    /// ones always run.
    pub async fn analyze<A>(&self, analyzer: &A, resources: &[ResourceRecord]) -> Result<Vec<A::Output>>
    where
        A: ResourceAnalyzer + ?Sized,
    {
        if analyzer.requires_artifacts() {
            self.check_serving().await?;
        }
        analyzer.analyze(resources)
    }

    /// Assign resources to clusters using the current artifacts
    pub async fn optimize(&self, resources: &[ResourceRecord]) -> Result<Vec<ClusterAssignment>> {
        let start = Instant::now();
        match self.analyze(&self.optimizer, resources).await {
            Ok(assignments) => {
                self.metrics
                    .observe_optimize(start.elapsed().as_secs_f64(), assignments.len());
                self.logger.log_optimizer_completed(
                    self.artifacts.current_generation().as_deref(),
                    assignments.len(),
                );
                Ok(assignments)
            }
            Err(e) => {
                self.metrics.inc_optimize_errors();
                if e.is_model_unavailable() {
                    self.logger.log_model_unavailable(&e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Rebuild the held-out batch of the active generation from telemetry.
    ///
    /// Each persisted entry is matched by id and raw features. When any entry
    /// is missing from the store, the same number of rows is sampled instead.
    pub async fn test_batch(&self, rng: &mut (dyn RngCore + Send)) -> Result<(Vec<ResourceRecord>, BatchSource)> {
        self.ensure_serving().await?;

        let stored = self
            .artifacts
            .load()
            .map_err(|e| PipelineError::model_unavailable(e.to_string()))?;
        let partition = &stored.artifacts.test_set;

        let candidates = self.telemetry.fetch_by_ids(&partition.vm_ids()).await?;
        if let Some(rows) = match_partition(partition, &candidates) {
            debug!(rows = rows.len(), generation = %stored.generation, "Replaying test partition");
            return Ok((rows.into_iter().map(ResourceRecord::from).collect(), BatchSource::TestPartition));
        }

        warn!(
            expected = partition.len(),
            generation = %stored.generation,
            "Test partition no longer in telemetry store, sampling instead"
        );
        let sampled = self.telemetry.sample(partition.len(), rng).await?;
        Ok((sampled.iter().map(ResourceRecord::from).collect(), BatchSource::LiveSample))
    }

    pub async fn status(&self) -> ModelStatus {
        let state = self.state().await;
        let info = self.artifacts.load().ok();

        ModelStatus {
            state,
            generation: info.as_ref().map(|s| s.generation.clone()),
            trained_at: info.as_ref().map(|s| s.artifacts.info.trained_at),
            train_size: info.as_ref().map(|s| s.artifacts.info.train_size),
            test_size: info.as_ref().map(|s| s.artifacts.info.test_size),
        }
    }
}

/// One telemetry row per persisted entry, in partition order, or `None`
/// if any entry has no matching row
fn match_partition<'a>(partition: &TestPartition, rows: &'a [ResourceSample]) -> Option<Vec<&'a ResourceSample>> {
    let mut used = vec![false; rows.len()];
    partition
        .entries
        .iter()
        .map(|entry| {
            let idx = rows.iter().enumerate().position(|(i, row)| {
                !used[i] && row.vm_id == entry.vm_id && row.features() == entry.features
            })?;
            used[idx] = true;
            Some(&rows[idx])
        })
        .collect()
}
