//! Model training over the full telemetry store
//!
//! Splits the store 80/20 with a fixed seed, fits the scaler and k-means on
//! the train side only, and publishes scaler, model and the raw test
//! partition as one artifact generation.

use super::features::{extract_batch, feature_order_owned};
use super::kmeans::{KMeans, KMeansConfig};
use super::scaler::StandardScaler;
use super::split::{TrainTestSplit, TEST_FRACTION};
use crate::artifacts::{ArtifactSet, ArtifactStore, ModelInfo, TestEntry, TestPartition};
use crate::error::Result;
use crate::models::ResourceSample;
use crate::telemetry::TelemetryStore;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Minimum number of samples for a training run
pub const MIN_TRAINING_SAMPLES: usize = 3;

/// Default seed shared by the split and the clustering
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub seed: u64,
    pub test_fraction: f64,
    pub min_samples: usize,
    pub kmeans: KMeansConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}

impl TrainerConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            test_fraction: TEST_FRACTION,
            min_samples: MIN_TRAINING_SAMPLES,
            kmeans: KMeansConfig {
                seed,
                ..Default::default()
            },
        }
    }
}

/// Result of a training request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrainOutcome {
    Trained {
        generation: String,
        train_size: usize,
        test_size: usize,
        inertia: f64,
        duration_ms: u64,
    },
    /// Not enough data; nothing was written
    InsufficientData { available: usize, required: usize },
}

pub struct ModelTrainer {
    config: TrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fit an artifact set without touching storage.
    /// Returns `None` when there are fewer than `min_samples` samples.
    pub fn fit(&self, samples: &[ResourceSample]) -> Result<Option<ArtifactSet>> {
        if samples.len() < self.config.min_samples.max(2) {
            return Ok(None);
        }

        let features = extract_batch(samples);
        let split = TrainTestSplit::new(features.len(), self.config.test_fraction, self.config.seed);
        let (train, _) = split.select(&features);

        let scaler = StandardScaler::fit(&train)?;
        let normalized = scaler.transform(&train);
        let kmeans = KMeans::fit(&normalized, &self.config.kmeans)?;

        debug!(
            train_size = train.len(),
            test_size = split.test.len(),
            iterations = kmeans.iterations,
            inertia = kmeans.inertia,
            "Fitted scaler and clustering model"
        );

        let test_set = TestPartition {
            entries: split
                .test
                .iter()
                .map(|&i| TestEntry {
                    vm_id: samples[i].vm_id.clone(),
                    features: features[i],
                })
                .collect(),
        };

        let info = ModelInfo {
            seed: self.config.seed,
            n_clusters: self.config.kmeans.n_clusters,
            feature_order: feature_order_owned(),
            train_size: train.len(),
            test_size: test_set.len(),
            trained_at: chrono::Utc::now().timestamp(),
        };

        Ok(Some(ArtifactSet {
            scaler,
            kmeans,
            test_set,
            info,
        }))
    }

    /// Train on the whole telemetry store and publish the artifacts.
    /// Idempotent: each successful call replaces the full artifact set.
    pub async fn train(
        &self,
        telemetry: &dyn TelemetryStore,
        artifacts: &dyn ArtifactStore,
    ) -> Result<TrainOutcome> {
        let start = Instant::now();
        let samples = telemetry.fetch_all().await?;

        let set = match self.fit(&samples)? {
            Some(set) => set,
            None => {
                info!(
                    available = samples.len(),
                    required = self.config.min_samples,
                    "Not enough data to train"
                );
                return Ok(TrainOutcome::InsufficientData {
                    available: samples.len(),
                    required: self.config.min_samples,
                });
            }
        };

        let generation = artifacts.replace(&set)?;

        Ok(TrainOutcome::Trained {
            generation,
            train_size: set.info.train_size,
            test_size: set.info.test_size,
            inertia: set.kmeans.inertia,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

impl Default for ModelTrainer {
    fn default() -> Self {
        Self::new(TrainerConfig::default())
    }
}
