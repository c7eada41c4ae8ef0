//! Idle resource detection
//!
//! Stateless: every call fits a fresh isolation forest on the batch it is
//! given and labels the batch's outliers as idle. Nothing is persisted and
//! no pretraining is needed.

use super::isolation_forest::{IsolationForest, IsolationForestConfig, OutlierScore};
use crate::error::Result;
use crate::models::{ResourceRecord, ResourceStatus, ScoredResource};
use crate::pipeline::{extract_batch, ResourceAnalyzer};
use serde::{Deserialize, Serialize};

/// Contamination for idle detection over stored telemetry
pub const IDLE_CONTAMINATION: f64 = 0.15;

/// Contamination for the synthetic live view
pub const LIVE_CONTAMINATION: f64 = 0.10;

/// Estimated monthly savings per idle resource
pub const SAVINGS_PER_IDLE_RESOURCE: f64 = 100.0;

#[derive(Debug, Clone)]
pub struct IdleDetectorConfig {
    pub contamination: f64,
    pub n_estimators: usize,
    pub seed: u64,
}

impl Default for IdleDetectorConfig {
    fn default() -> Self {
        Self {
            contamination: IDLE_CONTAMINATION,
            n_estimators: 100,
            seed: 42,
        }
    }
}

/// Full annotated batch with aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleReport {
    pub resources: Vec<ScoredResource>,
    pub total_analyzed: usize,
    pub idle_count: usize,
    pub potential_savings: f64,
}

pub struct IdleDetector {
    config: IdleDetectorConfig,
}

impl IdleDetector {
    pub fn new(config: IdleDetectorConfig) -> Self {
        Self { config }
    }

    pub fn with_contamination(contamination: f64) -> Self {
        Self::new(IdleDetectorConfig {
            contamination,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &IdleDetectorConfig {
        &self.config
    }

    /// Annotate every record of the batch, preserving input order
    pub fn score(&self, resources: &[ResourceRecord]) -> Result<Vec<ScoredResource>> {
        if resources.is_empty() {
            return Ok(Vec::new());
        }

        let features = extract_batch(resources);
        let forest_config = IsolationForestConfig {
            n_estimators: self.config.n_estimators,
            contamination: self.config.contamination,
            seed: self.config.seed,
            ..Default::default()
        };
        let (forest, labels) = IsolationForest::fit_predict(&features, &forest_config)?;
        let threshold = forest.threshold();

        Ok(resources
            .iter()
            .zip(labels)
            .map(|(record, label)| {
                let mut record = record.clone();
                record.status = if label.is_outlier {
                    ResourceStatus::Idle
                } else {
                    ResourceStatus::Running
                };
                ScoredResource {
                    record,
                    is_idle: label.is_outlier,
                    anomaly_score: label.score,
                    confidence: confidence(&label, threshold),
                }
            })
            .collect())
    }

    /// Only the records labelled idle, with their status set
    pub fn detect(&self, resources: &[ResourceRecord]) -> Result<Vec<ResourceRecord>> {
        Ok(self.report(resources)?.idle_resources())
    }

    pub fn report(&self, resources: &[ResourceRecord]) -> Result<IdleReport> {
        Ok(IdleReport::from_scored(self.score(resources)?))
    }
}

impl IdleReport {
    pub fn from_scored(scored: Vec<ScoredResource>) -> Self {
        let idle_count = scored.iter().filter(|s| s.is_idle).count();
        Self {
            total_analyzed: scored.len(),
            idle_count,
            potential_savings: idle_count as f64 * SAVINGS_PER_IDLE_RESOURCE,
            resources: scored,
        }
    }

    /// Idle records only, in batch order
    pub fn idle_resources(&self) -> Vec<ResourceRecord> {
        self.resources
            .iter()
            .filter(|s| s.is_idle)
            .map(|s| s.record.clone())
            .collect()
    }
}

impl Default for IdleDetector {
    fn default() -> Self {
        Self::new(IdleDetectorConfig::default())
    }
}

impl ResourceAnalyzer for IdleDetector {
    type Output = ScoredResource;

    fn analyze(&self, resources: &[ResourceRecord]) -> Result<Vec<ScoredResource>> {
        self.score(resources)
    }

    fn requires_artifacts(&self) -> bool {
        false
    }
}

/// Distance from the threshold, mapped onto [0.5, 1.0] on the side of the
/// assigned label
fn confidence(label: &OutlierScore, threshold: f64) -> f64 {
    let margin = if label.is_outlier {
        let room = 1.0 - threshold;
        if room <= f64::EPSILON {
            1.0
        } else {
            (label.score - threshold) / room
        }
    } else if threshold <= f64::EPSILON {
        0.0
    } else {
        (threshold - label.score) / threshold
    };
    (0.5 + margin.clamp(0.0, 1.0) * 0.5).clamp(0.0, 1.0)
}
