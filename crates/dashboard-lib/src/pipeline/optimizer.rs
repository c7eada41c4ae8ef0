//! Cluster-based optimization recommendations
//!
//! Read-only against the persisted artifacts: normalizes each resource with
//! the stored scaler, assigns it to the nearest stored centroid and maps the
//! cluster id to a fixed recommendation.

use super::features::extract_batch;
use super::ResourceAnalyzer;
use crate::artifacts::{ArtifactSet, ArtifactStore};
use crate::error::{PipelineError, Result};
use crate::models::{ClusterAssignment, Recommendation, ResourceRecord};
use std::sync::Arc;
use tracing::debug;

pub struct Optimizer {
    artifacts: Arc<dyn ArtifactStore>,
}

impl Optimizer {
    pub fn new(artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { artifacts }
    }

    /// Load the current artifacts and assign every resource, in input order.
    /// An empty batch returns immediately without reading the artifacts.
    pub fn optimize(&self, resources: &[ResourceRecord]) -> Result<Vec<ClusterAssignment>> {
        if resources.is_empty() {
            return Ok(Vec::new());
        }

        let stored = self
            .artifacts
            .load()
            .map_err(|e| PipelineError::model_unavailable(e.to_string()))?;

        debug!(
            generation = %stored.generation,
            resources = resources.len(),
            "Assigning resources to clusters"
        );
        assign(&stored.artifacts, resources)
    }
}

impl ResourceAnalyzer for Optimizer {
    type Output = ClusterAssignment;

    fn analyze(&self, resources: &[ResourceRecord]) -> Result<Vec<ClusterAssignment>> {
        self.optimize(resources)
    }

    fn requires_artifacts(&self) -> bool {
        true
    }
}

/// Assign resources against an already loaded artifact set
pub fn assign(artifacts: &ArtifactSet, resources: &[ResourceRecord]) -> Result<Vec<ClusterAssignment>> {
    let normalized = artifacts.scaler.transform(&extract_batch(resources));

    resources
        .iter()
        .zip(normalized.iter())
        .map(|(resource, features)| {
            let cluster_id = artifacts.kmeans.predict_one(features);
            let recommendation =
                Recommendation::from_cluster(cluster_id).ok_or(PipelineError::InvalidCluster(cluster_id))?;
            Ok(ClusterAssignment {
                resource_id: resource.id.clone(),
                cluster_id,
                recommendation,
            })
        })
        .collect()
}
