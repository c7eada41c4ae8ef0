//! Persisted model artifacts
//!
//! A trained model is three blobs that only make sense together: the
//! normalization parameters, the clustering model and the held-out test
//! partition. Stores must publish and replace them as one unit.

mod fs_store;

pub use fs_store::{ArtifactManifest, FsArtifactStore, FsStoreConfig, CURRENT_POINTER};

use crate::error::Result;
use crate::pipeline::{FeatureVector, KMeans, StandardScaler};
use serde::{Deserialize, Serialize};

/// Blob names, shared by every store implementation
pub mod blobs {
    pub const SCALER: &str = "scaler.json";
    pub const KMEANS: &str = "kmeans.json";
    pub const TEST_SET: &str = "test_set.json";
    pub const MANIFEST: &str = "manifest.json";

    pub const ALL: [&str; 3] = [SCALER, KMEANS, TEST_SET];
}

/// One held-out resource: its id and its raw (unnormalized) features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEntry {
    pub vm_id: String,
    pub features: FeatureVector,
}

/// The test partition persisted by the trainer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestPartition {
    pub entries: Vec<TestEntry>,
}

impl TestPartition {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vm_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.vm_id.clone()).collect()
    }
}

/// Facts about a training run, stored next to the blobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub seed: u64,
    pub n_clusters: usize,
    pub feature_order: Vec<String>,
    pub train_size: usize,
    pub test_size: usize,
    pub trained_at: i64,
}

/// A complete, mutually consistent artifact set
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactSet {
    pub scaler: StandardScaler,
    pub kmeans: KMeans,
    pub test_set: TestPartition,
    pub info: ModelInfo,
}

/// An artifact set together with the generation it was loaded from
#[derive(Debug, Clone)]
pub struct StoredArtifacts {
    pub generation: String,
    pub artifacts: ArtifactSet,
}

/// Storage for trained artifacts
///
/// `replace` must be all-or-nothing: readers either see the previous
/// complete set or the new complete set, never a mix.
pub trait ArtifactStore: Send + Sync {
    /// Load and validate the current artifact set
    fn load(&self) -> Result<StoredArtifacts>;

    /// Publish a new artifact set, returning its generation id
    fn replace(&self, artifacts: &ArtifactSet) -> Result<String>;

    /// Generation id of the current set, if a pointer exists
    fn current_generation(&self) -> Option<String>;

    /// True when a complete, valid artifact set is present
    fn exists(&self) -> bool {
        self.load().is_ok()
    }
}
