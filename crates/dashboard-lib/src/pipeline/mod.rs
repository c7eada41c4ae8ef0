//! Training and clustering pipeline

mod features;
mod kmeans;
mod optimizer;
mod scaler;
mod split;
mod trainer;

pub use features::{
    extract_batch, feature_order_owned, matches_feature_order, FeatureSource, FeatureVector,
    FEATURE_ORDER, NUM_FEATURES,
};
pub use kmeans::{KMeans, KMeansConfig, DEFAULT_CLUSTERS};
pub use optimizer::{assign, Optimizer};
pub use scaler::StandardScaler;
pub use split::{TrainTestSplit, TEST_FRACTION};
pub use trainer::{ModelTrainer, TrainOutcome, TrainerConfig, DEFAULT_SEED, MIN_TRAINING_SAMPLES};

use crate::error::Result;
use crate::models::ResourceRecord;

/// Batch analysis over resource records
pub trait ResourceAnalyzer: Send + Sync {
    type Output;

    /// Analyze a batch; output order follows input order
    fn analyze(&self, resources: &[ResourceRecord]) -> Result<Vec<Self::Output>>;

    /// Whether the analyzer reads persisted artifacts
    fn requires_artifacts(&self) -> bool;
}
