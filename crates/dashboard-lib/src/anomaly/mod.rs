//! Idle resource detection
//!
//! Unsupervised outlier scoring over a single batch. Resources whose usage
//! profile is isolated from the rest of the batch are reported as idle.

mod idle_detector;
mod isolation_forest;

pub use idle_detector::{
    IdleDetector, IdleDetectorConfig, IdleReport, IDLE_CONTAMINATION, LIVE_CONTAMINATION,
    SAVINGS_PER_IDLE_RESOURCE,
};
pub use isolation_forest::{IsolationForest, IsolationForestConfig, OutlierScore};
