//! Detection and recommendation pipeline for the cloud dashboard
//!
//! This crate provides:
//! - Telemetry access (cleaned CSV export, in-memory, synthetic batches)
//! - Feature extraction, scaling and k-means training
//! - Versioned, checksummed artifact storage
//! - Idle resource detection with an isolation forest
//! - Cluster-based optimization recommendations
//! - Health checks and observability

pub mod anomaly;
pub mod artifacts;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod telemetry;

pub use error::{PipelineError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use lifecycle::{BatchSource, ModelLifecycle, ModelState, ModelStatus};
pub use models::*;
pub use observability::{DashboardMetrics, StructuredLogger};
