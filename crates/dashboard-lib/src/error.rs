//! Error types for the detection and recommendation pipeline

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The trained artifacts are missing, unreadable or being replaced
    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// A cluster id with no recommendation attached
    #[error("cluster id {0} has no recommendation mapping")]
    InvalidCluster(usize),

    #[error("artifact {path:?}: {message}")]
    Artifact { path: PathBuf, message: String },

    #[error("telemetry store error: {message}")]
    Telemetry { message: String },

    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,
}

impl PipelineError {
    pub fn model_unavailable(reason: impl Into<String>) -> Self {
        PipelineError::ModelUnavailable {
            reason: reason.into(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        PipelineError::Artifact {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn telemetry(message: impl std::fmt::Display) -> Self {
        PipelineError::Telemetry {
            message: message.to_string(),
        }
    }

    /// Errors that mean "no usable model" from a caller's point of view
    pub fn is_model_unavailable(&self) -> bool {
        matches!(
            self,
            PipelineError::ModelUnavailable { .. } | PipelineError::Artifact { .. }
        )
    }
}
