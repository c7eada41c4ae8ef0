//! Health and readiness for the dashboard backend
//!
//! Components report their own status; readiness additionally folds in the
//! model lifecycle, since a dashboard that is mid-training cannot serve the
//! optimizer.

use crate::error::{PipelineError, Result};
use crate::lifecycle::ModelState;
use crate::pipeline::TrainOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Serving, but with reduced functionality (e.g. no trained model)
    Degraded,
    /// Component has failed
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the component still serves requests
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }

    fn severity(&self) -> u8 {
        match self {
            ComponentStatus::Healthy => 0,
            ComponentStatus::Degraded => 1,
            ComponentStatus::Unhealthy => 2,
        }
    }
}

/// Last reported state of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn at_now(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::at_now(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::at_now(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::at_now(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst component status, `Healthy` when nothing is registered
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|h| h.status)
            .max_by_key(ComponentStatus::severity)
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub model_state: ModelState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const TRAINER: &str = "trainer";
    pub const ARTIFACT_STORE: &str = "artifact_store";
    pub const TELEMETRY: &str = "telemetry";
    pub const DETECTOR: &str = "detector";

    pub const ALL: [&str; 4] = [TRAINER, ARTIFACT_STORE, TELEMETRY, DETECTOR];
}

#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    initialized: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            initialized: Arc::new(RwLock::new(false)),
        }
    }

    /// Registry with every dashboard component marked healthy
    pub async fn with_all_components() -> Self {
        let registry = Self::new();
        for name in components::ALL {
            registry.set_healthy(name).await;
        }
        registry
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        self.components.write().await.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Mark startup as complete; until then readiness is always false
    pub async fn set_initialized(&self, initialized: bool) {
        *self.initialized.write().await = initialized;
    }

    /// Reflect a training attempt on the trainer and on the component that
    /// caused a failure.
    pub async fn record_training(&self, result: &Result<Option<TrainOutcome>>) {
        match result {
            Ok(Some(TrainOutcome::InsufficientData { available, required })) => {
                self.set_degraded(
                    components::TRAINER,
                    format!("Not enough data to train ({} of {} samples)", available, required),
                )
                .await;
            }
            Ok(_) => {
                self.set_healthy(components::TRAINER).await;
                self.set_healthy(components::ARTIFACT_STORE).await;
                self.set_healthy(components::TELEMETRY).await;
            }
            Err(e) => {
                let culprit = match e {
                    PipelineError::Telemetry { .. } => components::TELEMETRY,
                    _ => components::ARTIFACT_STORE,
                };
                self.set_degraded(culprit, e.to_string()).await;
                self.set_degraded(components::TRAINER, "Last training attempt failed")
                    .await;
            }
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Ready once startup finished, no component is unhealthy and no
    /// training run is replacing the artifacts. An untrained model still
    /// serves idle detection, so it only adds a reason.
    pub async fn readiness(&self, model_state: ModelState) -> ReadinessResponse {
        let initialized = *self.initialized.read().await;
        let unhealthy: Option<String> = self
            .components
            .read()
            .await
            .iter()
            .filter(|(_, h)| h.status == ComponentStatus::Unhealthy)
            .map(|(name, _)| name.clone())
            .min();

        let (ready, reason) = if !initialized {
            (false, Some("Dashboard not yet initialized".to_string()))
        } else if let Some(name) = unhealthy {
            (false, Some(format!("Critical component unhealthy: {}", name)))
        } else {
            match model_state {
                ModelState::Training => (false, Some("Model training in progress".to_string())),
                ModelState::Untrained => (true, Some("No trained model; optimizer unavailable".to_string())),
                ModelState::Ready => (true, None),
            }
        };

        ReadinessResponse {
            ready,
            model_state,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_worst_component_wins() {
        let registry = HealthRegistry::with_all_components().await;
        assert_eq!(registry.health().await.components.len(), 4);

        registry.set_degraded(components::TRAINER, "no data").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.set_unhealthy(components::TELEMETRY, "gone").await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(!health.status.is_operational());
    }

    #[tokio::test]
    async fn test_insufficient_data_degrades_trainer() {
        let registry = HealthRegistry::with_all_components().await;
        registry
            .record_training(&Ok(Some(TrainOutcome::InsufficientData {
                available: 1,
                required: 3,
            })))
            .await;

        let health = registry.health().await;
        let trainer = &health.components[components::TRAINER];
        assert_eq!(trainer.status, ComponentStatus::Degraded);
        assert_eq!(
            trainer.message.as_deref(),
            Some("Not enough data to train (1 of 3 samples)")
        );
        assert_eq!(health.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_telemetry_failure_blames_telemetry() {
        let registry = HealthRegistry::with_all_components().await;
        let failure = Err(PipelineError::telemetry("cleaned_vm_data.csv: No such file or directory"));
        registry.record_training(&failure).await;

        let health = registry.health().await;
        assert_eq!(health.components[components::TELEMETRY].status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::ARTIFACT_STORE].status,
            ComponentStatus::Healthy
        );

        registry.record_training(&Ok(None)).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_not_ready_before_startup_completes() {
        let registry = HealthRegistry::with_all_components().await;
        let readiness = registry.readiness(ModelState::Ready).await;

        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Dashboard not yet initialized"));
    }

    #[tokio::test]
    async fn test_readiness_follows_model_state() {
        let registry = HealthRegistry::with_all_components().await;
        registry.set_initialized(true).await;

        let ready = registry.readiness(ModelState::Ready).await;
        assert!(ready.ready);
        assert!(ready.reason.is_none());

        let untrained = registry.readiness(ModelState::Untrained).await;
        assert!(untrained.ready);
        assert_eq!(untrained.model_state, ModelState::Untrained);
        assert!(untrained.reason.is_some());

        let training = registry.readiness(ModelState::Training).await;
        assert!(!training.ready);
        assert_eq!(training.reason.as_deref(), Some("Model training in progress"));
    }

    #[tokio::test]
    async fn test_unhealthy_component_blocks_readiness() {
        let registry = HealthRegistry::with_all_components().await;
        registry.set_initialized(true).await;
        registry
            .set_unhealthy(components::ARTIFACT_STORE, "checksum mismatch")
            .await;

        let readiness = registry.readiness(ModelState::Ready).await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Critical component unhealthy: artifact_store")
        );
    }
}
