//! Telemetry sources for training and detection
//!
//! The store holding raw per-VM samples lives outside this crate; the
//! pipeline only needs to read it. Implementations are provided for the
//! cleaned CSV export and for in-memory batches.

mod csv_store;
mod synthetic;

pub use csv_store::CsvTelemetryStore;
pub use synthetic::{SyntheticConfig, SyntheticSampler};

use crate::error::Result;
use crate::models::ResourceSample;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::RngCore;
use std::collections::HashSet;
use tokio::sync::RwLock;

/// Read access to per-VM telemetry samples
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Every sample currently in the store
    async fn fetch_all(&self) -> Result<Vec<ResourceSample>>;

    /// Samples whose `vm_id` is in `ids`, in store order
    async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<ResourceSample>> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        Ok(self
            .fetch_all()
            .await?
            .into_iter()
            .filter(|s| wanted.contains(s.vm_id.as_str()))
            .collect())
    }

    /// Uniform sample without replacement of `min(n, len)` rows
    async fn sample(&self, n: usize, rng: &mut (dyn RngCore + Send)) -> Result<Vec<ResourceSample>> {
        let all = self.fetch_all().await?;
        Ok(all.choose_multiple(rng, n.min(all.len())).cloned().collect())
    }
}

/// Vector-backed store
#[derive(Debug, Default)]
pub struct InMemoryTelemetryStore {
    samples: RwLock<Vec<ResourceSample>>,
}

impl InMemoryTelemetryStore {
    pub fn new(samples: Vec<ResourceSample>) -> Self {
        Self {
            samples: RwLock::new(samples),
        }
    }

    pub async fn insert(&self, sample: ResourceSample) {
        self.samples.write().await.push(sample);
    }

    pub async fn clear(&self) {
        self.samples.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.samples.read().await.len()
    }
}

#[async_trait]
impl TelemetryStore for InMemoryTelemetryStore {
    async fn fetch_all(&self) -> Result<Vec<ResourceSample>> {
        Ok(self.samples.read().await.clone())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn sample(vm_id: &str, cpu: f64, mem: f64) -> ResourceSample {
        ResourceSample {
            vm_id: vm_id.to_string(),
            cpu_usage: cpu,
            memory_usage: mem,
            network_traffic: 500.0,
            power_consumption: 250.0,
            execution_time: 20.0,
            task_type: "compute".to_string(),
            timestamp: "2023-01-25 09:10:54".to_string(),
        }
    }

    /// Deterministic spread of samples over three loose usage profiles
    pub fn fleet(n: usize) -> Vec<ResourceSample> {
        (0..n)
            .map(|i| {
                let profile = (i % 3) as f64;
                let wobble = (i as f64 * 0.37).sin();
                ResourceSample {
                    vm_id: format!("vm-{:03}", i),
                    cpu_usage: 15.0 + profile * 30.0 + wobble * 4.0,
                    memory_usage: 20.0 + profile * 25.0 + wobble * 3.0,
                    network_traffic: 200.0 + profile * 250.0 + wobble * 20.0,
                    power_consumption: 150.0 + profile * 100.0 + wobble * 10.0,
                    execution_time: 10.0 + profile * 15.0 + wobble,
                    task_type: ["io", "compute", "network"][i % 3].to_string(),
                    timestamp: format!("2023-01-25 09:{:02}:00", i % 60),
                }
            })
            .collect()
    }
}
