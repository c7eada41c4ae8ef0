//! Core data models for the dashboard pipeline

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One telemetry row for a virtual machine, as held by the telemetry store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSample {
    pub vm_id: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_traffic: f64,
    pub power_consumption: f64,
    pub execution_time: f64,
    pub task_type: String,
    pub timestamp: String,
}

/// Lifecycle status reported for a resource by the idle detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResourceStatus {
    #[default]
    Running,
    Idle,
}

/// Loosely-typed resource record as exchanged with request handlers
///
/// Metric values live in `attributes` under either their telemetry column
/// name (`execution_time`) or the dashboard alias (`uptime`). Anything not
/// numeric is treated as absent by feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
    #[serde(default)]
    pub status: ResourceStatus,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

fn default_resource_type() -> String {
    "VM".to_string()
}

impl ResourceRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: default_resource_type(),
            status: ResourceStatus::Running,
            attributes: Map::new(),
        }
    }

    /// Builder-style helper to set a numeric attribute
    pub fn with_metric(mut self, name: &str, value: f64) -> Self {
        self.set_metric(name, value);
        self
    }

    pub fn set_metric(&mut self, name: &str, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        self.attributes.insert(name.to_string(), value);
    }

    /// Numeric attribute value, `None` when absent or not a number
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).and_then(Value::as_f64)
    }
}

impl From<&ResourceSample> for ResourceRecord {
    fn from(sample: &ResourceSample) -> Self {
        ResourceRecord::new(sample.vm_id.clone())
            .with_metric("cpu_usage", sample.cpu_usage)
            .with_metric("memory_usage", sample.memory_usage)
            .with_metric("uptime", sample.execution_time)
            .with_metric("network_in", sample.network_traffic)
            .with_metric("disk_read", sample.power_consumption)
    }
}

/// Fixed recommendation attached to each k-means cluster id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Downsize instance type")]
    DownsizeInstanceType,
    #[serde(rename = "Switch to spot instances")]
    SwitchToSpotInstances,
    #[serde(rename = "Archive idle storage")]
    ArchiveIdleStorage,
}

impl Recommendation {
    pub const ALL: [Recommendation; 3] = [
        Recommendation::DownsizeInstanceType,
        Recommendation::SwitchToSpotInstances,
        Recommendation::ArchiveIdleStorage,
    ];

    /// Map a cluster id to its recommendation. Ids outside `0..3` have no mapping.
    pub fn from_cluster(cluster_id: usize) -> Option<Self> {
        Self::ALL.get(cluster_id).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::DownsizeInstanceType => "Downsize instance type",
            Recommendation::SwitchToSpotInstances => "Switch to spot instances",
            Recommendation::ArchiveIdleStorage => "Archive idle storage",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimizer output for a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub resource_id: String,
    pub cluster_id: usize,
    pub recommendation: Recommendation,
}

/// Idle detector output for a single resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResource {
    #[serde(flatten)]
    pub record: ResourceRecord,
    pub is_idle: bool,
    pub anomaly_score: f64,
    pub confidence: f64,
}
