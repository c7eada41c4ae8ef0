//! Feature extraction for clustering and outlier scoring
//!
//! Every model in the pipeline consumes the same five features in the same
//! order. The order is fixed by [`FEATURE_ORDER`] and persisted alongside
//! trained artifacts so a mismatch is caught at load time.

use crate::models::{ResourceRecord, ResourceSample};
use serde::{Deserialize, Serialize};

/// Number of features in a [`FeatureVector`]
pub const NUM_FEATURES: usize = 5;

/// Canonical feature names, in vector order
pub const FEATURE_ORDER: [&str; NUM_FEATURES] = [
    "cpu_usage",
    "memory_usage",
    "execution_time",
    "network_traffic",
    "power_consumption",
];

/// Alternative attribute names accepted for each feature, in vector order.
/// The dashboard reports execution time as uptime, network traffic as
/// network_in and power draw as disk_read.
const FEATURE_ALIASES: [&[&str]; NUM_FEATURES] =
    [&[], &[], &["uptime"], &["network_in"], &["disk_read"]];

/// Fixed-order numeric features for one resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector([f64; NUM_FEATURES]);

impl FeatureVector {
    pub fn new(values: [f64; NUM_FEATURES]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64; NUM_FEATURES] {
        &self.0
    }

    pub fn cpu_usage(&self) -> f64 {
        self.0[0]
    }

    pub fn memory_usage(&self) -> f64 {
        self.0[1]
    }

    pub fn execution_time(&self) -> f64 {
        self.0[2]
    }

    pub fn network_traffic(&self) -> f64 {
        self.0[3]
    }

    pub fn power_consumption(&self) -> f64 {
        self.0[4]
    }

    pub(crate) fn squared_distance(&self, other: &FeatureVector) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum()
    }
}

impl From<[f64; NUM_FEATURES]> for FeatureVector {
    fn from(values: [f64; NUM_FEATURES]) -> Self {
        Self(values)
    }
}

/// Anything a feature vector can be extracted from
pub trait FeatureSource {
    fn features(&self) -> FeatureVector;
}

impl FeatureSource for ResourceSample {
    fn features(&self) -> FeatureVector {
        FeatureVector([
            self.cpu_usage,
            self.memory_usage,
            self.execution_time,
            self.network_traffic,
            self.power_consumption,
        ])
    }
}

impl FeatureSource for ResourceRecord {
    /// Lenient extraction: a missing or non-numeric metric becomes 0.0
    fn features(&self) -> FeatureVector {
        let mut values = [0.0; NUM_FEATURES];
        for (idx, name) in FEATURE_ORDER.iter().enumerate() {
            values[idx] = std::iter::once(*name)
                .chain(FEATURE_ALIASES[idx].iter().copied())
                .find_map(|key| self.metric(key))
                .unwrap_or(0.0);
        }
        FeatureVector(values)
    }
}

impl FeatureSource for FeatureVector {
    fn features(&self) -> FeatureVector {
        *self
    }
}

/// Extract features for a batch, preserving input order
pub fn extract_batch<T: FeatureSource>(items: &[T]) -> Vec<FeatureVector> {
    items.iter().map(FeatureSource::features).collect()
}

/// Check a persisted feature order against [`FEATURE_ORDER`]
pub fn matches_feature_order(order: &[String]) -> bool {
    order.len() == NUM_FEATURES
        && order
            .iter()
            .zip(FEATURE_ORDER.iter())
            .all(|(persisted, expected)| persisted == expected)
}

pub fn feature_order_owned() -> Vec<String> {
    FEATURE_ORDER.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_feature_order_from_canonical_names() {
        let record = ResourceRecord::new("vm-1")
            .with_metric("cpu_usage", 50.0)
            .with_metric("memory_usage", 20.0)
            .with_metric("execution_time", 5.0)
            .with_metric("network_traffic", 100.0)
            .with_metric("power_consumption", 300.0);

        assert_eq!(record.features().values(), &[50.0, 20.0, 5.0, 100.0, 300.0]);
    }

    #[test]
    fn test_feature_order_from_dashboard_aliases() {
        let record = ResourceRecord::new("vm-1")
            .with_metric("cpu_usage", 50.0)
            .with_metric("memory_usage", 20.0)
            .with_metric("uptime", 5.0)
            .with_metric("network_in", 100.0)
            .with_metric("disk_read", 300.0);

        assert_eq!(record.features().values(), &[50.0, 20.0, 5.0, 100.0, 300.0]);
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        let record = ResourceRecord::new("vm-1").with_metric("memory_usage", 42.0);
        assert_eq!(record.features().values(), &[0.0, 42.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_non_numeric_field_defaults_to_zero() {
        let record: ResourceRecord =
            serde_json::from_str(r#"{"id": "vm-1", "cpu_usage": "high", "memory_usage": 7}"#)
                .unwrap();
        assert_eq!(record.features().values(), &[0.0, 7.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_typed_sample_extraction() {
        let sample = ResourceSample {
            vm_id: "vm-1".to_string(),
            cpu_usage: 50.0,
            memory_usage: 20.0,
            network_traffic: 100.0,
            power_consumption: 300.0,
            execution_time: 5.0,
            task_type: "compute".to_string(),
            timestamp: "2023-01-25 09:10:54".to_string(),
        };
        assert_eq!(sample.features().values(), &[50.0, 20.0, 5.0, 100.0, 300.0]);
    }

    #[test]
    fn test_persisted_order_check() {
        assert!(matches_feature_order(&feature_order_owned()));

        let mut swapped = feature_order_owned();
        swapped.swap(2, 3);
        assert!(!matches_feature_order(&swapped));
        assert!(!matches_feature_order(&swapped[..4]));
    }

    proptest! {
        #[test]
        fn prop_record_and_sample_agree(
            cpu in 0.0f64..100.0,
            mem in 0.0f64..100.0,
            exec in 0.0f64..10_000.0,
            net in 0.0f64..1_000.0,
            power in 0.0f64..500.0,
        ) {
            let sample = ResourceSample {
                vm_id: "vm".to_string(),
                cpu_usage: cpu,
                memory_usage: mem,
                network_traffic: net,
                power_consumption: power,
                execution_time: exec,
                task_type: "io".to_string(),
                timestamp: String::new(),
            };
            let record = ResourceRecord::from(&sample);
            prop_assert_eq!(sample.features(), record.features());
            prop_assert_eq!(*sample.features().values(), [cpu, mem, exec, net, power]);
        }
    }
}
