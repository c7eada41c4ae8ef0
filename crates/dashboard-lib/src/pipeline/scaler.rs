//! Per-feature standardization (zero mean, unit variance)

use super::features::{FeatureVector, NUM_FEATURES};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Fitted normalization parameters
///
/// Uses the population standard deviation. A feature with zero spread keeps
/// a scale of 1.0 so it is centred but not divided by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: [f64; NUM_FEATURES],
    pub scale: [f64; NUM_FEATURES],
    pub samples_seen: usize,
}

impl StandardScaler {
    pub fn fit(data: &[FeatureVector]) -> Result<Self> {
        if data.is_empty() {
            return Err(PipelineError::EmptyTrainingSet);
        }

        let n = data.len() as f64;
        let mut mean = [0.0; NUM_FEATURES];
        for v in data {
            for (m, x) in mean.iter_mut().zip(v.values()) {
                *m += x;
            }
        }
        for m in mean.iter_mut() {
            *m /= n;
        }

        let mut scale = [0.0; NUM_FEATURES];
        for v in data {
            for ((s, x), m) in scale.iter_mut().zip(v.values()).zip(mean.iter()) {
                *s += (x - m).powi(2);
            }
        }
        for s in scale.iter_mut() {
            let std_dev = (*s / n).sqrt();
            *s = if std_dev < f64::EPSILON { 1.0 } else { std_dev };
        }

        Ok(Self {
            mean,
            scale,
            samples_seen: data.len(),
        })
    }

    pub fn transform_one(&self, v: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; NUM_FEATURES];
        for (i, x) in v.values().iter().enumerate() {
            out[i] = (x - self.mean[i]) / self.scale[i];
        }
        FeatureVector::new(out)
    }

    pub fn transform(&self, data: &[FeatureVector]) -> Vec<FeatureVector> {
        data.iter().map(|v| self.transform_one(v)).collect()
    }

    /// Reject parameters that would poison every downstream distance
    pub fn is_valid(&self) -> bool {
        self.mean.iter().all(|m| m.is_finite())
            && self.scale.iter().all(|s| s.is_finite() && *s > 0.0)
    }
}
