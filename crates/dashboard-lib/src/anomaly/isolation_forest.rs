//! Isolation forest outlier scoring
//!
//! Builds an ensemble of random partition trees over sub-samples of the
//! batch. Points that are isolated after few splits get scores close to 1,
//! points deep inside dense regions get scores well below 0.5. The outlier
//! threshold is placed so that roughly `contamination` of the fitted batch
//! scores above it.

use crate::error::{PipelineError, Result};
use crate::pipeline::{FeatureVector, NUM_FEATURES};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Euler–Mascheroni constant, for the harmonic number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
pub struct IsolationForestConfig {
    pub n_estimators: usize,
    /// Sub-sample size per tree, capped at the batch size
    pub max_samples: usize,
    /// Expected fraction of outliers in the fitted batch
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    threshold: f64,
}

/// Score and label for one point of the fitted batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlierScore {
    pub score: f64,
    pub is_outlier: bool,
}

impl IsolationForest {
    /// Fit on `data` and calibrate the threshold against the same batch
    pub fn fit(data: &[FeatureVector], config: &IsolationForestConfig) -> Result<Self> {
        if data.is_empty() {
            return Err(PipelineError::EmptyTrainingSet);
        }

        let mut rng = Pcg64::seed_from_u64(config.seed);
        let sample_size = config.max_samples.clamp(1, data.len());
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..config.n_estimators.max(1))
            .map(|_| {
                let picked: Vec<&FeatureVector> = index::sample(&mut rng, data.len(), sample_size)
                    .into_iter()
                    .map(|i| &data[i])
                    .collect();
                build(&picked, 0, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            threshold: 1.0,
        };

        let scores: Vec<f64> = data.iter().map(|v| forest.score(v)).collect();
        let contamination = config.contamination.clamp(0.0, 0.5);
        forest.threshold = percentile(&scores, 100.0 * (1.0 - contamination));

        Ok(forest)
    }

    /// Anomaly score in (0, 1]; higher means easier to isolate
    pub fn score(&self, v: &FeatureVector) -> f64 {
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|t| path_length(t, v, 0))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normalizer = average_path_length(self.sample_size);
        if normalizer <= 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / normalizer)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, v: &FeatureVector) -> OutlierScore {
        let score = self.score(v);
        OutlierScore {
            score,
            is_outlier: score > self.threshold,
        }
    }

    /// Fit on the batch and label every point of it
    pub fn fit_predict(data: &[FeatureVector], config: &IsolationForestConfig) -> Result<(Self, Vec<OutlierScore>)> {
        let forest = Self::fit(data, config)?;
        let labels = data.iter().map(|v| forest.classify(v)).collect();
        Ok((forest, labels))
    }
}

fn build<R: Rng + ?Sized>(points: &[&FeatureVector], depth: usize, limit: usize, rng: &mut R) -> Node {
    if depth >= limit || points.len() <= 1 {
        return Node::Leaf { size: points.len() };
    }

    let mut spread: Vec<(usize, f64, f64)> = Vec::with_capacity(NUM_FEATURES);
    for f in 0..NUM_FEATURES {
        let (lo, hi) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            (lo.min(p.values()[f]), hi.max(p.values()[f]))
        });
        if lo.is_finite() && hi.is_finite() && hi > lo {
            spread.push((f, lo, hi));
        }
    }
    if spread.is_empty() {
        return Node::Leaf { size: points.len() };
    }

    let (feature, lo, hi) = spread[rng.gen_range(0..spread.len())];
    let value = split_value(lo, hi, rng.gen::<f64>());
    let (left, right): (Vec<&FeatureVector>, Vec<&FeatureVector>) =
        points.iter().partition(|p| p.values()[feature] < value);

    Node::Split {
        feature,
        value,
        left: Box::new(build(&left, depth + 1, limit, rng)),
        right: Box::new(build(&right, depth + 1, limit, rng)),
    }
}

/// Point at fraction `u` of `[lo, hi]`. Interpolates instead of taking
/// `hi - lo`, which overflows for bounds near `f64::MAX` of opposite sign.
fn split_value(lo: f64, hi: f64, u: f64) -> f64 {
    (lo * (1.0 - u) + hi * u).clamp(lo, hi)
}

fn path_length(node: &Node, v: &FeatureVector, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            value,
            left,
            right,
        } => {
            if v.values()[*feature] < *value {
                path_length(left, v, depth + 1)
            } else {
                path_length(right, v, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `p` in [0, 100]
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outlier(n: usize, outlier_at: usize) -> Vec<FeatureVector> {
        (0..n)
            .map(|i| {
                if i == outlier_at {
                    FeatureVector::new([99.0, 98.0, 500.0, 950.0, 490.0])
                } else {
                    let d = i as f64;
                    FeatureVector::new([
                        20.0 + d,
                        30.0 + (d * 1.3) % 4.0,
                        40.0 + (d * 0.7) % 3.0,
                        200.0 + d * 2.0,
                        250.0 + (d * 3.1) % 5.0,
                    ])
                }
            })
            .collect()
    }

    #[test]
    fn test_average_path_length_values() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ≈ 10.24
        assert!((average_path_length(256) - 10.24).abs() < 0.01);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 50.0), 3.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
        assert!((percentile(&values, 90.0) - 4.6).abs() < 1e-12);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_outlier_scores_highest() {
        let data = cluster_with_outlier(20, 7);
        let forest = IsolationForest::fit(&data, &IsolationForestConfig::default()).unwrap();

        let outlier_score = forest.score(&data[7]);
        for (i, v) in data.iter().enumerate() {
            if i != 7 {
                assert!(forest.score(v) < outlier_score, "point {} scored above outlier", i);
            }
        }
        assert!(outlier_score > 0.5);
    }

    #[test]
    fn test_contamination_bounds_flag_count() {
        let data = cluster_with_outlier(20, 3);
        let config = IsolationForestConfig {
            contamination: 0.1,
            ..Default::default()
        };
        let (_, labels) = IsolationForest::fit_predict(&data, &config).unwrap();

        let flagged = labels.iter().filter(|l| l.is_outlier).count();
        assert!(flagged >= 1 && flagged <= 2, "flagged {}", flagged);
        assert!(labels[3].is_outlier);
    }

    #[test]
    fn test_identical_points_never_flagged() {
        let data = vec![FeatureVector::new([5.0; NUM_FEATURES]); 12];
        let (_, labels) = IsolationForest::fit_predict(&data, &IsolationForestConfig::default()).unwrap();
        assert!(labels.iter().all(|l| !l.is_outlier));
    }

    #[test]
    fn test_single_point_batch() {
        let data = vec![FeatureVector::new([1.0; NUM_FEATURES])];
        let (_, labels) = IsolationForest::fit_predict(&data, &IsolationForestConfig::default()).unwrap();
        assert_eq!(labels.len(), 1);
        assert!(!labels[0].is_outlier);
    }

    #[test]
    fn test_split_value_stays_in_bounds() {
        assert_eq!(split_value(-1e308, 1e308, 0.0), -1e308);
        assert_eq!(split_value(2.0, 4.0, 0.5), 3.0);
        let wide = split_value(-f64::MAX, f64::MAX, 0.75);
        assert!(wide.is_finite() && wide > 0.0);
    }

    #[test]
    fn test_extreme_feature_range_fits() {
        let data = vec![
            FeatureVector::new([-1e308; NUM_FEATURES]),
            FeatureVector::new([1e308; NUM_FEATURES]),
            FeatureVector::new([0.0; NUM_FEATURES]),
        ];
        let (forest, labels) = IsolationForest::fit_predict(&data, &IsolationForestConfig::default()).unwrap();

        assert_eq!(labels.len(), 3);
        assert!(labels.iter().all(|l| l.score.is_finite()));
        assert!(forest.threshold().is_finite());
    }

    #[test]
    fn test_infinite_feature_is_not_split_on() {
        let mut data = cluster_with_outlier(12, 2);
        data[5] = FeatureVector::new([f64::INFINITY, 30.0, 40.0, 200.0, 250.0]);
        let (_, labels) = IsolationForest::fit_predict(&data, &IsolationForestConfig::default()).unwrap();
        assert!(labels.iter().all(|l| l.score.is_finite()));
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(IsolationForest::fit(&[], &IsolationForestConfig::default()).is_err());
    }

    #[test]
    fn test_same_seed_same_scores() {
        let data = cluster_with_outlier(15, 0);
        let config = IsolationForestConfig::default();
        let a = IsolationForest::fit(&data, &config).unwrap();
        let b = IsolationForest::fit(&data, &config).unwrap();
        for v in &data {
            assert_eq!(a.score(v), b.score(v));
        }
        assert_eq!(a.threshold(), b.threshold());
    }
}
