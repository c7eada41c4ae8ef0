//! Seeded k-means clustering
//!
//! k-means++ initialisation followed by Lloyd iterations, restarted
//! `n_init` times from one seeded generator; the run with the lowest
//! inertia wins. Same data and seed always give the same centroids.

use super::features::{FeatureVector, NUM_FEATURES};
use crate::error::{PipelineError, Result};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

/// Default number of clusters, one per recommendation
pub const DEFAULT_CLUSTERS: usize = 3;

#[derive(Debug, Clone)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    pub max_iterations: usize,
    /// Convergence threshold, relative to the mean per-feature variance
    pub tolerance: f64,
    /// Number of independently initialised runs
    pub n_init: usize,
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: DEFAULT_CLUSTERS,
            max_iterations: 300,
            tolerance: 1e-4,
            n_init: 10,
            seed: 42,
        }
    }
}

/// Fitted clustering model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeans {
    pub centroids: Vec<FeatureVector>,
    pub inertia: f64,
    pub iterations: usize,
    pub seed: u64,
}

impl KMeans {
    pub fn fit(data: &[FeatureVector], config: &KMeansConfig) -> Result<Self> {
        if data.is_empty() || config.n_clusters == 0 {
            return Err(PipelineError::EmptyTrainingSet);
        }

        let mut rng = Pcg64::seed_from_u64(config.seed);
        let tolerance = config.tolerance * mean_variance(data);

        let mut best: Option<KMeans> = None;
        for _ in 0..config.n_init.max(1) {
            let init = init_plus_plus(data, config.n_clusters, &mut rng);
            let run = lloyd(data, init, config.max_iterations, tolerance, config.seed);
            let better = best
                .as_ref()
                .map(|b| run.inertia < b.inertia)
                .unwrap_or(true);
            if better {
                best = Some(run);
            }
        }

        best.ok_or(PipelineError::EmptyTrainingSet)
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// Index of the nearest centroid; ties go to the lowest index
    pub fn predict_one(&self, v: &FeatureVector) -> usize {
        nearest(&self.centroids, v).0
    }

    pub fn predict(&self, data: &[FeatureVector]) -> Vec<usize> {
        data.iter().map(|v| self.predict_one(v)).collect()
    }

    pub fn is_valid(&self, expected_clusters: usize) -> bool {
        self.centroids.len() == expected_clusters
            && self
                .centroids
                .iter()
                .all(|c| c.values().iter().all(|x| x.is_finite()))
    }
}

fn nearest(centroids: &[FeatureVector], v: &FeatureVector) -> (usize, f64) {
    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = v.squared_distance(c);
        if d < best_dist {
            best_dist = d;
            best_idx = i;
        }
    }
    (best_idx, best_dist)
}

fn mean_variance(data: &[FeatureVector]) -> f64 {
    let n = data.len() as f64;
    let mut total = 0.0;
    for f in 0..NUM_FEATURES {
        let mean = data.iter().map(|v| v.values()[f]).sum::<f64>() / n;
        total += data
            .iter()
            .map(|v| (v.values()[f] - mean).powi(2))
            .sum::<f64>()
            / n;
    }
    total / NUM_FEATURES as f64
}

/// k-means++ seeding. When every point already coincides with a chosen
/// centroid (fewer distinct points than clusters) a random point is reused.
fn init_plus_plus(data: &[FeatureVector], k: usize, rng: &mut Pcg64) -> Vec<FeatureVector> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(data[rng.gen_range(0..data.len())]);

    while centroids.len() < k {
        let distances: Vec<f64> = data.iter().map(|v| nearest(&centroids, v).1).collect();
        let sum: f64 = distances.iter().sum();

        if sum <= 0.0 {
            centroids.push(data[rng.gen_range(0..data.len())]);
            continue;
        }

        let threshold = rng.gen::<f64>() * sum;
        let mut cumulative = 0.0;
        let mut chosen = data.len() - 1;
        for (i, d) in distances.iter().enumerate() {
            cumulative += d;
            if cumulative > threshold {
                chosen = i;
                break;
            }
        }
        centroids.push(data[chosen]);
    }

    centroids
}

fn lloyd(
    data: &[FeatureVector],
    mut centroids: Vec<FeatureVector>,
    max_iterations: usize,
    tolerance: f64,
    seed: u64,
) -> KMeans {
    let k = centroids.len();
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        let mut sums = vec![[0.0; NUM_FEATURES]; k];
        let mut counts = vec![0usize; k];
        for v in data {
            let (idx, _) = nearest(&centroids, v);
            counts[idx] += 1;
            for (s, x) in sums[idx].iter_mut().zip(v.values()) {
                *s += x;
            }
        }

        let mut shift = 0.0;
        for i in 0..k {
            // empty clusters keep their previous centroid
            if counts[i] == 0 {
                continue;
            }
            let mut updated = sums[i];
            for x in updated.iter_mut() {
                *x /= counts[i] as f64;
            }
            let updated = FeatureVector::new(updated);
            shift += centroids[i].squared_distance(&updated);
            centroids[i] = updated;
        }

        if shift <= tolerance {
            break;
        }
    }

    let inertia = data.iter().map(|v| nearest(&centroids, v).1).sum();

    KMeans {
        centroids,
        inertia,
        iterations,
        seed,
    }
}
