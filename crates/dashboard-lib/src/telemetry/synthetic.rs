//! Synthetic resource batches for the live idle-detection view

use crate::models::ResourceRecord;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub batch_size: usize,
    pub cpu_range: (f64, f64),
    pub memory_range: (f64, f64),
    pub network_range: (f64, f64),
    pub power_range: (f64, f64),
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            cpu_range: (0.0, 100.0),
            memory_range: (0.0, 100.0),
            network_range: (0.0, 1000.0),
            power_range: (100.0, 500.0),
        }
    }
}

/// Generates uniformly distributed instance metrics.
/// Execution time is never reported, so it extracts as 0.0.
pub struct SyntheticSampler {
    config: SyntheticConfig,
}

impl SyntheticSampler {
    pub fn new(config: SyntheticConfig) -> Self {
        Self { config }
    }

    pub fn batch<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<ResourceRecord> {
        (0..self.config.batch_size)
            .map(|_| self.instance(rng))
            .collect()
    }

    fn instance<R: Rng + ?Sized>(&self, rng: &mut R) -> ResourceRecord {
        let c = &self.config;
        ResourceRecord::new(format!("i-{}", rng.gen_range(1000..=9999)))
            .with_metric("cpu_usage", rng.gen_range(c.cpu_range.0..c.cpu_range.1))
            .with_metric("memory_usage", rng.gen_range(c.memory_range.0..c.memory_range.1))
            .with_metric("network_traffic", rng.gen_range(c.network_range.0..c.network_range.1))
            .with_metric("power_consumption", rng.gen_range(c.power_range.0..c.power_range.1))
    }
}

impl Default for SyntheticSampler {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FeatureSource;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn test_batch_within_configured_ranges() {
        let sampler = SyntheticSampler::default();
        let mut rng = Pcg64::seed_from_u64(42);
        let batch = sampler.batch(&mut rng);

        assert_eq!(batch.len(), 10);
        for record in &batch {
            assert!(record.id.starts_with("i-"));
            let f = record.features();
            assert!((0.0..100.0).contains(&f.cpu_usage()));
            assert!((0.0..100.0).contains(&f.memory_usage()));
            assert_eq!(f.execution_time(), 0.0);
            assert!((0.0..1000.0).contains(&f.network_traffic()));
            assert!((100.0..500.0).contains(&f.power_consumption()));
        }
    }

    #[test]
    fn test_seeded_batches_repeat() {
        let sampler = SyntheticSampler::default();
        let a = sampler.batch(&mut Pcg64::seed_from_u64(3));
        let b = sampler.batch(&mut Pcg64::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
