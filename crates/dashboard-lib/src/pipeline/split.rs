//! Deterministic train/test partitioning

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;

/// Fraction of samples held out for the test partition
pub const TEST_FRACTION: f64 = 0.2;

/// Indices of a train/test partition over `0..n`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl TrainTestSplit {
    /// Shuffle `0..n` with a generator seeded from `seed` and hold out
    /// `ceil(n * test_fraction)` indices for testing. Both sides are
    /// non-empty whenever `n >= 2`.
    pub fn new(n: usize, test_fraction: f64, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = Pcg64::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = test_size(n, test_fraction);
        let train = indices.split_off(n_test);
        Self {
            train,
            test: indices,
        }
    }

    pub fn select<T: Clone>(&self, items: &[T]) -> (Vec<T>, Vec<T>) {
        let pick = |idx: &[usize]| idx.iter().map(|&i| items[i].clone()).collect();
        (pick(&self.train), pick(&self.test))
    }
}

fn test_size(n: usize, test_fraction: f64) -> usize {
    if n < 2 {
        return 0;
    }
    let raw = (n as f64 * test_fraction).ceil() as usize;
    raw.clamp(1, n - 1)
}
