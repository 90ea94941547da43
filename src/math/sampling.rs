//! Error and secret distributions.
//!
//! Discrete Gaussian errors come from rejection sampling over a ChaCha20
//! stream; secrets and encryption randomness are ternary.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Default Gaussian standard deviation.
pub const DEFAULT_SIGMA: f64 = 3.2;

/// Discrete Gaussian sampler over Z using rejection sampling.
#[derive(Clone)]
pub struct GaussianSampler {
    sigma: f64,
    /// Samples beyond this bound are never produced.
    tailcut: i64,
    rng: ChaCha20Rng,
}

impl GaussianSampler {
    /// Deterministic sampler, for tests and reproducible key material.
    pub fn with_seed(sigma: f64, seed: u64) -> Self {
        Self::from_chacha(sigma, ChaCha20Rng::seed_from_u64(seed))
    }

    /// Sampler seeded from operating-system entropy.
    pub fn from_entropy(sigma: f64) -> Self {
        Self::from_chacha(sigma, ChaCha20Rng::from_entropy())
    }

    /// Sampler whose seed is drawn from another generator.
    pub fn from_rng<R: Rng + ?Sized>(sigma: f64, rng: &mut R) -> Self {
        Self::from_chacha(sigma, ChaCha20Rng::from_seed(rng.gen()))
    }

    fn from_chacha(sigma: f64, rng: ChaCha20Rng) -> Self {
        Self {
            sigma,
            tailcut: (sigma * 6.0).ceil() as i64,
            rng,
        }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Sample a centered value from D_σ.
    pub fn sample(&mut self) -> i64 {
        let sigma_sq_2 = 2.0 * self.sigma * self.sigma;
        let bound = self.tailcut;

        loop {
            let x = self.rng.gen_range(-bound..=bound);
            let prob = (-((x * x) as f64) / sigma_sq_2).exp();
            let u: f64 = self.rng.gen();
            if u < prob {
                return x;
            }
        }
    }

    pub fn sample_vec(&mut self, len: usize) -> Vec<i64> {
        (0..len).map(|_| self.sample()).collect()
    }
}

impl std::fmt::Debug for GaussianSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaussianSampler")
            .field("sigma", &self.sigma)
            .field("tailcut", &self.tailcut)
            .finish()
    }
}

/// Uniform ternary vector with coefficients in {-1, 0, 1}.
pub fn sample_ternary<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<i64> {
    (0..len).map(|_| rng.gen_range(-1i64..=1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tailcut_bounds() {
        let mut sampler = GaussianSampler::with_seed(DEFAULT_SIGMA, 1);
        let bound = (6.0 * DEFAULT_SIGMA).ceil() as i64;
        assert!((0..10_000).all(|_| sampler.sample().abs() <= bound));
    }

    #[test]
    fn test_deterministic_seeding() {
        let mut s1 = GaussianSampler::with_seed(DEFAULT_SIGMA, 12345);
        let mut s2 = GaussianSampler::with_seed(DEFAULT_SIGMA, 12345);
        assert_eq!(s1.sample_vec(64), s2.sample_vec(64));
    }

    #[test]
    fn test_distribution_moments() {
        let mut sampler = GaussianSampler::with_seed(DEFAULT_SIGMA, 42);
        let n = 50_000;
        let samples = sampler.sample_vec(n);

        let mean = samples.iter().sum::<i64>() as f64 / n as f64;
        let variance = samples
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / n as f64;

        assert!(mean.abs() < 0.1, "mean {} too far from 0", mean);
        let expected = DEFAULT_SIGMA * DEFAULT_SIGMA;
        assert!(
            (variance - expected).abs() / expected < 0.1,
            "variance {} differs from {}",
            variance,
            expected
        );
    }

    #[test]
    fn test_ternary_range() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let v = sample_ternary(1000, &mut rng);
        assert!(v.iter().all(|c| (-1..=1).contains(c)));
        assert!(v.contains(&-1) && v.contains(&0) && v.contains(&1));
    }
}
