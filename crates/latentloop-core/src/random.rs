//! Seedable normal sample generator

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used by a generator that was never seeded
pub const DEFAULT_SEED: u64 = 5489;

/// Box-Muller normal generator over a seedable uniform stream
///
/// Every call to [`next`](Self::next) consumes two uniform draws and yields one
/// sample; the sine half of the transform is discarded.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    rng: StdRng,
    mean: f32,
    stddev: f32,
}

impl RandomGenerator {
    /// Standard normal generator
    pub fn new() -> Self {
        Self::with_params(0.0, 1.0)
    }

    /// Generator for N(mean, stddev²)
    pub fn with_params(mean: f32, stddev: f32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
            mean,
            stddev,
        }
    }

    /// Standard normal generator seeded with `seed`
    pub fn seeded(seed: u64) -> Self {
        let mut generator = Self::new();
        generator.seed(seed);
        generator
    }

    /// Reseed the stream
    ///
    /// A seed of zero keeps the current stream position.
    pub fn seed(&mut self, seed: u64) {
        if seed == 0 {
            return;
        }
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Draw one sample
    pub fn next(&mut self) -> f32 {
        // u1 in (0, 1] keeps the logarithm finite
        let u1 = 1.0 - self.rng.random::<f32>();
        let u2 = self.rng.random::<f32>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f32::consts::PI * u2;
        self.mean + self.stddev * radius * theta.cos()
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}
