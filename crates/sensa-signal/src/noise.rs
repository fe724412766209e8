//! Additive Gaussian noise for raw sample blocks

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Draw one standard normal value (Box-Muller transform)
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // (0, 1] keeps ln() finite
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Perturbs blocks in place with zero-mean Gaussian noise of a fixed variance
pub struct NoiseInjector {
    variance: f64,
    std_dev: f64,
    rng: StdRng,
}

impl NoiseInjector {
    /// Create an injector with a seeded generator.
    /// Negative or non-finite variances are treated as zero.
    pub fn new(variance: f64, seed: u64) -> Self {
        let variance = if variance.is_finite() && variance > 0.0 {
            variance
        } else {
            0.0
        };
        NoiseInjector {
            variance,
            std_dev: variance.sqrt(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Injector that never touches its input
    pub fn disabled() -> Self {
        Self::new(0.0, 0)
    }

    #[inline]
    pub fn variance(&self) -> f64 {
        self.variance
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.variance > 0.0
    }

    /// Add an independent noise sample to every element.
    /// With zero variance the block and the generator state are left untouched.
    pub fn apply(&mut self, block: &mut [f64]) {
        if !self.is_enabled() {
            return;
        }
        for value in block.iter_mut() {
            *value += self.std_dev * standard_normal(&mut self.rng);
        }
    }
}
