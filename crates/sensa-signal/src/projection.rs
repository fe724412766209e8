//! Seeded Gaussian random projection
//!
//! y = Φx where Φ is an m × n matrix with i.i.d. N(0, 1/m) entries drawn
//! from a generator seeded with the configured seed. Two compressors with
//! the same seed and dimensions produce bit-identical output.

use rand::rngs::StdRng;
use rand::SeedableRng;
use sensa_core::{SensaError, SensaResult};
use tracing::debug;

use crate::{check_dimensions, standard_normal, CompressionConfig, Compressor};

/// Random-projection compressor
#[derive(Clone, Debug, Default)]
pub struct GaussianProjection {
    config: Option<CompressionConfig>,
    /// Row-major m × n matrix
    matrix: Vec<f64>,
    /// Set on first compress, locks the configuration
    used: bool,
}

impl GaussianProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and configure in one step
    pub fn with_config(config: CompressionConfig) -> SensaResult<Self> {
        let mut projection = Self::new();
        projection.configure(config)?;
        Ok(projection)
    }

    /// Row `i` of the projection matrix
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        let config = self.config.as_ref()?;
        if i >= config.m {
            return None;
        }
        Some(&self.matrix[i * config.n..(i + 1) * config.n])
    }

    fn build_matrix(config: &CompressionConfig) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(u64::from(config.seed));
        let scale = 1.0 / (config.m as f64).sqrt();
        (0..config.m * config.n)
            .map(|_| scale * standard_normal(&mut rng))
            .collect()
    }
}

impl Compressor for GaussianProjection {
    fn configure(&mut self, config: CompressionConfig) -> SensaResult<()> {
        config.validate()?;
        // An identical config leaves the matrix unchanged
        if self.config.as_ref() == Some(&config) {
            return Ok(());
        }
        if self.used {
            return Err(SensaError::CompressorInUse);
        }
        debug!(seed = config.seed, n = config.n, m = config.m, "Building projection matrix");
        self.matrix = Self::build_matrix(&config);
        self.config = Some(config);
        Ok(())
    }

    fn config(&self) -> Option<&CompressionConfig> {
        self.config.as_ref()
    }

    fn compress(&mut self, input: &[f64], output: &mut [f64]) -> SensaResult<()> {
        let config = self.config.ok_or(SensaError::CompressorNotConfigured)?;
        check_dimensions(&config, input, output)?;
        self.used = true;

        for (i, out) in output.iter_mut().enumerate() {
            let row = &self.matrix[i * config.n..(i + 1) * config.n];
            *out = row.iter().zip(input).map(|(a, x)| a * x).sum();
        }
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn Compressor> {
        Box::new(self.clone())
    }
}
