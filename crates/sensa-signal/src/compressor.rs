//! Compression contract
//!
//! A compressor maps an n-length block to an m-length block with a
//! deterministic transform derived from a seed. It is configured once
//! before its first use and is immutable afterwards.

use sensa_core::{SensaError, SensaResult};

/// Seed and dimensions of a compressor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressionConfig {
    /// Seed of the transform
    pub seed: u32,
    /// Original block length
    pub n: usize,
    /// Compressed block length
    pub m: usize,
}

impl CompressionConfig {
    pub fn new(seed: u32, n: usize, m: usize) -> Self {
        CompressionConfig { seed, n, m }
    }

    pub fn validate(&self) -> SensaResult<()> {
        if self.n == 0 || self.m == 0 {
            return Err(SensaError::InvalidConfig(format!(
                "block lengths must be positive (n={}, m={})",
                self.n, self.m
            )));
        }
        Ok(())
    }
}

/// The n -> m transform consumed by the measurement engine
pub trait Compressor: Send {
    /// Set seed and dimensions. May be repeated until the first
    /// `compress`; afterwards only the active configuration is accepted
    /// and anything else fails with `CompressorInUse`.
    fn configure(&mut self, config: CompressionConfig) -> SensaResult<()>;

    /// Active configuration, `None` until configured
    fn config(&self) -> Option<&CompressionConfig>;

    /// Compress `input` (length n) into `output` (length m)
    fn compress(&mut self, input: &[f64], output: &mut [f64]) -> SensaResult<()>;

    /// Independent copy, used when one prototype feeds several agents
    fn box_clone(&self) -> Box<dyn Compressor>;
}

impl Clone for Box<dyn Compressor> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Length checks shared by compressor implementations
pub fn check_dimensions(config: &CompressionConfig, input: &[f64], output: &[f64]) -> SensaResult<()> {
    if input.len() != config.n {
        return Err(SensaError::DimensionMismatch {
            expected: config.n,
            actual: input.len(),
        });
    }
    if output.len() != config.m {
        return Err(SensaError::DimensionMismatch {
            expected: config.m,
            actual: output.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(CompressionConfig::new(1, 256, 128).validate().is_ok());
        assert!(CompressionConfig::new(1, 0, 128).validate().is_err());
        assert!(CompressionConfig::new(1, 4, 0).validate().is_err());
        // m > n is allowed, the compressor defines the mapping
        assert!(CompressionConfig::new(1, 4, 8).validate().is_ok());
    }

    #[test]
    fn test_check_dimensions() {
        let config = CompressionConfig::new(0, 4, 2);
        assert!(check_dimensions(&config, &[0.0; 4], &[0.0; 2]).is_ok());
        assert_eq!(
            check_dimensions(&config, &[0.0; 3], &[0.0; 2]),
            Err(SensaError::DimensionMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert_eq!(
            check_dimensions(&config, &[0.0; 4], &[0.0; 3]),
            Err(SensaError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }
}
