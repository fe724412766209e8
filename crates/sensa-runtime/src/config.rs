//! Agent configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sensa_core::{SensaError, SensaResult};
use sensa_signal::CompressionConfig;
use sensa_wire::{packet_size_for, MAX_PACKET_SIZE};

/// Sensing agent configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Time between measurement cycles
    pub measurement_interval: Duration,
    /// Spacing between queued sends
    pub packet_interval: Duration,
    /// Raw block length
    pub n: usize,
    /// Compressed block length
    pub m: usize,
    /// Seed of the compressor transform
    pub compression_seed: u32,
    /// Probability that a dequeued packet is transmitted
    pub transmission_probability: f64,
    /// Variance of the additive Gaussian noise (0 disables it)
    pub noise_variance: f64,
    /// Seed of the default draw source and noise generator
    pub rng_seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            measurement_interval: Duration::from_secs(1),
            packet_interval: Duration::ZERO,
            n: 256,
            m: 128,
            compression_seed: 1,
            transmission_probability: 1.0,
            noise_variance: 0.0,
            rng_seed: 0,
        }
    }
}

impl AgentConfig {
    pub fn with_intervals(mut self, measurement: Duration, packet: Duration) -> Self {
        self.measurement_interval = measurement;
        self.packet_interval = packet;
        self
    }

    pub fn with_dimensions(mut self, n: usize, m: usize) -> Self {
        self.n = n;
        self.m = m;
        self
    }

    pub fn with_compression_seed(mut self, seed: u32) -> Self {
        self.compression_seed = seed;
        self
    }

    pub fn with_transmission_probability(mut self, p: f64) -> Self {
        self.transmission_probability = p;
        self
    }

    pub fn with_noise_variance(mut self, variance: f64) -> Self {
        self.noise_variance = variance;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Compressor parameters derived from this configuration
    pub fn compression(&self) -> CompressionConfig {
        CompressionConfig::new(self.compression_seed, self.n, self.m)
    }

    pub fn validate(&self) -> SensaResult<()> {
        self.compression().validate()?;
        validate_probability(self.transmission_probability)?;

        if !self.noise_variance.is_finite() || self.noise_variance < 0.0 {
            return Err(SensaError::InvalidConfig(format!(
                "noise variance must be a non-negative real, got {}",
                self.noise_variance
            )));
        }
        if self.measurement_interval.is_zero() {
            return Err(SensaError::InvalidConfig(
                "measurement interval must be non-zero".into(),
            ));
        }

        let size = packet_size_for(self.m);
        if size > MAX_PACKET_SIZE {
            return Err(SensaError::InvalidConfig(format!(
                "compressed block of {} values needs {} bytes, packets are limited to {}",
                self.m, size, MAX_PACKET_SIZE
            )));
        }
        Ok(())
    }
}

pub(crate) fn validate_probability(p: f64) -> SensaResult<()> {
    if !(0.0..=1.0).contains(&p) {
        return Err(SensaError::InvalidConfig(format!(
            "transmission probability must be in [0, 1], got {}",
            p
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.n, 256);
        assert_eq!(config.m, 128);
        assert_eq!(config.packet_interval, Duration::ZERO);
        assert_eq!(config.transmission_probability, 1.0);
        assert_eq!(config.noise_variance, 0.0);
        assert!(!config.measurement_interval.is_zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let base = AgentConfig::default();
        assert!(base.clone().with_dimensions(0, 2).validate().is_err());
        assert!(base.clone().with_dimensions(4, 0).validate().is_err());
        assert!(base.clone().with_transmission_probability(1.5).validate().is_err());
        assert!(base.clone().with_transmission_probability(-0.1).validate().is_err());
        assert!(base.clone().with_transmission_probability(f64::NAN).validate().is_err());
        assert!(base.clone().with_noise_variance(-1.0).validate().is_err());
        assert!(base.clone().with_noise_variance(f64::INFINITY).validate().is_err());
        assert!(base
            .clone()
            .with_intervals(Duration::ZERO, Duration::ZERO)
            .validate()
            .is_err());
        assert!(base.with_dimensions(100_000, 10_000).validate().is_err());
    }

    #[test]
    fn test_json_partial_override() {
        let json = r#"{ "n": 4, "m": 2, "transmission_probability": 0.5 }"#;
        let config: AgentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.n, 4);
        assert_eq!(config.m, 2);
        assert_eq!(config.transmission_probability, 0.5);
        assert_eq!(config.measurement_interval, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }
}
