//! Sensa Signal - everything that happens to a block before it is framed
//!
//! This crate provides:
//! - `SampleSource`: sequential access to raw samples
//! - `NoiseInjector`: additive Gaussian perturbation
//! - `Compressor`: the n -> m transform contract
//! - `GaussianProjection`: seeded random-projection compressor

pub mod compressor;
pub mod noise;
pub mod projection;
pub mod source;

pub use compressor::*;
pub use noise::*;
pub use projection::*;
pub use source::*;
