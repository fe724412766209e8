//! Measurement cycle: read, perturb, compress, store

use sensa_core::{SensaError, SensaResult, SimTime};
use sensa_signal::{CompressionConfig, Compressor, NoiseInjector, SampleSource};
use tracing::debug;

use crate::{DiagnosticSink, Exhaustion, NullSink};

/// Most recently compressed block. Overwritten every cycle.
#[derive(Clone, Debug, Default)]
pub struct MeasurementBuffer {
    values: Vec<f64>,
    cycles: u64,
    taken_at: Option<SimTime>,
}

impl MeasurementBuffer {
    fn new(m: usize) -> Self {
        MeasurementBuffer {
            values: vec![0.0; m],
            cycles: 0,
            taken_at: None,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Completed cycles so far
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// When the current contents were produced
    pub fn taken_at(&self) -> Option<SimTime> {
        self.taken_at
    }
}

/// Outcome of one cycle
#[derive(Debug)]
pub enum Measurement<'a> {
    Ready(&'a MeasurementBuffer),
    Exhausted(Exhaustion),
}

/// Owns the source, noise injector, compressor and result buffer
pub struct MeasurementEngine {
    n: usize,
    m: usize,
    source: Option<Box<dyn SampleSource>>,
    compressor: Option<Box<dyn Compressor>>,
    noise: NoiseInjector,
    raw_sink: Box<dyn DiagnosticSink>,
    compressed_sink: Box<dyn DiagnosticSink>,
    raw: Vec<f64>,
    buffer: MeasurementBuffer,
}

impl MeasurementEngine {
    pub fn new(n: usize, m: usize, noise: NoiseInjector) -> Self {
        MeasurementEngine {
            n,
            m,
            source: None,
            compressor: None,
            noise,
            raw_sink: Box::new(NullSink),
            compressed_sink: Box::new(NullSink),
            raw: vec![0.0; n],
            buffer: MeasurementBuffer::new(m),
        }
    }

    pub fn attach_compressor(&mut self, compressor: Box<dyn Compressor>) {
        self.compressor = Some(compressor);
    }

    pub fn has_compressor(&self) -> bool {
        self.compressor.is_some()
    }

    /// Configure the attached compressor, if any
    pub fn configure_compressor(&mut self, config: CompressionConfig) -> SensaResult<()> {
        if config.n != self.n || config.m != self.m {
            return Err(SensaError::InvalidConfig(format!(
                "compressor dimensions {}x{} do not match engine {}x{}",
                config.m, config.n, self.m, self.n
            )));
        }
        match self.compressor.as_mut() {
            Some(compressor) => compressor.configure(config),
            None => Ok(()),
        }
    }

    pub fn bind(
        &mut self,
        source: Box<dyn SampleSource>,
        raw_sink: Box<dyn DiagnosticSink>,
        compressed_sink: Box<dyn DiagnosticSink>,
    ) {
        self.source = Some(source);
        self.raw_sink = raw_sink;
        self.compressed_sink = compressed_sink;
    }

    pub fn buffer(&self) -> &MeasurementBuffer {
        &self.buffer
    }

    /// Samples left in the bound source
    pub fn remaining(&self) -> usize {
        self.source.as_ref().map_or(0, |s| s.remaining())
    }

    pub fn reset_source(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.reset();
        }
    }

    /// Run one cycle.
    ///
    /// Exhaustion (too few samples left, or no compressor) is an expected
    /// outcome, not an error.
    pub fn measure(&mut self, now: SimTime) -> SensaResult<Measurement<'_>> {
        if self.compressor.is_none() {
            return Ok(Measurement::Exhausted(Exhaustion::NoCompressor));
        }

        let remaining = self.remaining();
        if remaining < self.n {
            return Ok(Measurement::Exhausted(Exhaustion::InsufficientSamples {
                remaining,
                needed: self.n,
            }));
        }

        // remaining >= n > 0 implies a bound source
        let (Some(source), Some(compressor)) = (self.source.as_mut(), self.compressor.as_mut())
        else {
            return Ok(Measurement::Exhausted(Exhaustion::NoCompressor));
        };

        source.read_next(&mut self.raw)?;
        self.raw_sink.record(now, &self.raw);

        self.noise.apply(&mut self.raw);
        compressor.compress(&self.raw, &mut self.buffer.values)?;
        self.compressed_sink.record(now, &self.buffer.values);

        self.buffer.cycles += 1;
        self.buffer.taken_at = Some(now);
        debug!(
            cycle = self.buffer.cycles,
            remaining = remaining - self.n,
            at = %now,
            "Measurement complete"
        );

        Ok(Measurement::Ready(&self.buffer))
    }
}
