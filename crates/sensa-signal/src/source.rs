//! Raw sample sources

use sensa_core::{SensaError, SensaResult};

/// Sequential reader over a finite stream of raw samples.
///
/// The read cursor is the only state shared with the outside world; it is
/// reset explicitly between runs and never while a measurement is running.
pub trait SampleSource: Send {
    /// Samples left before the source is exhausted
    fn remaining(&self) -> usize;

    /// Fill `out` with the next `out.len()` samples.
    /// Fails without consuming anything if fewer remain.
    fn read_next(&mut self, out: &mut [f64]) -> SensaResult<()>;

    /// Rewind to the first sample
    fn reset(&mut self);
}

/// In-memory sample source
#[derive(Clone, Debug, Default)]
pub struct VecSource {
    samples: Vec<f64>,
    cursor: usize,
}

impl VecSource {
    pub fn new(samples: Vec<f64>) -> Self {
        VecSource { samples, cursor: 0 }
    }

    /// Build a source of `len` samples from a generator `f(index)`
    pub fn from_fn(len: usize, f: impl FnMut(usize) -> f64) -> Self {
        Self::new((0..len).map(f).collect())
    }

    /// Samples consumed so far
    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSource for VecSource {
    fn remaining(&self) -> usize {
        self.samples.len() - self.cursor
    }

    fn read_next(&mut self, out: &mut [f64]) -> SensaResult<()> {
        let remaining = self.remaining();
        if out.len() > remaining {
            return Err(SensaError::InsufficientSamples {
                requested: out.len(),
                remaining,
            });
        }
        let end = self.cursor + out.len();
        out.copy_from_slice(&self.samples[self.cursor..end]);
        self.cursor = end;
        Ok(())
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }
}

impl From<Vec<f64>> for VecSource {
    fn from(samples: Vec<f64>) -> Self {
        VecSource::new(samples)
    }
}
