//! Diagnostic sinks for raw and compressed streams
//!
//! Sinks receive a copy of every block for offline inspection. They sit
//! beside the transmission path and never influence it.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use sensa_core::SimTime;
use tracing::warn;

/// Append-only receiver of sample blocks
pub trait DiagnosticSink: Send {
    fn record(&mut self, at: SimTime, block: &[f64]);
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&mut self, _at: SimTime, _block: &[f64]) {}
}

/// Shared in-memory sink. Clones see the same blocks.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    blocks: Arc<Mutex<Vec<(SimTime, Vec<f64>)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }

    pub fn blocks(&self) -> Vec<(SimTime, Vec<f64>)> {
        self.blocks.lock().clone()
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&mut self, at: SimTime, block: &[f64]) {
        self.blocks.lock().push((at, block.to_vec()));
    }
}

/// Writes one line per block: timestamp in seconds, then the values
pub struct WriterSink<W: Write + Send> {
    writer: W,
    write_errors: u64,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink {
            writer,
            write_errors: 0,
        }
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line(&mut self, at: SimTime, block: &[f64]) -> std::io::Result<()> {
        write!(self.writer, "{:.6}", at.as_secs_f64())?;
        for value in block {
            write!(self.writer, " {}", value)?;
        }
        writeln!(self.writer)
    }
}

impl<W: Write + Send> DiagnosticSink for WriterSink<W> {
    fn record(&mut self, at: SimTime, block: &[f64]) {
        if let Err(e) = self.write_line(at, block) {
            self.write_errors += 1;
            warn!("Diagnostic sink write failed: {}", e);
        }
    }
}
