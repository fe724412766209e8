//! Uniform draw sources for the transmission gate

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in [0, 1)
pub trait DrawSource: Send {
    fn next_draw(&mut self) -> f64;
}

/// Seeded pseudo-random draws
pub struct SeededDraws {
    rng: StdRng,
}

impl SeededDraws {
    pub fn new(seed: u64) -> Self {
        SeededDraws {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DrawSource for SeededDraws {
    fn next_draw(&mut self) -> f64 {
        self.rng.gen()
    }
}

/// Replays a fixed sequence of draws, cycling when it runs out
#[derive(Clone, Debug)]
pub struct FixedDraws {
    values: Vec<f64>,
    next: usize,
}

impl FixedDraws {
    /// An empty sequence behaves as a constant 0.0 (every packet admitted
    /// unless the probability is zero).
    pub fn new(values: Vec<f64>) -> Self {
        FixedDraws { values, next: 0 }
    }

    /// Draws consumed so far
    pub fn consumed(&self) -> usize {
        self.next
    }
}

impl DrawSource for FixedDraws {
    fn next_draw(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.next % self.values.len()];
        self.next += 1;
        value
    }
}
