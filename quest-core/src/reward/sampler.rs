//! Uniform random sources for reward draws.

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of uniform values in `[0, 1)`.
pub trait UnitSampler: Send + Sync {
    fn sample(&self) -> f64;
}

/// `StdRng`-backed sampler.
pub struct StdRngSampler {
    rng: Mutex<StdRng>,
}

impl StdRngSampler {
    /// Reproducible sampler for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }
}

impl UnitSampler for StdRngSampler {
    fn sample(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen::<f64>()
    }
}

/// Scripted sampler for tests: yields the given values in order, then
/// repeats the last one.
pub struct SequenceSampler {
    values: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
    calls: Mutex<u64>,
}

impl SequenceSampler {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: Mutex::new(values.into_iter().collect()),
            last: Mutex::new(0.0),
            calls: Mutex::new(0),
        }
    }

    /// Number of draws taken so far.
    pub fn calls(&self) -> u64 {
        *self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl UnitSampler for SequenceSampler {
    fn sample(&self) -> f64 {
        *self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) += 1;
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut values = self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(next) = values.pop_front() {
            *last = next;
        }
        *last
    }
}
