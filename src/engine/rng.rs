//! Injectable uniform randomness.
//!
//! All probability checks in the engine draw exactly one value from a
//! `RandomSource`, so tests can script outcomes draw by draw.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

pub trait RandomSource: Send {
    /// Uniform draw in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// Uniform draw in `[low, high)`.
    fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }
}

/// `StdRng` backed source. Seeded for reproducible sessions.
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Replays a fixed list of draws, then a constant fallback.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
    fallback: f64,
    drawn: usize,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            fallback: 0.5,
            drawn: 0,
        }
    }

    pub fn with_fallback(mut self, fallback: f64) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    pub fn drawn(&self) -> usize {
        self.drawn
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        self.drawn += 1;
        self.values.pop_front().unwrap_or(self.fallback)
    }
}

/// Cumulative-weight sampling with a single draw. Returns `None` for an empty
/// table or one whose weights are all non-positive.
pub fn pick_weighted<'a, T>(rng: &mut dyn RandomSource, entries: &'a [(T, f64)]) -> Option<&'a T> {
    let total: f64 = entries.iter().map(|(_, w)| w.max(0.0)).sum();
    if entries.is_empty() || total <= 0.0 {
        return None;
    }
    let roll = rng.next_f64() * total;
    let mut cumulative = 0.0;
    for (value, weight) in entries {
        cumulative += weight.max(0.0);
        if roll < cumulative {
            return Some(value);
        }
    }
    entries.iter().rev().find(|(_, w)| *w > 0.0).map(|(v, _)| v)
}
