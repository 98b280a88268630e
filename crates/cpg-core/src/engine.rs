// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of CPG — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! The CPG round loop.
//!
//! Starting from the seed `{2, 3, 5, 7}`, each round unions the multiples
//! of every known prime up to the configured bound, detects the next prime
//! from the first gap in that coverage, and records the gap to the previous
//! prime.  The run ends when the iteration budget is spent or when no gap
//! yields a prime; the latter is the expected outcome of a bound too small
//! to expose further structure, not a failure.
//!
//! The covered set is kept as a bit table over `[0, max_multiple]` and
//! extended with the newest prime's multiples after each discovery.  The
//! bound is fixed for the lifetime of a run, so the incremental union is
//! identical to a per-round rebuild from scratch.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::detector::next_prime;
use crate::multiples::multiples_up_to;

/// Seed primes every run starts from.
pub const SEED_PRIMES: [u64; 4] = [2, 3, 5, 7];

/// Errors produced while constructing a [`CpgEngine`].
#[derive(Debug, Error)]
pub enum EngineError {
    /// The multiples bound cannot be zero.
    #[error("max_multiple must be positive")]
    ZeroBound,
}

/// Engine lifecycle; `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Running,
    Stopped,
}

/// Run parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpgConfig {
    /// Maximum number of discovery rounds.
    pub iterations: usize,
    /// Upper bound on every enumerated multiple.
    pub max_multiple: u64,
}

impl Default for CpgConfig {
    fn default() -> Self {
        Self {
            iterations: 5000,
            max_multiple: 100_000,
        }
    }
}

impl CpgConfig {
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_max_multiple(mut self, max_multiple: u64) -> Self {
        self.max_multiple = max_multiple;
        self
    }
}

/// Outcome of a run: the discovered primes (seed included) and the gaps
/// between successive discoveries.
///
/// `gaps` is parallel to `primes` minus the seed:
/// `gaps[i] = primes[4 + i] − primes[4 + i − 1]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpgRun {
    pub primes: Vec<u64>,
    pub gaps: Vec<u64>,
}

impl CpgRun {
    /// Last prime discovered (or the last seed prime for a zero-round run).
    pub fn last_prime(&self) -> u64 {
        // primes is seeded non-empty and append-only.
        self.primes[self.primes.len() - 1]
    }
}

/// Owns the prime and gap sequences for the duration of one run.
#[derive(Debug)]
pub struct CpgEngine {
    config: CpgConfig,
    state: EngineState,
    primes: Vec<u64>,
    gaps: Vec<u64>,
    covered: Vec<bool>,
}

impl CpgEngine {
    pub fn new(config: CpgConfig) -> Result<Self, EngineError> {
        if config.max_multiple == 0 {
            return Err(EngineError::ZeroBound);
        }
        let mut engine = Self {
            config,
            state: EngineState::Running,
            primes: SEED_PRIMES.to_vec(),
            gaps: Vec::new(),
            covered: vec![false; config.max_multiple as usize + 1],
        };
        for p in SEED_PRIMES {
            engine.cover(p);
        }
        Ok(engine)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Marks every multiple of `prime` up to the bound as covered.
    fn cover(&mut self, prime: u64) {
        for m in multiples_up_to(prime, self.config.max_multiple) {
            self.covered[m as usize] = true;
        }
    }

    /// Materialises the covered set as a sorted, deduplicated sequence.
    fn unique_sorted(&self) -> Vec<u64> {
        self.covered
            .iter()
            .enumerate()
            .filter(|(_, &hit)| hit)
            .map(|(value, _)| value as u64)
            .collect()
    }

    /// Runs rounds until the budget is spent or no further prime is exposed,
    /// consuming the engine.
    pub fn run(mut self) -> CpgRun {
        for round in 0..self.config.iterations {
            let unique_sorted = self.unique_sorted();
            let Some(candidate) = next_prime(&unique_sorted) else {
                info!(
                    rounds = round,
                    primes = self.primes.len(),
                    bound = self.config.max_multiple,
                    "coverage exhausted, stopping early"
                );
                self.state = EngineState::Stopped;
                break;
            };
            let gap = candidate - self.last_prime();
            debug!(round, prime = candidate, gap, "discovered prime");
            self.gaps.push(gap);
            self.primes.push(candidate);
            self.cover(candidate);
        }
        if self.state == EngineState::Running {
            info!(
                primes = self.primes.len(),
                iterations = self.config.iterations,
                "iteration budget spent"
            );
            self.state = EngineState::Stopped;
        }
        CpgRun {
            primes: self.primes,
            gaps: self.gaps,
        }
    }

    fn last_prime(&self) -> u64 {
        self.primes[self.primes.len() - 1]
    }
}
