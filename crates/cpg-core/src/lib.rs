//! Composite Partition Generation (CPG).
//!
//! CPG discovers primes empirically: union the multiples of every prime
//! found so far up to a fixed bound, then read the next prime off the first
//! gap in the covered set.  Each round grows the prime sequence by one and
//! records the gap to its predecessor, until either the iteration budget is
//! spent or the bound stops exposing new gap structure.
//!
//! The crate exposes the three pieces of that loop:
//!
//! 1. [`multiples::multiples_up_to`] – multiples of one prime up to a bound.
//! 2. [`detector::next_prime`] – first-gap successor detection with trial
//!    division.
//! 3. [`engine::CpgEngine`] – the round loop owning the prime and gap
//!    sequences.

pub mod detector;
pub mod engine;
pub mod multiples;

pub use detector::next_prime;
pub use engine::{CpgConfig, CpgEngine, CpgRun, EngineError, EngineState, SEED_PRIMES};
pub use multiples::multiples_up_to;
