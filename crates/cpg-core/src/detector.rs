// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of CPG — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Next-prime detection from the gap structure of a covered set.
//!
//! Given the sorted, deduplicated covered-multiples set, the next prime is
//! read off the first adjacent pair whose difference exceeds 1: the
//! candidate is the successor of the pair's left endpoint, validated by
//! trial division.  A rejected candidate moves the scan to the *next*
//! adjacent pair; later integers inside the same gap are never tried.
//! This first-successor-per-gap rule is deliberate and load-bearing: a
//! stronger whole-gap search would change the discovered sequence.

/// Scans `unique_sorted` for the first gap whose successor is prime.
///
/// `unique_sorted` must be strictly increasing.  Returns `None` when no gap
/// across the whole sequence yields a valid prime, which is the caller's
/// signal to stop, not an error.
pub fn next_prime(unique_sorted: &[u64]) -> Option<u64> {
    for pair in unique_sorted.windows(2) {
        if pair[1] - pair[0] > 1 {
            let candidate = pair[0] + 1;
            if divisor_free(candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Trial division over `2..=⌊√candidate⌋`.
///
/// Covered sets start at 2, so candidates here are always ≥ 3.
fn divisor_free(candidate: u64) -> bool {
    (2..=candidate.isqrt()).all(|d| candidate % d != 0)
}
