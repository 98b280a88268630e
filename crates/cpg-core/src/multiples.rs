// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of CPG — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Multiples enumeration for a single prime.

/// Returns `prime, 2·prime, 3·prime, …` truncated to the largest multiple
/// `≤ max_multiple`.
///
/// The result is strictly increasing and empty when `max_multiple < prime`
/// (an empty coverage contribution, not an error).
pub fn multiples_up_to(prime: u64, max_multiple: u64) -> Vec<u64> {
    debug_assert!(prime >= 2);
    let count = (max_multiple / prime) as usize;
    (1..=count as u64).map(|k| k * prime).collect()
}
