// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of CPG — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Sliding-window gap velocity.

use ndarray::Array1;

/// Arithmetic mean of every length-`window_size` window over `gaps`,
/// one value per start index.
///
/// Result length is `gaps.len() − window_size + 1`.  A window larger than
/// the sequence (or a zero window) produces an empty series, not an error;
/// fitting an empty series downstream is what fails.
///
/// The window sum is maintained as a rolling integer total, so every mean
/// is exact, identical to summing each window from scratch.
pub fn average_gap_velocity(gaps: &[u64], window_size: usize) -> Array1<f64> {
    let n = gaps.len();
    if window_size == 0 || window_size > n {
        return Array1::zeros(0);
    }
    let width = window_size as f64;
    let mut sum: u64 = gaps[..window_size].iter().sum();
    let mut out = Array1::zeros(n - window_size + 1);
    out[0] = sum as f64 / width;
    for start in 1..=n - window_size {
        sum += gaps[start + window_size - 1];
        sum -= gaps[start - 1];
        out[start] = sum as f64 / width;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn window_of_three_over_five_gaps() {
        let velocity = average_gap_velocity(&[2, 2, 4, 2, 4], 3);
        assert_eq!(velocity.len(), 3);
        assert_relative_eq!(velocity[0], 8.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(velocity[1], 8.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(velocity[2], 10.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn window_equal_to_length_gives_single_mean() {
        let velocity = average_gap_velocity(&[2, 4, 6], 3);
        assert_eq!(velocity.len(), 1);
        assert_relative_eq!(velocity[0], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn oversize_window_is_empty() {
        assert!(average_gap_velocity(&[2, 4, 6], 4).is_empty());
        assert!(average_gap_velocity(&[], 1).is_empty());
    }

    #[test]
    fn zero_window_is_empty() {
        assert!(average_gap_velocity(&[2, 4, 6], 0).is_empty());
    }

    #[test]
    fn unit_window_reproduces_gaps() {
        let velocity = average_gap_velocity(&[3, 1, 4, 1, 5], 1);
        assert_eq!(velocity.len(), 5);
        for (mean, &gap) in velocity.iter().zip(&[3u64, 1, 4, 1, 5]) {
            assert_relative_eq!(*mean, gap as f64, epsilon = 1e-12);
        }
    }

    #[test]
    fn rolling_sum_matches_direct_means() {
        let gaps: Vec<u64> = (0..40).map(|i| (i * 7 + 3) % 13).collect();
        let window = 6;
        let velocity = average_gap_velocity(&gaps, window);
        for (start, mean) in velocity.iter().enumerate() {
            let direct: u64 = gaps[start..start + window].iter().sum();
            assert_relative_eq!(*mean, direct as f64 / window as f64, epsilon = 1e-12);
        }
    }
}
