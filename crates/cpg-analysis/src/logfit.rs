// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of CPG — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Nonlinear least-squares fit of the logarithmic gap-velocity model.
//!
//! The model is `f(x; a, b, c) = a · ln(b·x + c)`, fitted against the
//! windowed-velocity series indexed by window position (`x = 0, 1, …`).
//! Minimisation uses Levenberg–Marquardt on the 3×3 normal equations with
//! the analytic Jacobian
//!
//! ```text
//!   ∂f/∂a = ln(b·x + c)
//!   ∂f/∂b = a·x / (b·x + c)
//!   ∂f/∂c = a   / (b·x + c)
//! ```
//!
//! The model is only defined where `b·x + c > 0` over the sample range;
//! trial steps that leave that domain are scored as infinitely costly and
//! rejected, so the accepted parameter path stays finite.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

const PARAMS: usize = 3;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e14;
const STEP_TOL: f64 = 1e-10;
const COST_TOL: f64 = 1e-12;

/// The three-parameter logarithmic model `a · ln(b·x + c)`.
pub fn log_model(x: f64, a: f64, b: f64, c: f64) -> f64 {
    a * (b * x + c).ln()
}

/// Fit failure conditions; both carry enough context for the caller to
/// retry with different inputs.
#[derive(Debug, Error)]
pub enum FitError {
    /// Too few samples to constrain three parameters.  An empty windowed
    /// series (window larger than the gap sequence) lands here.
    #[error("insufficient data: {points} samples, need at least {required}")]
    InsufficientData { points: usize, required: usize },
    /// The optimizer failed to converge within its iteration cap.
    #[error("fit diverged after {iterations} iterations (last estimate {last:?})")]
    Divergence { last: [f64; 3], iterations: usize },
}

/// Optimizer controls.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FitOptions {
    /// Cap on accepted-or-rejected Levenberg–Marquardt steps.  Generous by
    /// default so slow convergence is not mistaken for divergence.
    pub max_iterations: usize,
    /// Starting estimate for `(a, b, c)`.
    pub initial: [f64; 3],
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            initial: [1.0, 1.0, 1.0],
        }
    }
}

impl FitOptions {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_initial(mut self, initial: [f64; 3]) -> Self {
        self.initial = initial;
        self
    }
}

/// Converged fit: parameters, covariance, and diagnostics.
#[derive(Clone, Debug)]
pub struct LogFit {
    /// Fitted `(a, b, c)`.
    pub params: [f64; 3],
    /// Parameter covariance `(JᵀJ)⁻¹ · SSR/(n−3)`.  Entries are infinite
    /// when the normal matrix is singular or the fit has no residual
    /// degrees of freedom.
    pub covariance: [[f64; 3]; 3],
    /// Sum of squared residuals at the solution.
    pub ssr: f64,
    /// Levenberg–Marquardt steps consumed.
    pub iterations: usize,
}

/// Fits [`log_model`] to `series` against `x = 0, 1, …, len−1`.
pub fn fit_log_model(series: &Array1<f64>, options: &FitOptions) -> Result<LogFit, FitError> {
    let n = series.len();
    if n < PARAMS {
        return Err(FitError::InsufficientData {
            points: n,
            required: PARAMS,
        });
    }

    let mut params = options.initial;
    let mut cost = residual_sum(series, &params);
    if !cost.is_finite() {
        // The starting point is outside the model domain; there is no
        // gradient to follow.
        return Err(FitError::Divergence {
            last: params,
            iterations: 0,
        });
    }

    let mut lambda = LAMBDA_INIT;
    for iteration in 1..=options.max_iterations {
        let (jtj, jtr) = normal_system(series, &params);
        let mut damped = jtj;
        for k in 0..PARAMS {
            damped[k][k] += lambda * jtj[k][k].max(f64::MIN_POSITIVE);
        }
        let step = match solve3(damped, jtr) {
            Some(step) => step,
            None => {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    return Err(FitError::Divergence {
                        last: params,
                        iterations: iteration,
                    });
                }
                continue;
            }
        };

        let candidate = [
            params[0] + step[0],
            params[1] + step[1],
            params[2] + step[2],
        ];
        let candidate_cost = residual_sum(series, &candidate);
        let step_norm = norm3(&step);
        let scale = 1.0 + norm3(&params);
        if candidate_cost <= cost {
            let improvement = cost - candidate_cost;
            params = candidate;
            cost = candidate_cost;
            lambda = (lambda * 0.1).max(1e-12);
            trace!(iteration, cost, lambda, "accepted step");
            if step_norm <= STEP_TOL * scale || improvement <= COST_TOL * (1.0 + cost) {
                return Ok(finish(series, params, cost, iteration));
            }
        } else {
            // A worse step this small means the minimum is resolved to
            // machine precision; escalating damping further cannot move us.
            if step_norm <= STEP_TOL * scale {
                return Ok(finish(series, params, cost, iteration));
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return Err(FitError::Divergence {
                    last: params,
                    iterations: iteration,
                });
            }
        }
    }

    Err(FitError::Divergence {
        last: params,
        iterations: options.max_iterations,
    })
}

fn finish(series: &Array1<f64>, params: [f64; 3], ssr: f64, iterations: usize) -> LogFit {
    let (jtj, _) = normal_system(series, &params);
    let dof = series.len() - PARAMS;
    let covariance = match (invert3(&jtj), dof) {
        (Some(inverse), dof) if dof > 0 => {
            let scale = ssr / dof as f64;
            inverse.map(|row| row.map(|entry| entry * scale))
        }
        _ => [[f64::INFINITY; 3]; 3],
    };
    LogFit {
        params,
        covariance,
        ssr,
        iterations,
    }
}

/// Sum of squared residuals, or `+∞` when any sample leaves the model
/// domain (`b·x + c ≤ 0`) or the accumulation turns non-finite.
fn residual_sum(series: &Array1<f64>, params: &[f64; 3]) -> f64 {
    let [a, b, c] = *params;
    let mut acc = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let u = b * i as f64 + c;
        if u <= 0.0 {
            return f64::INFINITY;
        }
        let r = y - a * u.ln();
        acc += r * r;
    }
    if acc.is_finite() {
        acc
    } else {
        f64::INFINITY
    }
}

/// Builds `JᵀJ` and `Jᵀr` at `params`.  Callers only evaluate this at
/// points with finite cost, so `b·x + c > 0` holds for every sample.
fn normal_system(series: &Array1<f64>, params: &[f64; 3]) -> ([[f64; 3]; 3], [f64; 3]) {
    let [a, b, c] = *params;
    let mut jtj = [[0.0; 3]; 3];
    let mut jtr = [0.0; 3];
    for (i, &y) in series.iter().enumerate() {
        let x = i as f64;
        let u = b * x + c;
        let g = [u.ln(), a * x / u, a / u];
        let r = y - a * u.ln();
        for j in 0..PARAMS {
            jtr[j] += g[j] * r;
            for k in 0..PARAMS {
                jtj[j][k] += g[j] * g[k];
            }
        }
    }
    (jtj, jtr)
}

fn norm3(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Gaussian elimination with partial pivoting on a 3×3 system.
fn solve3(mut m: [[f64; 3]; 3], mut rhs: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..PARAMS {
        let mut pivot = col;
        for row in col + 1..PARAMS {
            if m[row][col].abs() > m[pivot][col].abs() {
                pivot = row;
            }
        }
        if !m[pivot][col].is_finite() || m[pivot][col].abs() < f64::MIN_POSITIVE {
            return None;
        }
        m.swap(col, pivot);
        rhs.swap(col, pivot);
        for row in col + 1..PARAMS {
            let factor = m[row][col] / m[col][col];
            for k in col..PARAMS {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    let mut out = [0.0; 3];
    for col in (0..PARAMS).rev() {
        let mut acc = rhs[col];
        for k in col + 1..PARAMS {
            acc -= m[col][k] * out[k];
        }
        out[col] = acc / m[col][col];
    }
    if out.iter().all(|v| v.is_finite()) {
        Some(out)
    } else {
        None
    }
}

/// 3×3 inverse via the adjugate.
fn invert3(m: &[[f64; 3]; 3]) -> Option<[[f64; 3]; 3]> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if !det.is_finite() || det.abs() < f64::MIN_POSITIVE {
        return None;
    }
    let cof = |r1: usize, c1: usize, r2: usize, c2: usize| {
        m[r1][c1] * m[r2][c2] - m[r1][c2] * m[r2][c1]
    };
    let adj = [
        [cof(1, 1, 2, 2), -cof(0, 1, 2, 2), cof(0, 1, 1, 2)],
        [-cof(1, 0, 2, 2), cof(0, 0, 2, 2), -cof(0, 0, 1, 2)],
        [cof(1, 0, 2, 1), -cof(0, 0, 2, 1), cof(0, 0, 1, 1)],
    ];
    Some(adj.map(|row| row.map(|entry| entry / det)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn synthetic(a: f64, b: f64, c: f64, n: usize) -> Array1<f64> {
        Array1::from_iter((0..n).map(|i| log_model(i as f64, a, b, c)))
    }

    #[test]
    fn recovers_exact_parameters_from_clean_series() {
        let series = synthetic(2.0, 1.0, 5.0, 50);
        let fit = fit_log_model(&series, &FitOptions::default()).unwrap();
        assert_relative_eq!(fit.params[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(fit.params[1], 1.0, epsilon = 1e-3);
        assert_relative_eq!(fit.params[2], 5.0, epsilon = 1e-3);
        assert!(fit.ssr < 1e-8);
    }

    #[test]
    fn covariance_is_finite_and_symmetric_on_perturbed_series() {
        let series = Array1::from_iter(
            (0..60).map(|i| log_model(i as f64, 1.5, 0.7, 3.0) + 0.01 * (i as f64).sin()),
        );
        let fit = fit_log_model(&series, &FitOptions::default()).unwrap();
        assert!(fit.ssr < 0.1);
        for j in 0..3 {
            assert!(fit.covariance[j][j].is_finite());
            assert!(fit.covariance[j][j] >= 0.0);
            for k in 0..3 {
                assert_relative_eq!(
                    fit.covariance[j][k],
                    fit.covariance[k][j],
                    epsilon = 1e-8,
                    max_relative = 1e-6
                );
            }
        }
    }

    #[test]
    fn empty_series_is_insufficient_data() {
        let err = fit_log_model(&Array1::zeros(0), &FitOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            FitError::InsufficientData { points: 0, required: 3 }
        ));
    }

    #[test]
    fn two_points_are_insufficient_data() {
        let series = Array1::from_vec(vec![1.0, 2.0]);
        let err = fit_log_model(&series, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, FitError::InsufficientData { points: 2, .. }));
    }

    #[test]
    fn infeasible_start_diverges_with_last_estimate() {
        let series = synthetic(2.0, 1.0, 5.0, 20);
        let options = FitOptions::default().with_initial([1.0, 1.0, -1.0]);
        let err = fit_log_model(&series, &options).unwrap_err();
        match err {
            FitError::Divergence { last, iterations } => {
                assert_eq!(last, [1.0, 1.0, -1.0]);
                assert_eq!(iterations, 0);
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn zero_iteration_cap_diverges() {
        let series = synthetic(2.0, 1.0, 5.0, 20);
        let options = FitOptions::default().with_max_iterations(0);
        assert!(matches!(
            fit_log_model(&series, &options),
            Err(FitError::Divergence { iterations: 0, .. })
        ));
    }

    #[test]
    fn solve3_recovers_known_solution() {
        let m = [[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        // rhs chosen so the solution is (1, 2, 3).
        let rhs = [6.0, 10.0, 8.0];
        let solution = solve3(m, rhs).unwrap();
        for (got, want) in solution.iter().zip(&[1.0, 2.0, 3.0]) {
            assert_relative_eq!(*got, *want, epsilon = 1e-12);
        }
    }

    #[test]
    fn invert3_times_original_is_identity() {
        let m = [[2.0, 0.5, 0.0], [0.5, 3.0, 1.0], [0.0, 1.0, 4.0]];
        let inv = invert3(&m).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let entry: f64 = (0..3).map(|k| m[i][k] * inv[k][j]).sum();
                let want = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(entry, want, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn singular_system_is_rejected() {
        let m = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]];
        assert!(solve3(m, [1.0, 2.0, 1.0]).is_none());
        assert!(invert3(&m).is_none());
    }
}
