//! Engine → velocity → fit composition.

use cpg_core::CpgRun;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::logfit::{fit_log_model, FitError, FitOptions, LogFit};
use crate::velocity::average_gap_velocity;

/// The full gap-statistics pipeline applied to one CPG run.
#[derive(Clone, Debug)]
pub struct GapAnalysis {
    /// Sliding-window mean of the run's gap sequence.
    pub velocity: Array1<f64>,
    /// Log-model fit of the velocity series against window index.
    pub fit: LogFit,
}

impl GapAnalysis {
    /// Computes the windowed velocity for `run.gaps` and fits the log model.
    ///
    /// An oversize window leaves the velocity series empty and surfaces as
    /// [`FitError::InsufficientData`]; fit divergence propagates unchanged.
    pub fn from_run(
        run: &CpgRun,
        window_size: usize,
        options: &FitOptions,
    ) -> Result<Self, FitError> {
        let velocity = average_gap_velocity(&run.gaps, window_size);
        let fit = fit_log_model(&velocity, options)?;
        info!(
            windows = velocity.len(),
            a = fit.params[0],
            b = fit.params[1],
            c = fit.params[2],
            ssr = fit.ssr,
            "log model fitted"
        );
        Ok(Self { velocity, fit })
    }
}

/// Flat, serialisable report of a run plus its analysis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub primes_found: usize,
    pub last_prime: u64,
    pub gap_count: usize,
    pub window_size: usize,
    pub velocity_points: usize,
    pub params: [f64; 3],
    pub covariance: [[f64; 3]; 3],
    pub ssr: f64,
    pub fit_iterations: usize,
}

impl AnalysisSummary {
    pub fn new(run: &CpgRun, analysis: &GapAnalysis, window_size: usize) -> Self {
        Self {
            primes_found: run.primes.len(),
            last_prime: run.last_prime(),
            gap_count: run.gaps.len(),
            window_size,
            velocity_points: analysis.velocity.len(),
            params: analysis.fit.params,
            covariance: analysis.fit.covariance,
            ssr: analysis.fit.ssr,
            fit_iterations: analysis.fit.iterations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpg_core::{CpgConfig, CpgEngine};

    #[test]
    fn oversize_window_fails_fast_with_insufficient_data() {
        let run = CpgEngine::new(CpgConfig::default().with_iterations(5).with_max_multiple(200))
            .unwrap()
            .run();
        let err = GapAnalysis::from_run(&run, run.gaps.len() + 1, &FitOptions::default())
            .unwrap_err();
        assert!(matches!(err, FitError::InsufficientData { points: 0, .. }));
    }

    #[test]
    fn summary_reflects_run_and_fit() {
        let run = CpgEngine::new(CpgConfig::default().with_iterations(40).with_max_multiple(3000))
            .unwrap()
            .run();
        let analysis = GapAnalysis::from_run(&run, 8, &FitOptions::default()).unwrap();
        let summary = AnalysisSummary::new(&run, &analysis, 8);
        assert_eq!(summary.primes_found, 44);
        assert_eq!(summary.gap_count, 40);
        assert_eq!(summary.velocity_points, 33);
        assert_eq!(summary.last_prime, *run.primes.last().unwrap());
        assert!(summary.params.iter().all(|p| p.is_finite()));
    }
}
