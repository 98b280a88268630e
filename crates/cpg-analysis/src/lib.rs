//! Statistical analysis of CPG prime-gap sequences.
//!
//! The gap sequence from a [`cpg_core::CpgRun`] is smoothed with a
//! fixed-size sliding-window mean (the *gap velocity*) and the resulting
//! series is fitted against the three-parameter logarithmic model
//! `a · ln(b·x + c)` by damped nonlinear least squares.

pub mod logfit;
pub mod pipeline;
pub mod velocity;

pub use logfit::{fit_log_model, log_model, FitError, FitOptions, LogFit};
pub use pipeline::{AnalysisSummary, GapAnalysis};
pub use velocity::average_gap_velocity;
