//! Thin driver for the CPG pipeline: generate primes, smooth the gap
//! sequence, fit the log model, report the numbers.
//!
//! Configuration comes from the environment:
//!
//! * `CPG_ITERATIONS`   – discovery rounds (default 5000)
//! * `CPG_MAX_MULTIPLE` – multiples bound (default 100000)
//! * `CPG_WINDOW_SIZE`  – velocity window (default 500)
//! * `CPG_FIT_ITERATIONS` – optimizer cap (default 10000)
//! * `CPG_SUMMARY_JSON` – when set, path to write the JSON summary to

use std::io::IsTerminal;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use cpg_analysis::{AnalysisSummary, FitOptions, GapAnalysis};
use cpg_core::{CpgConfig, CpgEngine};

const DEFAULT_WINDOW_SIZE: usize = 500;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stdout().is_terminal());
    Registry::default().with(filter).with(fmt_layer).init();
}

fn env_parsed<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} is not a valid value: {raw:?}")),
        Err(std::env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("failed to read {name}")),
    }
}

fn main() -> Result<()> {
    init_tracing();

    let defaults = CpgConfig::default();
    let config = defaults
        .with_iterations(env_parsed("CPG_ITERATIONS", defaults.iterations)?)
        .with_max_multiple(env_parsed("CPG_MAX_MULTIPLE", defaults.max_multiple)?);
    let window_size = env_parsed("CPG_WINDOW_SIZE", DEFAULT_WINDOW_SIZE)?;
    let fit_options = FitOptions::default().with_max_iterations(env_parsed(
        "CPG_FIT_ITERATIONS",
        FitOptions::default().max_iterations,
    )?);

    info!(
        iterations = config.iterations,
        max_multiple = config.max_multiple,
        window_size,
        "starting CPG run"
    );
    let run = CpgEngine::new(config)?.run();
    println!(
        "discovered {} primes (last: {})",
        run.primes.len(),
        run.last_prime()
    );

    let analysis = GapAnalysis::from_run(&run, window_size, &fit_options)
        .context("gap-velocity fit failed")?;
    let [a, b, c] = analysis.fit.params;
    println!("fitted parameters: a={a}, b={b}, c={c}");

    let summary = AnalysisSummary::new(&run, &analysis, window_size);
    if let Ok(path) = std::env::var("CPG_SUMMARY_JSON") {
        let payload = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, payload).with_context(|| format!("writing summary to {path}"))?;
        info!(path = %path, "summary written");
    }

    Ok(())
}
