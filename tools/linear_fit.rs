// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Linear Fit Tool

Generates a synthetic firing-rate sweep, regresses the final synaptic
(CaP, CaD) on the per-bin features and prints the fit.

Usage:
  cargo run --release --bin linear_fit -- [--config kinase_configuration.toml] [--seed 7] [--debug kinase-plasticity]

Without `--config`, `kinase_configuration.toml` is searched for; built-in
defaults are used when none exists.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kinase::config::{
    apply_cli_overrides, apply_environment_overrides, load_config, ConfigError, KinaseConfig,
};
use kinase::observability::{debug_flags_help, init_logging, CrateDebugFlags, DEBUG_ENV_VAR};
use kinase::pipeline::{logging_options, run_sweep_and_fit, EngineSettings};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "linear_fit", version, author, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sweep RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Trials per rate combination
    #[arg(long)]
    trials: Option<usize>,

    #[arg(long)]
    min_hz: Option<f32>,

    #[arg(long)]
    max_hz: Option<f32>,

    #[arg(long)]
    step_hz: Option<f32>,

    /// Bin feature: spike_counts or envelope_ca
    #[arg(long)]
    feature: Option<String>,

    /// Envelope preset: Env30, Env25, Env20 or Env10
    #[arg(long)]
    envelope: Option<String>,

    /// Cascade catch-up: coarse or analytic (applies with --synapse-update on_spike)
    #[arg(long)]
    integration: Option<String>,

    /// Synapse update schedule: every_cycle or on_spike
    #[arg(long)]
    synapse_update: Option<String>,

    #[arg(long)]
    learning_rate: Option<f64>,

    #[arg(long)]
    max_iters: Option<usize>,

    #[arg(long)]
    log_level: Option<String>,

    /// text or json
    #[arg(long)]
    log_format: Option<String>,

    /// Crates to log at debug level (comma-separated, or `all`)
    #[arg(long, value_delimiter = ',')]
    debug: Vec<String>,
}

impl Args {
    /// Explicit flags as a config override map
    fn overrides(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                map.insert(key.to_string(), value);
            }
        };
        put("seed", self.seed.map(|v| v.to_string()));
        put("trials", self.trials.map(|v| v.to_string()));
        put("min_hz", self.min_hz.map(|v| v.to_string()));
        put("max_hz", self.max_hz.map(|v| v.to_string()));
        put("step_hz", self.step_hz.map(|v| v.to_string()));
        put("feature", self.feature.clone());
        put("envelope", self.envelope.clone());
        put("integration", self.integration.clone());
        put("synapse_update", self.synapse_update.clone());
        put("learning_rate", self.learning_rate.map(|v| v.to_string()));
        put("max_iters", self.max_iters.map(|v| v.to_string()));
        put("log_level", self.log_level.clone());
        put("log_format", self.log_format.clone());
        map
    }
}

fn load(args: &Args, overrides: &HashMap<String, String>) -> Result<KinaseConfig> {
    match load_config(args.config.as_deref(), Some(overrides)) {
        Ok(config) => Ok(config),
        Err(ConfigError::FileNotFound(_)) if args.config.is_none() => {
            let mut config = KinaseConfig::default();
            apply_environment_overrides(&mut config);
            apply_cli_overrides(&mut config, overrides);
            Ok(config)
        }
        Err(e) => Err(e).context("Failed to load configuration"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load(&args, &args.overrides())?;

    let mut debug_flags = CrateDebugFlags::from_names(&args.debug);
    if let Ok(names) = std::env::var(DEBUG_ENV_VAR) {
        debug_flags.extend_names(names.split(','));
    }
    let _guard = init_logging(&logging_options(&config.logging, debug_flags)?)?;

    let settings = EngineSettings::from_config(&config)?;
    info!(
        target: "linear_fit",
        "Sweep {}..={} Hz step {}, {} trials per cell, seed {}, synapse {:?}",
        settings.sweep.min_hz,
        settings.sweep.max_hz,
        settings.sweep.step_hz,
        settings.sweep.n_trials,
        settings.sweep.seed,
        settings.sweep.synapse_update
    );

    let outcome = run_sweep_and_fit(&settings)?;
    let report = &outcome.report;

    println!("Kinase linear fit");
    println!("=================");
    println!("Trials:     {}", outcome.dataset.len());
    println!("Bins:       {}", outcome.dataset.n_bins());
    println!(
        "Iterations: {} ({})",
        report.iterations,
        if report.converged { "converged" } else { "hit max_iters" }
    );
    println!("MSE:        {:.6e}", report.mse);
    println!("Total SSE:  {:.6e}", outcome.dataset.total_sse());
    println!();
    print!("{}", report.variance_summary());
    println!();
    print!("{}", report.coefficient_summary());

    Ok(())
}
