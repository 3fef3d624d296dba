// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Kinase Plasticity Fitting
//!
//! This crate fits binned approximations of the synaptic calcium cascade:
//! - Stochastic spiking neurons with synaptic calcium traces
//! - Firing-rate sweeps producing ground-truth synaptic (CaP, CaD)
//! - Column-oriented trial datasets
//! - Batch gradient-descent linear regression from bins to (CaP, CaD)
//!
//! ## Architecture
//! - Grid cells are independent and own their RNG stream
//! - Parallel sweep via rayon (`parallel` feature)
//! - Dense regression via ndarray

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod dataset;
pub mod error;
pub mod generator;
pub mod neuron;
pub mod regression;

pub use dataset::{TrialDataset, TrialRecord, COLUMNS, TARGET_NAMES};
pub use error::{PlasticityError, Result};
pub use generator::{
    BinFeature, PhaseRates, SweepConfig, SynapseUpdate, SyntheticTrialGenerator, TrialPair,
};
pub use neuron::{spike_interval, SpikeTraceParams, SpikingNeuron};
pub use regression::{
    coefficients_from_profile, row_sse, LinearRegression, RegressionParams, RegressionReport,
};
