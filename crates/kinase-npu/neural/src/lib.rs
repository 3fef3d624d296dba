// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Kinase Calcium Computation
//!
//! Per-cycle calcium signals behind kinase-style synaptic plasticity:
//! - **Types**: cascade state, synapse calcium, error types
//! - **Cascade**: the M -> P -> D exponential filter chain, stepped or jumped
//! - **Envelope**: binned coincidence approximations across neighbouring bins
//! - **Bin weights**: heuristic per-bin curves for final CaP / CaD
//! - **Decay tables**: precomputed no-input decay with a shared cache
//!
//! Everything here is single-threaded and allocation-free per cycle; state is
//! owned by the caller and mutated in place.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod types;

pub mod bin_weights;
pub mod cascade;
pub mod decay_table;
pub mod envelope;

pub use types::{CalciumError, CascadeState, Error, Result, SynapseCalcium};

pub use bin_weights::{bin_weights, bin_weights_for_plus, BinWeightProfile};
pub use cascade::{
    CalciumCascade, CascadeTimeConstants, IntegrationMode, TauAdjustment, COARSE_STEP_CYCLES,
};
pub use decay_table::{DecayTableCache, DecayTableParams, DecayTables};
pub use envelope::{BinnedEnvelope, EnvelopePreset};
