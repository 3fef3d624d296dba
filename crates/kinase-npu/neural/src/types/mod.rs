// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Calcium Types Module
//!
//! Core state and error definitions shared by the cascade, envelope and
//! table code.

pub mod error;
pub mod state;

pub use error::{CalciumError, Error, Result};
pub use state::{CascadeState, SynapseCalcium};
