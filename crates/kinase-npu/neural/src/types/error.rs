// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for calcium computation

use thiserror::Error;

/// Error types for kinase calcium operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalciumError {
    /// A time constant is below one cycle (rate would exceed 1 and overshoot)
    #[error("Invalid time constant {name} = {value}: must be >= 1 cycle")]
    InvalidTimeConstant { name: &'static str, value: f32 },

    /// Two cascade stages share a time constant; the closed-form solution
    /// divides by their difference
    #[error("Degenerate cascade: {first} and {second} are both {value} (closed form needs distinct roots)")]
    DegenerateTimeConstants {
        first: &'static str,
        second: &'static str,
        value: f32,
    },

    #[error("Array size mismatch for {what}: expected {expected}, got {actual}")]
    ArraySizeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid bin layout: {0}")]
    InvalidBinLayout(String),

    #[error("Unknown envelope preset '{0}'")]
    UnknownEnvelope(String),

    #[error("Invalid decay table parameters: {0}")]
    InvalidTableParams(String),
}

pub type Result<T> = core::result::Result<T, CalciumError>;
pub type Error = CalciumError;
