// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for trial generation and regression fitting

use kinase_npu_neural::CalciumError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlasticityError {
    #[error("Calcium error: {0}")]
    Calcium(#[from] CalciumError),

    #[error("Invalid sweep configuration: {0}")]
    InvalidSweep(String),

    #[error("Invalid regression parameter: {0}")]
    InvalidParameter(String),

    /// Matrix shapes are (rows, columns)
    #[error("Shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("No data for {0}")]
    EmptyData(&'static str),

    #[error("Grid cell {cell} out of range (sweep has {cells} cells)")]
    CellOutOfRange { cell: usize, cells: usize },
}

pub type Result<T> = core::result::Result<T, PlasticityError>;
