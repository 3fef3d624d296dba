// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Column-oriented table of synthetic trials.
//!
//! | column    | shape        | contents                                  |
//! |-----------|--------------|-------------------------------------------|
//! | `trial`   | n            | repeat index within its rate combination  |
//! | `hz`      | n × 4        | send minus, send plus, recv minus, plus   |
//! | `bins`    | n × n_bins   | per-bin feature vector                    |
//! | `syn_ca`  | n × 2        | ground-truth synaptic (CaP, CaD)          |
//! | `pred_ca` | n × 2        | fitted (CaP, CaD)                         |
//! | `err_ca`  | n × 2        | `syn_ca − pred_ca`                        |
//! | `sse`     | n            | squared error summed over CaP and CaD     |

use ndarray::{Array1, Array2};
use tracing::info;

use crate::error::{PlasticityError, Result};
use crate::regression::{row_sse, LinearRegression, RegressionParams, RegressionReport};

pub const COLUMNS: [&str; 7] = ["trial", "hz", "bins", "syn_ca", "pred_ca", "err_ca", "sse"];

/// Names of the two regression targets
pub const TARGET_NAMES: [&str; 2] = ["CaP", "CaD"];

/// One generated trial, before it is laid out in columns
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub trial: usize,
    pub hz: [f32; 4],
    pub bins: Vec<f32>,
    /// Final synaptic (CaP, CaD)
    pub syn_ca: [f32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialDataset {
    pub trial: Array1<usize>,
    pub hz: Array2<f32>,
    pub bins: Array2<f64>,
    pub syn_ca: Array2<f64>,
    pub pred_ca: Array2<f64>,
    pub err_ca: Array2<f64>,
    pub sse: Array1<f64>,
}

impl TrialDataset {
    /// Lay out `records` in columns; every record must carry `n_bins` features
    pub fn from_records(
        records: impl IntoIterator<Item = TrialRecord>,
        n_bins: usize,
    ) -> Result<Self> {
        let records: Vec<TrialRecord> = records.into_iter().collect();
        let n = records.len();

        let mut trial = Array1::zeros(n);
        let mut hz = Array2::zeros((n, 4));
        let mut bins = Array2::zeros((n, n_bins));
        let mut syn_ca = Array2::zeros((n, 2));

        for (row, record) in records.into_iter().enumerate() {
            if record.bins.len() != n_bins {
                return Err(PlasticityError::ShapeMismatch {
                    what: "trial bins",
                    expected: (1, n_bins),
                    actual: (1, record.bins.len()),
                });
            }
            trial[row] = record.trial;
            for (col, v) in record.hz.iter().enumerate() {
                hz[[row, col]] = *v;
            }
            for (col, v) in record.bins.iter().enumerate() {
                bins[[row, col]] = *v as f64;
            }
            syn_ca[[row, 0]] = record.syn_ca[0] as f64;
            syn_ca[[row, 1]] = record.syn_ca[1] as f64;
        }

        Ok(Self {
            trial,
            hz,
            bins,
            syn_ca,
            pred_ca: Array2::zeros((n, 2)),
            err_ca: Array2::zeros((n, 2)),
            sse: Array1::zeros(n),
        })
    }

    pub fn len(&self) -> usize {
        self.trial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trial.is_empty()
    }

    pub fn n_bins(&self) -> usize {
        self.bins.ncols()
    }

    /// Row `row` as a record (features narrowed back to f32)
    pub fn record(&self, row: usize) -> TrialRecord {
        TrialRecord {
            trial: self.trial[row],
            hz: [
                self.hz[[row, 0]],
                self.hz[[row, 1]],
                self.hz[[row, 2]],
                self.hz[[row, 3]],
            ],
            bins: self.bins.row(row).iter().map(|v| *v as f32).collect(),
            syn_ca: [self.syn_ca[[row, 0]] as f32, self.syn_ca[[row, 1]] as f32],
        }
    }

    /// Regress `syn_ca` on `bins`, filling `pred_ca`, `err_ca` and `sse`.
    ///
    /// `initial` seeds the `2 × (n_bins + 1)` coefficient matrix.
    pub fn fit(
        &mut self,
        params: RegressionParams,
        initial: Option<Array2<f64>>,
    ) -> Result<RegressionReport> {
        if self.is_empty() {
            return Err(PlasticityError::EmptyData("trial dataset"));
        }
        let n_bins = self.n_bins();
        let mut model = LinearRegression::new(params, n_bins, TARGET_NAMES.len())
            .with_dep_names(TARGET_NAMES)
            .with_indep_names((0..n_bins).map(|b| format!("Bin_{}", b)));
        if let Some(coefficients) = initial {
            model.set_coefficients(coefficients)?;
        }

        let report = model.fit(
            self.bins.view(),
            self.syn_ca.view(),
            Some(self.pred_ca.view_mut()),
            Some(self.err_ca.view_mut()),
        )?;
        self.sse = row_sse(self.err_ca.view());

        info!(
            target: "kinase-plasticity",
            "Fit {} trials: R^2 CaP = {:.4}, CaD = {:.4}",
            self.len(), report.r2[0], report.r2[1]
        );
        Ok(report)
    }

    /// Total SSE across all rows
    pub fn total_sse(&self) -> f64 {
        self.sse.sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(trial: usize, bins: Vec<f32>, p: f32, d: f32) -> TrialRecord {
        TrialRecord {
            trial,
            hz: [10.0, 20.0, 30.0, 40.0],
            bins,
            syn_ca: [p, d],
        }
    }

    #[test]
    fn test_from_records_layout() {
        let ds = TrialDataset::from_records(
            vec![
                record(0, vec![1.0, 2.0], 0.5, 0.25),
                record(1, vec![3.0, 4.0], 0.75, 0.5),
            ],
            2,
        )
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.n_bins(), 2);
        assert_eq!(ds.bins[[1, 0]], 3.0);
        assert_eq!(ds.syn_ca[[0, 1]], 0.25);
        assert_eq!(ds.hz[[1, 3]], 40.0);
        assert_eq!(ds.record(1), record(1, vec![3.0, 4.0], 0.75, 0.5));
        assert_eq!(COLUMNS.len(), 7);
    }

    #[test]
    fn test_from_records_rejects_ragged_bins() {
        let result = TrialDataset::from_records(vec![record(0, vec![1.0], 0.0, 0.0)], 2);
        assert!(matches!(result, Err(PlasticityError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_fit_fills_prediction_columns() {
        let records = (0..40).map(|i| {
            let a = (i % 5) as f32 * 0.2;
            let b = (i % 7) as f32 / 7.0;
            record(i, vec![a, b], 0.5 * a + 0.2 * b, 0.1 * a + 0.4 * b)
        });
        let mut ds = TrialDataset::from_records(records, 2).unwrap();
        let report = ds.fit(RegressionParams::default(), None).unwrap();

        assert_eq!(report.dep_names, vec!["CaP", "CaD"]);
        for row in 0..ds.len() {
            let e0 = ds.syn_ca[[row, 0]] - ds.pred_ca[[row, 0]];
            assert!((ds.err_ca[[row, 0]] - e0).abs() < 1e-12);
            let sse = ds.err_ca[[row, 0]].powi(2) + ds.err_ca[[row, 1]].powi(2);
            assert!((ds.sse[row] - sse).abs() < 1e-12);
        }
        assert!((ds.total_sse() / ds.len() as f64 - report.mse).abs() < 1e-9);
    }

    #[test]
    fn test_fit_checks_initial_coefficients() {
        let mut ds =
            TrialDataset::from_records(vec![record(0, vec![1.0, 2.0], 0.5, 0.25)], 2).unwrap();
        let wrong = Array2::zeros((2, 2));
        assert!(matches!(
            ds.fit(RegressionParams::default(), Some(wrong)),
            Err(PlasticityError::ShapeMismatch { what: "initial coefficients", .. })
        ));
    }

    #[test]
    fn test_fit_empty_dataset() {
        let mut ds = TrialDataset::from_records(Vec::new(), 8).unwrap();
        assert!(ds.is_empty());
        assert!(matches!(
            ds.fit(RegressionParams::default(), None),
            Err(PlasticityError::EmptyData(_))
        ));
    }
}
