// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! Multivariate linear regression by batch gradient descent.
//!
//! Fits `dep ≈ W · indep + b` for several dependent variables at once. The
//! coefficient matrix is `n_dep × (n_indep + 1)` with the offset `b` in the
//! last column.
//!
//! ## Algorithm
//!
//! ```text
//! lrate = learning_rate / n, halved every 10 iterations
//! each iteration:
//!     pred = X · Wᵀ + b
//!     err  = Y − pred
//!     W   += lrate × (errᵀ · X − l1·sign(W) − l2·W)     costs from cost_start_iter
//! stop when |ΔMSE| < stop_tolerance or max_iters is reached; the final pass
//! only records predictions and residuals
//! ```

use std::fmt::Write as _;

use kinase_npu_neural::BinWeightProfile;
use ndarray::{s, Array1, Array2, ArrayView2, ArrayViewMut2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PlasticityError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionParams {
    pub learning_rate: f64,
    /// Converged once the MSE changes by less than this between iterations
    pub stop_tolerance: f64,
    pub max_iters: usize,
    /// First iteration at which the L1 / L2 costs apply
    pub cost_start_iter: usize,
    /// Lasso cost: constant pull of each coefficient toward zero
    pub l1_cost: f64,
    /// Ridge cost: pull proportional to the coefficient
    pub l2_cost: f64,
    /// Force the fit through the origin
    pub zero_offset: bool,
}

impl Default for RegressionParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            stop_tolerance: 0.001,
            max_iters: 50,
            cost_start_iter: 5,
            l1_cost: 0.0,
            l2_cost: 0.0,
            zero_offset: false,
        }
    }
}

impl RegressionParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(PlasticityError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.stop_tolerance >= 0.0) {
            return Err(PlasticityError::InvalidParameter(format!(
                "stop_tolerance must be non-negative, got {}",
                self.stop_tolerance
            )));
        }
        if self.max_iters == 0 {
            return Err(PlasticityError::InvalidParameter(
                "max_iters must be at least 1".to_string(),
            ));
        }
        if !(self.l1_cost >= 0.0) || !(self.l2_cost >= 0.0) {
            return Err(PlasticityError::InvalidParameter(format!(
                "l1_cost ({}) and l2_cost ({}) must be non-negative",
                self.l1_cost, self.l2_cost
            )));
        }
        Ok(())
    }
}

/// Outcome of a fit
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionReport {
    pub dep_names: Vec<String>,
    pub indep_names: Vec<String>,
    /// Fitted `n_dep × (n_indep + 1)` coefficients, offset last
    pub coefficients: Array2<f64>,
    pub r2: Vec<f64>,
    pub obs_variance: Vec<f64>,
    pub err_variance: Vec<f64>,
    /// MSE of the final pass
    pub mse: f64,
    pub mse_history: Vec<f64>,
    pub iterations: usize,
    /// False when the iteration cap was hit before the tolerance
    pub converged: bool,
}

impl RegressionReport {
    /// One line per dependent variable: R², R and the two variances
    pub fn variance_summary(&self) -> String {
        let mut out = String::new();
        for (di, r2) in self.r2.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}\tR^2: {:>10.6}\tR: {:>10.6}\tVar Err: {:>10.4e}\t Obs: {:>10.4e}",
                label(&self.dep_names, di, "DV "),
                r2,
                r2.max(0.0).sqrt(),
                self.err_variance[di],
                self.obs_variance[di]
            );
        }
        out
    }

    /// One equation per dependent variable
    pub fn coefficient_summary(&self) -> String {
        let n_indep = self.coefficients.ncols() - 1;
        let mut out = String::new();
        for (di, row) in self.coefficients.rows().into_iter().enumerate() {
            let _ = write!(out, "{} = ", label(&self.dep_names, di, "DV "));
            for ii in 0..n_indep {
                let _ = write!(
                    out,
                    "\t{:>10.6} * {} + ",
                    row[ii],
                    label(&self.indep_names, ii, "IV_")
                );
            }
            let _ = writeln!(out, "\t{:>10.6}", row[n_indep]);
        }
        out
    }
}

fn label(names: &[String], idx: usize, prefix: &str) -> String {
    match names.get(idx) {
        Some(name) if !name.is_empty() => name.clone(),
        _ => format!("{}{}", prefix, idx),
    }
}

/// Seed coefficients from P / D bin weight curves (zero offset column)
pub fn coefficients_from_profile(profile: &BinWeightProfile, scale: f64) -> Array2<f64> {
    let n = profile.len();
    let mut coeff = Array2::zeros((2, n + 1));
    for (ii, (p, d)) in profile.cp.iter().zip(&profile.cd).enumerate() {
        coeff[[0, ii]] = *p as f64 * scale;
        coeff[[1, ii]] = *d as f64 * scale;
    }
    coeff
}

#[derive(Debug, Clone)]
pub struct LinearRegression {
    params: RegressionParams,
    coefficients: Array2<f64>,
    dep_names: Vec<String>,
    indep_names: Vec<String>,
}

impl LinearRegression {
    /// Zero-initialized model for `n_indep` inputs and `n_dep` outputs
    pub fn new(params: RegressionParams, n_indep: usize, n_dep: usize) -> Self {
        Self {
            params,
            coefficients: Array2::zeros((n_dep, n_indep + 1)),
            dep_names: Vec::new(),
            indep_names: Vec::new(),
        }
    }

    pub fn with_dep_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.dep_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_indep_names<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.indep_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn params(&self) -> &RegressionParams {
        &self.params
    }

    pub fn n_indep(&self) -> usize {
        self.coefficients.ncols() - 1
    }

    pub fn n_dep(&self) -> usize {
        self.coefficients.nrows()
    }

    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    /// Replace the starting coefficients; the shape must match the model
    pub fn set_coefficients(&mut self, coefficients: Array2<f64>) -> Result<()> {
        if coefficients.dim() != self.coefficients.dim() {
            return Err(PlasticityError::ShapeMismatch {
                what: "initial coefficients",
                expected: self.coefficients.dim(),
                actual: coefficients.dim(),
            });
        }
        self.coefficients = coefficients;
        Ok(())
    }

    fn validate_shapes(
        &self,
        indep: &ArrayView2<f64>,
        dep: &ArrayView2<f64>,
        pred: Option<&ArrayViewMut2<f64>>,
        err: Option<&ArrayViewMut2<f64>>,
    ) -> Result<()> {
        let (n, n_indep) = indep.dim();
        if n == 0 {
            return Err(PlasticityError::EmptyData("independent variables"));
        }
        if n_indep != self.n_indep() {
            return Err(PlasticityError::ShapeMismatch {
                what: "independent variables",
                expected: (n, self.n_indep()),
                actual: indep.dim(),
            });
        }
        if dep.dim() != (n, self.n_dep()) {
            return Err(PlasticityError::ShapeMismatch {
                what: "dependent variables",
                expected: (n, self.n_dep()),
                actual: dep.dim(),
            });
        }
        if let Some(pred) = pred {
            if pred.dim() != dep.dim() {
                return Err(PlasticityError::ShapeMismatch {
                    what: "prediction output",
                    expected: dep.dim(),
                    actual: pred.dim(),
                });
            }
        }
        if let Some(err) = err {
            if err.dim() != dep.dim() {
                return Err(PlasticityError::ShapeMismatch {
                    what: "residual output",
                    expected: dep.dim(),
                    actual: err.dim(),
                });
            }
        }
        Ok(())
    }

    /// Predictions for every row under the current coefficients
    pub fn predict(&self, indep: ArrayView2<f64>) -> Result<Array2<f64>> {
        if indep.ncols() != self.n_indep() {
            return Err(PlasticityError::ShapeMismatch {
                what: "independent variables",
                expected: (indep.nrows(), self.n_indep()),
                actual: indep.dim(),
            });
        }
        Ok(self.predict_unchecked(&indep))
    }

    fn predict_unchecked(&self, indep: &ArrayView2<f64>) -> Array2<f64> {
        let k = self.n_indep();
        let weights = self.coefficients.slice(s![.., ..k]);
        let mut pred = indep.dot(&weights.t());
        if !self.params.zero_offset {
            pred += &self.coefficients.column(k);
        }
        pred
    }

    /// Fit to `dep` from `indep` (rows are samples).
    ///
    /// `pred` and `err`, when given, receive the predictions and residuals of
    /// the final pass. All shapes are checked before any computation.
    pub fn fit(
        &mut self,
        indep: ArrayView2<f64>,
        dep: ArrayView2<f64>,
        mut pred: Option<ArrayViewMut2<f64>>,
        mut err: Option<ArrayViewMut2<f64>>,
    ) -> Result<RegressionReport> {
        self.params.validate()?;
        self.validate_shapes(&indep, &dep, pred.as_ref(), err.as_ref())?;

        let params = self.params.clone();
        let n = indep.nrows();
        let k = self.n_indep();
        let norm = 1.0 / n as f64;
        let mut lrate = norm * params.learning_rate;

        let mut mse_history = Vec::with_capacity(params.max_iters);
        let mut last_pass = params.max_iters == 1;
        let mut converged = false;
        let mut prev_mse = 0.0;
        let mut residuals = Array2::zeros(dep.dim());
        let mut iterations = 0;

        for itr in 0..params.max_iters {
            iterations = itr + 1;
            if (itr + 1) % 10 == 0 {
                lrate *= 0.5;
            }

            let prediction = self.predict_unchecked(&indep);
            residuals = &dep - &prediction;
            let mse = norm * residuals.iter().map(|e| e * e).sum::<f64>();
            mse_history.push(mse);

            if last_pass {
                if let Some(out) = pred.as_mut() {
                    out.assign(&prediction);
                }
                if let Some(out) = err.as_mut() {
                    out.assign(&residuals);
                }
                break;
            }

            let grad_w = residuals.t().dot(&indep);
            let grad_b = residuals.sum_axis(Axis(0));
            let apply_costs = itr >= params.cost_start_iter;
            for ((di, ii), w) in self.coefficients.indexed_iter_mut() {
                let grad = if ii < k {
                    grad_w[[di, ii]]
                } else if params.zero_offset {
                    continue;
                } else {
                    grad_b[di]
                };
                let cost = if apply_costs {
                    params.l1_cost * sign(*w) + params.l2_cost * *w
                } else {
                    0.0
                };
                *w += lrate * (grad - cost);
            }

            debug!(target: "kinase-plasticity", "Regression iter {}: MSE = {:.6e}", itr, mse);

            if itr > 0 && (mse - prev_mse).abs() < params.stop_tolerance {
                converged = true;
                last_pass = true;
            } else if itr + 2 >= params.max_iters {
                last_pass = true;
            }
            prev_mse = mse;
        }

        let (obs_variance, err_variance) = column_variances(&dep, &residuals);
        let r2 = obs_variance
            .iter()
            .zip(&err_variance)
            .map(|(&obs, &err)| explained_variance(obs, err))
            .collect();

        let mse = mse_history.last().copied().unwrap_or(0.0);
        if !converged {
            warn!(
                target: "kinase-plasticity",
                "Regression stopped at iteration cap {} (MSE = {:.6e})",
                params.max_iters, mse
            );
        }
        info!(
            target: "kinase-plasticity",
            "Regression fit {} rows x {} inputs -> {} outputs in {} iterations, MSE = {:.6e}",
            n, k, self.n_dep(), iterations, mse
        );

        Ok(RegressionReport {
            dep_names: self.dep_names.clone(),
            indep_names: self.indep_names.clone(),
            coefficients: self.coefficients.clone(),
            r2,
            obs_variance,
            err_variance,
            mse,
            mse_history,
            iterations,
            converged,
        })
    }
}

#[inline]
fn sign(w: f64) -> f64 {
    if w > 0.0 {
        1.0
    } else if w < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn column_variances(dep: &ArrayView2<f64>, err: &Array2<f64>) -> (Vec<f64>, Vec<f64>) {
    let variance = |col: ndarray::ArrayView1<f64>| -> f64 {
        let n = col.len() as f64;
        let mean = col.sum() / n;
        col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n
    };
    let obs = dep.columns().into_iter().map(variance).collect();
    let err = err.columns().into_iter().map(variance).collect();
    (obs, err)
}

/// 1 − errVar / obsVar; a constant target counts as fully explained only
/// when the residuals are constant too
fn explained_variance(obs: f64, err: f64) -> f64 {
    const EPS: f64 = 1e-12;
    if obs.abs() < EPS {
        if err.abs() < EPS {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - err / obs
    }
}

/// Sum of squared residuals per row
pub fn row_sse(err: ArrayView2<f64>) -> Array1<f64> {
    err.map_axis(Axis(1), |row| row.iter().map(|e| e * e).sum())
}
