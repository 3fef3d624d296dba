// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Heuristic per-bin weight curves approximating the final CaP and CaD of a
//! trial from binned coincidence activity.
//!
//! Both curves are piecewise linear, anchored at the end of the trial:
//!
//! ```text
//! P:  tail (rises 0.7 over nplus bins) | middle (rises 0.3 over 2·nplus bins) | plus ramp 0.84 -> 3.4
//! D:  tail (rises 1.2 per nplus+1 bins) | plateau 1.46 over nplus bins         | plus decline from 1.46 by 0.22/bin
//! ```
//!
//! Values are clamped at zero and rescaled by `cycles_per_bin / 25`.

use crate::types::{CalciumError, Result};

/// Bin width the anchor values were calibrated for
pub const REFERENCE_CYCLES_PER_BIN: f32 = 25.0;

const P_PLUS_START: f32 = 0.84;
const P_PLUS_END: f32 = 3.4;
const P_MIDDLE_RISE: f32 = 0.3;
const P_TAIL_RISE: f32 = 0.7;

const D_BASE: f32 = 1.46;
const D_PLUS_DROP: f32 = 0.22;
const D_TAIL_RISE: f32 = 1.2;

/// Fill `cp` and `cd` with weight curves for a trial whose plus phase covers
/// the last `nplus` bins.
///
/// # Errors
///
/// Fails when the curves differ in length, `nplus == 0`, or `nplus >= len`.
pub fn bin_weights_for_plus(
    nplus: usize,
    cycles_per_bin: usize,
    cp: &mut [f32],
    cd: &mut [f32],
) -> Result<()> {
    let n = cp.len();
    if cd.len() != n {
        return Err(CalciumError::ArraySizeMismatch {
            what: "CaD weight curve",
            expected: n,
            actual: cd.len(),
        });
    }
    if nplus == 0 {
        return Err(CalciumError::InvalidBinLayout(
            "plus phase must cover at least one bin".to_string(),
        ));
    }
    if nplus >= n {
        return Err(CalciumError::InvalidBinLayout(format!(
            "plus phase of {} bins leaves no minus phase in {} bins",
            nplus, n
        )));
    }

    let nminus = n - nplus;
    let np = nplus as f32;
    let scale = cycles_per_bin as f32 / REFERENCE_CYCLES_PER_BIN;

    // P: plus ramp
    let inc = (P_PLUS_END - P_PLUS_START) / np;
    let mut cur = P_PLUS_START + inc;
    for w in &mut cp[nminus..] {
        *w = cur;
        cur += inc;
    }
    // P: middle, walking backward from the plus boundary
    let inc = P_MIDDLE_RISE / (2.0 * np - 1.0);
    let mid = n.saturating_sub(3 * nplus);
    let mut cur = P_PLUS_START;
    for i in (mid..nminus).rev() {
        cp[i] = cur;
        cur -= inc;
    }
    // P: tail
    let inc = P_TAIL_RISE / np;
    for i in (0..mid).rev() {
        cp[i] = cur.max(0.0);
        cur -= inc;
    }

    // D: plus decline
    let inc = D_PLUS_DROP / np;
    let mut cur = D_BASE - inc;
    for w in &mut cd[nminus..] {
        *w = cur;
        cur -= inc;
    }
    // D: plateau
    let plateau = nminus.saturating_sub(nplus);
    for w in &mut cd[plateau..nminus] {
        *w = D_BASE;
    }
    // D: tail
    let inc = D_TAIL_RISE / (np + 1.0);
    let mut cur = D_BASE;
    for i in (0..plateau).rev() {
        cd[i] = cur.max(0.0);
        cur -= inc;
    }

    if scale != 1.0 {
        for w in cp.iter_mut().chain(cd.iter_mut()) {
            *w *= scale;
        }
    }
    Ok(())
}

/// [`bin_weights_for_plus`] with the plus phase given in cycles
pub fn bin_weights(
    plus_cycles: usize,
    cycles_per_bin: usize,
    cp: &mut [f32],
    cd: &mut [f32],
) -> Result<()> {
    if cycles_per_bin == 0 {
        return Err(CalciumError::InvalidBinLayout(
            "cycles per bin must be positive".to_string(),
        ));
    }
    let nplus = (plus_cycles as f32 / cycles_per_bin as f32).round() as usize;
    bin_weights_for_plus(nplus, cycles_per_bin, cp, cd)
}

/// Owned pair of P and D weight curves
#[derive(Debug, Clone, PartialEq)]
pub struct BinWeightProfile {
    pub cp: Vec<f32>,
    pub cd: Vec<f32>,
}

impl BinWeightProfile {
    /// Build curves for `n_bins` bins of which the last `nplus` are plus phase
    pub fn for_plus(n_bins: usize, nplus: usize, cycles_per_bin: usize) -> Result<Self> {
        let mut cp = vec![0.0; n_bins];
        let mut cd = vec![0.0; n_bins];
        bin_weights_for_plus(nplus, cycles_per_bin, &mut cp, &mut cd)?;
        Ok(Self { cp, cd })
    }

    /// Build curves for a trial of `cycles` cycles with `plus_cycles` in the plus phase
    pub fn for_trial(cycles: usize, plus_cycles: usize, cycles_per_bin: usize) -> Result<Self> {
        if cycles_per_bin == 0 {
            return Err(CalciumError::InvalidBinLayout(
                "cycles per bin must be positive".to_string(),
            ));
        }
        let n_bins = cycles / cycles_per_bin;
        let mut cp = vec![0.0; n_bins];
        let mut cd = vec![0.0; n_bins];
        bin_weights(plus_cycles, cycles_per_bin, &mut cp, &mut cd)?;
        Ok(Self { cp, cd })
    }

    pub fn len(&self) -> usize {
        self.cp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cp.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f32], expected: &[f32]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < 1e-4, "bin {}: {} != {}", i, a, e);
        }
    }

    #[test]
    fn test_eight_bins_two_plus_p_curve() {
        let profile = BinWeightProfile::for_plus(8, 2, 25).unwrap();
        assert_close(
            &profile.cp,
            &[0.09, 0.44, 0.54, 0.64, 0.74, 0.84, 2.12, 3.4],
        );
    }

    #[test]
    fn test_eight_bins_two_plus_d_curve() {
        let profile = BinWeightProfile::for_plus(8, 2, 25).unwrap();
        assert_close(
            &profile.cd,
            &[1.06, 1.46, 1.46, 1.46, 1.46, 1.46, 1.35, 1.24],
        );
    }

    #[test]
    fn test_plus_bins_are_highest_p() {
        let profile = BinWeightProfile::for_plus(8, 2, 25).unwrap();
        let mut sorted = profile.cp.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(&sorted[..2], &[profile.cp[7], profile.cp[6]]);
        assert!(profile.cp[7] > profile.cp[0]);
    }

    #[test]
    fn test_scaled_by_bin_width() {
        let base = BinWeightProfile::for_plus(8, 2, 25).unwrap();
        let wide = BinWeightProfile::for_plus(8, 2, 50).unwrap();
        for (b, w) in base.cp.iter().zip(&wide.cp) {
            assert!((w - 2.0 * b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_small_layouts_clamp_non_negative() {
        for n in 2..12 {
            for nplus in 1..n {
                let profile = BinWeightProfile::for_plus(n, nplus, 25).unwrap();
                assert!(profile.cp.iter().all(|w| *w >= 0.0), "n={} nplus={}", n, nplus);
                assert!(profile.cd.iter().all(|w| *w >= 0.0), "n={} nplus={}", n, nplus);
            }
        }
    }

    #[test]
    fn test_invalid_layouts() {
        let mut cp = [0.0; 8];
        let mut cd = [0.0; 7];
        assert!(matches!(
            bin_weights_for_plus(2, 25, &mut cp, &mut cd),
            Err(CalciumError::ArraySizeMismatch { .. })
        ));
        let mut cd = [0.0; 8];
        assert!(bin_weights_for_plus(0, 25, &mut cp, &mut cd).is_err());
        assert!(bin_weights_for_plus(8, 25, &mut cp, &mut cd).is_err());
    }

    #[test]
    fn test_plus_cycles_rounded_to_bins() {
        let from_cycles = BinWeightProfile::for_trial(200, 50, 25).unwrap();
        let from_bins = BinWeightProfile::for_plus(8, 2, 25).unwrap();
        assert_eq!(from_cycles, from_bins);

        // 60 / 25 = 2.4 rounds to 2
        let rounded = BinWeightProfile::for_trial(200, 60, 25).unwrap();
        assert_eq!(rounded, from_bins);
    }
}
