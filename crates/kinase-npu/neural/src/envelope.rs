// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Binned coincidence envelopes.
//!
//! A trial is divided into fixed-width bins, and each neuron reports one
//! calcium sum per bin. The envelope turns those sums into a synaptic
//! coincidence signal by blending the current bin with up to two preceding
//! bins, approximating how the slow cascade smears activity over time.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use crate::types::{CalciumError, Result};

/// Envelope presets, named after the effective window length in cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum EnvelopePreset {
    /// Current bin plus both preceding bins at full weight
    #[default]
    Env30,
    /// Bin t-2 at half weight
    Env25,
    /// Current and previous bin only
    Env20,
    /// Current bin only
    Env10,
}

impl EnvelopePreset {
    /// Raw (w1, w2) weights for bins t-1 and t-2
    pub fn raw_weights(self) -> (f32, f32) {
        match self {
            EnvelopePreset::Env30 => (1.0, 1.0),
            EnvelopePreset::Env25 => (1.0, 0.5),
            EnvelopePreset::Env20 => (1.0, 0.0),
            EnvelopePreset::Env10 => (0.0, 0.0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopePreset::Env30 => "Env30",
            EnvelopePreset::Env25 => "Env25",
            EnvelopePreset::Env20 => "Env20",
            EnvelopePreset::Env10 => "Env10",
        }
    }
}

impl std::fmt::Display for EnvelopePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnvelopePreset {
    type Err = CalciumError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "env30" => Ok(EnvelopePreset::Env30),
            "env25" => Ok(EnvelopePreset::Env25),
            "env20" => Ok(EnvelopePreset::Env20),
            "env10" => Ok(EnvelopePreset::Env10),
            _ => Err(CalciumError::UnknownEnvelope(s.to_string())),
        }
    }
}

/// Normalized bin weights for one envelope preset
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinnedEnvelope {
    preset: EnvelopePreset,
    w1: f32,
    w2: f32,

    /// Bin 0 has no history
    pub bin0: f32,
    /// Bin 1: (current, previous) weights, applied to same-bin products
    pub bin1_cur: f32,
    pub bin1_prev: f32,
    /// Bin t >= 2: weights for bins t, t-1, t-2
    pub bin_t: [f32; 3],
}

impl Default for BinnedEnvelope {
    fn default() -> Self {
        Self::new(EnvelopePreset::default())
    }
}

impl BinnedEnvelope {
    pub fn new(preset: EnvelopePreset) -> Self {
        let (w1, w2) = preset.raw_weights();
        let mut env = Self {
            preset,
            w1,
            w2,
            bin0: 1.0,
            bin1_cur: 1.0,
            bin1_prev: 0.0,
            bin_t: [1.0, 0.0, 0.0],
        };
        env.recompute_weights();
        env
    }

    pub fn preset(&self) -> EnvelopePreset {
        self.preset
    }

    /// Switch preset and recompute the normalized weights
    pub fn set_preset(&mut self, preset: EnvelopePreset) {
        self.preset = preset;
        let (w1, w2) = preset.raw_weights();
        self.w1 = w1;
        self.w2 = w2;
        self.recompute_weights();
    }

    /// Derive the normalized weight sets from the raw (w1, w2) pair
    pub fn recompute_weights(&mut self) {
        self.bin0 = 1.0;

        let w1_sq = self.w1 * self.w1;
        let bin1_norm = 1.0 + w1_sq;
        self.bin1_cur = 1.0 / bin1_norm;
        self.bin1_prev = w1_sq / bin1_norm;

        let norm = 1.0 + self.w1 + self.w2;
        self.bin_t = [1.0 / norm, self.w1 / norm, self.w2 / norm];
    }

    #[inline]
    pub fn coincidence_bin0(&self, r0: f32, s0: f32) -> f32 {
        self.bin0 * r0 * s0
    }

    /// Bin 1 blends the current and previous same-bin products
    #[inline]
    pub fn coincidence_bin1(&self, r0: f32, r1: f32, s0: f32, s1: f32) -> f32 {
        self.bin1_cur * r1 * s1 + self.bin1_prev * r0 * s0
    }

    /// Bin t >= 2: receiver and sender are each blended across bins t, t-1,
    /// t-2 and the two blended values are multiplied.
    #[inline]
    pub fn coincidence_bin_t(&self, rt: f32, r1: f32, r2: f32, st: f32, s1: f32, s2: f32) -> f32 {
        let [t0, t1, t2] = self.bin_t;
        let recv = t0 * rt + t1 * r1 + t2 * r2;
        let send = t0 * st + t1 * s1 + t2 * s2;
        recv * send
    }

    /// Fill `out` with the coincidence signal for every bin of a trial
    pub fn coincidence_series(&self, recv: &[f32], send: &[f32], out: &mut [f32]) -> Result<()> {
        if send.len() != recv.len() {
            return Err(CalciumError::ArraySizeMismatch {
                what: "sender bins",
                expected: recv.len(),
                actual: send.len(),
            });
        }
        if out.len() != recv.len() {
            return Err(CalciumError::ArraySizeMismatch {
                what: "output bins",
                expected: recv.len(),
                actual: out.len(),
            });
        }

        for (t, slot) in out.iter_mut().enumerate() {
            *slot = match t {
                0 => self.coincidence_bin0(recv[0], send[0]),
                1 => self.coincidence_bin1(recv[0], recv[1], send[0], send[1]),
                _ => self.coincidence_bin_t(
                    recv[t],
                    recv[t - 1],
                    recv[t - 2],
                    send[t],
                    send[t - 1],
                    send[t - 2],
                ),
            };
        }
        Ok(())
    }
}
