// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-neuron and per-synapse calcium state.
//!
//! State is created zeroed and mutated in place every cycle by whichever
//! neuron or synapse owns it.

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

/// The three cascading calcium stages (M -> P -> D)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct CascadeState {
    /// Fast calmodulin-like running average, feeds CaP
    pub ca_m: f32,
    /// Potentiation-associated intermediate (CaMKII), integrates CaM
    pub ca_p: f32,
    /// Depression-associated slow signal (DAPK1), integrates CaP
    pub ca_d: f32,
}

impl CascadeState {
    pub fn new(ca_m: f32, ca_p: f32, ca_d: f32) -> Self {
        Self { ca_m, ca_p, ca_d }
    }

    /// Reset all stages to zero
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Net weight-change signal (CaP - CaD)
    #[inline]
    pub fn dwt(&self) -> f32 {
        self.ca_p - self.ca_d
    }

    pub fn is_zero(&self) -> bool {
        self.ca_m == 0.0 && self.ca_p == 0.0 && self.ca_d == 0.0
    }
}

/// Synapse-level calcium: coincidence Ca driving its own cascade
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct SynapseCalcium {
    /// Coincidence calcium (product of sender and receiver traces)
    pub ca: f32,
    pub cascade: CascadeState,
    /// CaP - CaD, refreshed by [`SynapseCalcium::update_dwt`]
    pub dwt: f32,
}

impl SynapseCalcium {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update_dwt(&mut self) -> f32 {
        self.dwt = self.cascade.dwt();
        self.dwt
    }
}
