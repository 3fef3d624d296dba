// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Stochastic spiking neuron used to drive synthetic trials.
//!
//! Spikes follow a Poisson-like process: a survival probability is multiplied
//! by an independent uniform draw every cycle and the neuron fires once it
//! falls to `exp(-1000 / Hz)`, after which it resets to 1.

use kinase_npu_neural::{CalciumCascade, CascadeState};
use rand::Rng;

/// Neuron-level synaptic calcium trace (`ca_syn`) parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpikeTraceParams {
    /// Time constant of the trace in cycles
    pub syn_tau: f32,
    /// Gain applied to a spike driving the trace
    pub syn_spike_gain: f32,
    syn_dt: f32,
}

impl Default for SpikeTraceParams {
    fn default() -> Self {
        Self::new(30.0, 8.0)
    }
}

impl SpikeTraceParams {
    pub fn new(syn_tau: f32, syn_spike_gain: f32) -> Self {
        let mut params = Self {
            syn_tau,
            syn_spike_gain,
            syn_dt: 0.0,
        };
        params.update();
        params
    }

    pub fn update(&mut self) {
        self.syn_dt = 1.0 / self.syn_tau;
    }

    pub fn syn_dt(&self) -> f32 {
        self.syn_dt
    }

    #[inline]
    pub fn step(&self, spike: f32, ca_syn: &mut f32) {
        *ca_syn += self.syn_dt * (self.syn_spike_gain * spike - *ca_syn);
    }
}

/// Survival threshold for a target firing rate; non-positive rates never spike
#[inline]
pub fn spike_interval(hz: f32) -> f32 {
    if hz > 0.0 {
        (-1000.0 / hz).exp()
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpikingNeuron {
    /// 1 on a spiking cycle, else 0
    pub spike: f32,
    /// Survival probability, reset to 1 on each spike
    pub spike_p: f32,
    pub ca_syn: f32,
    /// Neuron-level spike-driven cascade
    pub cascade: CascadeState,
    pub total_spikes: f32,
    /// Spike count per bin for the current trial
    pub spike_bins: Vec<f32>,
    /// Summed `ca_syn` per bin for the current trial
    pub ca_bins: Vec<f32>,
}

impl SpikingNeuron {
    pub fn new(n_bins: usize) -> Self {
        Self {
            spike: 0.0,
            spike_p: 1.0,
            ca_syn: 0.0,
            cascade: CascadeState::default(),
            total_spikes: 0.0,
            spike_bins: vec![0.0; n_bins],
            ca_bins: vec![0.0; n_bins],
        }
    }

    /// Reset all state, including traces
    pub fn init(&mut self) {
        self.spike = 0.0;
        self.spike_p = 1.0;
        self.ca_syn = 0.0;
        self.cascade.reset();
        self.start_trial();
    }

    /// Clear per-trial accumulators; traces carry over
    pub fn start_trial(&mut self) {
        self.total_spikes = 0.0;
        self.spike_bins.fill(0.0);
        self.ca_bins.fill(0.0);
    }

    /// One cycle at survival threshold `exp_int`, accumulating into `bin`
    pub fn cycle<R: Rng + ?Sized>(
        &mut self,
        exp_int: f32,
        bin: usize,
        trace: &SpikeTraceParams,
        cascade: &CalciumCascade,
        rng: &mut R,
    ) {
        self.spike = 0.0;
        if exp_int > 0.0 {
            self.spike_p *= rng.gen::<f32>();
            if self.spike_p <= exp_int {
                self.spike = 1.0;
                self.spike_p = 1.0;
                self.total_spikes += 1.0;
                self.spike_bins[bin] += 1.0;
            }
        }
        trace.step(self.spike, &mut self.ca_syn);
        cascade.step_from_spike(self.spike, &mut self.cascade);
        self.ca_bins[bin] += self.ca_syn;
    }
}
