// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Synthetic Trial Generation
//!
//! Sweeps every combination of (send minus, send plus, recv minus, recv plus)
//! firing rates and simulates a sender / receiver pair for each. The synapse
//! integrates `ca_scale × send.ca_syn × recv.ca_syn` through its own cascade,
//! giving the ground-truth final (CaP, CaD) that binned features try to predict.
//!
//! ## Synapse updating
//!
//! [`SynapseUpdate::EveryCycle`] integrates the coincidence calcium on every
//! cycle and is the ground truth. [`SynapseUpdate::OnSpike`] only touches the
//! synapse on cycles where either neuron spikes: the synapse cascade is first
//! caught up over the silent interval with
//! [`CalciumCascade::current_calcium`], so its `mode`, `exp_adj` and `max_isi`
//! decide how the skipped cycles are accounted for. Under `EveryCycle` those
//! three settings have no effect.
//!
//! ## Determinism
//!
//! Each grid cell draws from its own `StdRng` seeded from the sweep seed and
//! the cell index. Cells never share state, so serial and parallel sweeps
//! produce identical datasets and any subset of cells can be regenerated.

use kinase_npu_neural::{
    BinnedEnvelope, CalciumCascade, CalciumError, EnvelopePreset, SynapseCalcium,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{TrialDataset, TrialRecord};
use crate::error::{PlasticityError, Result};
use crate::neuron::{spike_interval, SpikeTraceParams, SpikingNeuron};

/// Mixing constant for per-cell seeds (golden ratio, 64-bit)
const CELL_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Source of the per-bin feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BinFeature {
    /// `send_count × recv_count × bin_scale` per bin
    #[default]
    SpikeCounts,
    /// Envelope coincidence of per-bin average `ca_syn`
    EnvelopeCa,
}

/// When the synapse cascade is advanced during a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SynapseUpdate {
    /// Integrate the coincidence calcium every cycle
    #[default]
    EveryCycle,
    /// Integrate only on send or recv spike cycles, catching up in between
    OnSpike,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Cycles per trial (1 cycle = 1 ms)
    pub n_cycles: usize,
    /// Trailing cycles of each trial in the plus phase
    pub plus_cycles: usize,
    pub cycles_per_bin: usize,
    pub min_hz: f32,
    pub max_hz: f32,
    pub step_hz: f32,
    /// Repeats per rate combination
    pub n_trials: usize,
    pub seed: u64,
    /// Scale for spike-count features
    pub bin_scale: f32,
    /// Scale for the synaptic coincidence calcium. Defaults to 1: the spike
    /// gain of the neuron traces (`syn_spike_gain`, 8) already sets the
    /// calcium magnitude, so no further sweep-level factor is applied.
    pub ca_scale: f32,
    pub feature: BinFeature,
    pub synapse_update: SynapseUpdate,
    /// Envelope used by [`BinFeature::EnvelopeCa`]
    pub envelope: EnvelopePreset,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            n_cycles: 200,
            plus_cycles: 50,
            cycles_per_bin: 25,
            min_hz: 10.0,
            max_hz: 100.0,
            step_hz: 10.0,
            n_trials: 2,
            seed: 0,
            bin_scale: 0.1,
            ca_scale: 1.0,
            feature: BinFeature::SpikeCounts,
            synapse_update: SynapseUpdate::EveryCycle,
            envelope: EnvelopePreset::Env30,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cycles_per_bin == 0 {
            return Err(PlasticityError::InvalidSweep(
                "cycles_per_bin must be positive".to_string(),
            ));
        }
        if self.n_cycles == 0 || self.n_cycles % self.cycles_per_bin != 0 {
            return Err(PlasticityError::InvalidSweep(format!(
                "n_cycles ({}) must be a positive multiple of cycles_per_bin ({})",
                self.n_cycles, self.cycles_per_bin
            )));
        }
        if self.plus_cycles >= self.n_cycles {
            return Err(PlasticityError::InvalidSweep(format!(
                "plus_cycles ({}) must be less than n_cycles ({})",
                self.plus_cycles, self.n_cycles
            )));
        }
        if !(self.step_hz > 0.0) {
            return Err(PlasticityError::InvalidSweep(format!(
                "step_hz must be positive, got {}",
                self.step_hz
            )));
        }
        if !(self.min_hz >= 0.0) || !(self.max_hz >= self.min_hz) {
            return Err(PlasticityError::InvalidSweep(format!(
                "rate range {}..={} Hz is empty or negative",
                self.min_hz, self.max_hz
            )));
        }
        if self.n_trials == 0 {
            return Err(PlasticityError::InvalidSweep(
                "n_trials must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn n_bins(&self) -> usize {
        self.n_cycles / self.cycles_per_bin
    }

    pub fn minus_cycles(&self) -> usize {
        self.n_cycles - self.plus_cycles
    }

    /// Sampled rates: `min_hz, min_hz + step_hz, ..` up to `max_hz`
    pub fn hz_grid(&self) -> Vec<f32> {
        let steps = ((self.max_hz - self.min_hz) / self.step_hz + 1e-4).floor() as usize;
        (0..=steps)
            .map(|i| self.min_hz + i as f32 * self.step_hz)
            .collect()
    }

    /// Number of rate combinations
    pub fn n_cells(&self) -> usize {
        self.hz_grid().len().pow(4)
    }

    pub fn total_trials(&self) -> usize {
        self.n_cells() * self.n_trials
    }
}

/// Firing rates for one trial: (send minus, send plus, recv minus, recv plus)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseRates {
    pub send_minus: f32,
    pub send_plus: f32,
    pub recv_minus: f32,
    pub recv_plus: f32,
}

impl PhaseRates {
    pub fn as_array(&self) -> [f32; 4] {
        [self.send_minus, self.send_plus, self.recv_minus, self.recv_plus]
    }
}

/// Simulated sender / receiver pair with one synapse between them
#[derive(Debug, Clone)]
pub struct TrialPair {
    pub send: SpikingNeuron,
    pub recv: SpikingNeuron,
    pub synapse: SynapseCalcium,
    /// Cycles simulated since [`TrialPair::init`], across trials
    pub time: i32,
    /// `time` at which the synapse cascade was last brought up to date,
    /// negative if never
    pub syn_last_update: i32,
}

impl TrialPair {
    pub fn new(n_bins: usize) -> Self {
        Self {
            send: SpikingNeuron::new(n_bins),
            recv: SpikingNeuron::new(n_bins),
            synapse: SynapseCalcium::default(),
            time: 0,
            syn_last_update: -1,
        }
    }

    pub fn init(&mut self) {
        self.send.init();
        self.recv.init();
        self.synapse.reset();
        self.time = 0;
        self.syn_last_update = -1;
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticTrialGenerator {
    config: SweepConfig,
    hz: Vec<f32>,
    pub trace: SpikeTraceParams,
    /// Neuron-level spike cascade
    pub neuron_cascade: CalciumCascade,
    /// Synapse cascade, driven by coincidence calcium levels
    pub synapse_cascade: CalciumCascade,
    envelope: BinnedEnvelope,
}

impl SyntheticTrialGenerator {
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        let hz = config.hz_grid();
        let envelope = BinnedEnvelope::new(config.envelope);
        Ok(Self {
            config,
            hz,
            trace: SpikeTraceParams::default(),
            neuron_cascade: CalciumCascade::default(),
            synapse_cascade: CalciumCascade::default(),
            envelope,
        })
    }

    pub fn with_trace(mut self, trace: SpikeTraceParams) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_cascades(mut self, neuron: CalciumCascade, synapse: CalciumCascade) -> Self {
        self.neuron_cascade = neuron;
        self.synapse_cascade = synapse;
        self
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn n_cells(&self) -> usize {
        self.hz.len().pow(4)
    }

    /// Rates for grid cell `cell`; send minus varies slowest, recv plus fastest
    pub fn cell_rates(&self, cell: usize) -> Result<PhaseRates> {
        let cells = self.n_cells();
        if cell >= cells {
            return Err(PlasticityError::CellOutOfRange { cell, cells });
        }
        let nhz = self.hz.len();
        let rpi = cell % nhz;
        let rmi = (cell / nhz) % nhz;
        let spi = (cell / (nhz * nhz)) % nhz;
        let smi = cell / (nhz * nhz * nhz);
        Ok(PhaseRates {
            send_minus: self.hz[smi],
            send_plus: self.hz[spi],
            recv_minus: self.hz[rmi],
            recv_plus: self.hz[rpi],
        })
    }

    /// Seed of the RNG stream owned by `cell`
    pub fn cell_seed(&self, cell: usize) -> u64 {
        self.config.seed ^ (cell as u64).wrapping_mul(CELL_SEED_MIX)
    }

    /// All trials of one grid cell, starting from fresh neuron and synapse state
    pub fn generate_cell(&self, cell: usize) -> Result<Vec<TrialRecord>> {
        let rates = self.cell_rates(cell)?;
        let mut rng = StdRng::seed_from_u64(self.cell_seed(cell));
        let mut pair = TrialPair::new(self.config.n_bins());
        pair.init();

        let records = (0..self.config.n_trials)
            .map(|trial| self.run_trial(&rates, trial, &mut pair, &mut rng))
            .collect::<Result<Vec<_>>>()?;
        debug!(
            target: "kinase-plasticity",
            "Cell {} ({:?}): {} trials", cell, rates.as_array(), records.len()
        );
        Ok(records)
    }

    /// Run the minus then plus phase for one trial. Traces carry over from
    /// the previous trial on the same `pair`; only bin counters are reset.
    pub fn run_trial<R: Rng + ?Sized>(
        &self,
        rates: &PhaseRates,
        trial: usize,
        pair: &mut TrialPair,
        rng: &mut R,
    ) -> Result<TrialRecord> {
        let cfg = &self.config;
        let n_bins = cfg.n_bins();
        for (what, bins) in [
            ("sender spike bins", pair.send.spike_bins.len()),
            ("sender ca bins", pair.send.ca_bins.len()),
            ("receiver spike bins", pair.recv.spike_bins.len()),
            ("receiver ca bins", pair.recv.ca_bins.len()),
        ] {
            if bins != n_bins {
                return Err(CalciumError::ArraySizeMismatch {
                    what,
                    expected: n_bins,
                    actual: bins,
                }
                .into());
            }
        }
        pair.send.start_trial();
        pair.recv.start_trial();

        let phases = [
            (rates.send_minus, rates.recv_minus, cfg.minus_cycles()),
            (rates.send_plus, rates.recv_plus, cfg.plus_cycles),
        ];
        let mut cyc = 0;
        for (send_hz, recv_hz, n_cycles) in phases {
            let send_int = spike_interval(send_hz);
            let recv_int = spike_interval(recv_hz);
            for _ in 0..n_cycles {
                let bin = cyc / cfg.cycles_per_bin;
                pair.send
                    .cycle(send_int, bin, &self.trace, &self.neuron_cascade, rng);
                pair.recv
                    .cycle(recv_int, bin, &self.trace, &self.neuron_cascade, rng);

                let ca = cfg.ca_scale * pair.send.ca_syn * pair.recv.ca_syn;
                match cfg.synapse_update {
                    SynapseUpdate::EveryCycle => {
                        let syn = &mut pair.synapse;
                        syn.ca = ca;
                        self.synapse_cascade.step_from_level(ca, &mut syn.cascade);
                    }
                    SynapseUpdate::OnSpike => {
                        if pair.send.spike > 0.0 || pair.recv.spike > 0.0 {
                            self.catch_up_synapse(pair)?;
                            let syn = &mut pair.synapse;
                            syn.ca = ca;
                            self.synapse_cascade.step_from_level(ca, &mut syn.cascade);
                            pair.syn_last_update = pair.time + 1;
                        }
                    }
                }
                pair.time += 1;
                cyc += 1;
            }
        }
        if cfg.synapse_update == SynapseUpdate::OnSpike {
            self.catch_up_synapse(pair)?;
        }
        pair.synapse.update_dwt();

        Ok(TrialRecord {
            trial,
            hz: rates.as_array(),
            bins: self.bin_features(&pair.send, &pair.recv)?,
            syn_ca: [pair.synapse.cascade.ca_p, pair.synapse.cascade.ca_d],
        })
    }

    /// Advance the synapse cascade over the spike-free cycles since its last update
    fn catch_up_synapse(&self, pair: &mut TrialPair) -> Result<()> {
        self.synapse_cascade.current_calcium(
            pair.time,
            pair.syn_last_update,
            &mut pair.synapse.cascade,
        )?;
        if pair.syn_last_update >= 0 {
            pair.syn_last_update = pair.time;
        }
        Ok(())
    }

    fn bin_features(&self, send: &SpikingNeuron, recv: &SpikingNeuron) -> Result<Vec<f32>> {
        let cfg = &self.config;
        match cfg.feature {
            BinFeature::SpikeCounts => Ok(send
                .spike_bins
                .iter()
                .zip(&recv.spike_bins)
                .map(|(s, r)| s * r * cfg.bin_scale)
                .collect()),
            BinFeature::EnvelopeCa => {
                let norm = 1.0 / cfg.cycles_per_bin as f32;
                let send_avg: Vec<f32> = send.ca_bins.iter().map(|c| c * norm).collect();
                let recv_avg: Vec<f32> = recv.ca_bins.iter().map(|c| c * norm).collect();
                let mut out = vec![0.0; send_avg.len()];
                self.envelope
                    .coincidence_series(&recv_avg, &send_avg, &mut out)?;
                for v in &mut out {
                    *v *= cfg.ca_scale;
                }
                Ok(out)
            }
        }
    }

    /// Generate the full sweep, one block of rows per grid cell in cell order
    pub fn generate(&self) -> Result<TrialDataset> {
        let cells = self.n_cells();
        info!(
            target: "kinase-plasticity",
            "Generating {} trials ({} rate combinations x {} repeats, {} bins, {:?})",
            cells * self.config.n_trials,
            cells,
            self.config.n_trials,
            self.config.n_bins(),
            self.config.feature
        );

        #[cfg(feature = "parallel")]
        let blocks: Vec<Vec<TrialRecord>> = (0..cells)
            .into_par_iter()
            .map(|cell| self.generate_cell(cell))
            .collect::<Result<_>>()?;

        #[cfg(not(feature = "parallel"))]
        let blocks: Vec<Vec<TrialRecord>> = (0..cells)
            .map(|cell| self.generate_cell(cell))
            .collect::<Result<_>>()?;

        TrialDataset::from_records(blocks.into_iter().flatten(), self.config.n_bins())
    }

    /// Generate only the given cells, in the order given
    pub fn generate_cells(&self, cells: impl IntoIterator<Item = usize>) -> Result<TrialDataset> {
        let mut records = Vec::new();
        for cell in cells {
            records.extend(self.generate_cell(cell)?);
        }
        TrialDataset::from_records(records, self.config.n_bins())
    }
}
