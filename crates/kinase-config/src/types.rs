// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Mirrors the sections of `kinase_configuration.toml`. Enum-like settings
//! (integration mode, envelope preset, bin feature, log format) are kept as
//! strings here and checked by [`crate::validate_config`], so this crate has
//! no dependency on the engine crates.

use serde::{Deserialize, Serialize};

/// Integration mode names accepted by `[cascade] integration`
pub const INTEGRATION_MODES: [&str; 2] = ["coarse", "analytic"];

/// Envelope preset names accepted by `[envelope] preset`
pub const ENVELOPE_PRESETS: [&str; 4] = ["Env30", "Env25", "Env20", "Env10"];

/// Bin feature names accepted by `[sweep] feature`
pub const BIN_FEATURES: [&str; 2] = ["spike_counts", "envelope_ca"];

/// Synapse update schedules accepted by `[sweep] synapse_update`
pub const SYNAPSE_UPDATES: [&str; 2] = ["every_cycle", "on_spike"];

/// Log formats accepted by `[logging] format`
pub const LOG_FORMATS: [&str; 2] = ["text", "json"];

/// Log levels accepted by `[logging] level`
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct KinaseConfig {
    pub cascade: CascadeConfig,
    pub trace: TraceConfig,
    pub envelope: EnvelopeConfig,
    pub sweep: SweepSettings,
    pub regression: RegressionConfig,
    pub logging: LoggingConfig,
}

/// Calcium cascade time constants and catch-up behaviour
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CascadeConfig {
    pub m_tau: f32,
    pub p_tau: f32,
    pub d_tau: f32,
    /// Use the exact discrete-step solution for analytic catch-up
    pub exp_adj: bool,
    pub spike_gain: f32,
    /// Intervals longer than this reset the cascade to zero
    pub max_isi: i32,
    /// `"coarse"` or `"analytic"`. Together with `exp_adj` and `max_isi` this
    /// only matters when `[sweep] synapse_update = "on_spike"`.
    pub integration: String,
    /// Nudge `d_tau` apart when it equals `p_tau` instead of rejecting the config
    pub separate_equal_taus: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            m_tau: 5.0,
            p_tau: 39.0,
            d_tau: 41.0,
            exp_adj: true,
            spike_gain: 12.0,
            max_isi: 100,
            integration: "coarse".to_string(),
            separate_equal_taus: false,
        }
    }
}

/// Per-neuron synaptic calcium trace
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TraceConfig {
    pub syn_tau: f32,
    pub syn_spike_gain: f32,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            syn_tau: 30.0,
            syn_spike_gain: 8.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub preset: String,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            preset: "Env30".to_string(),
        }
    }
}

/// Firing-rate sweep for synthetic trial generation
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SweepSettings {
    pub n_cycles: usize,
    pub plus_cycles: usize,
    pub cycles_per_bin: usize,
    pub min_hz: f32,
    pub max_hz: f32,
    pub step_hz: f32,
    pub n_trials: usize,
    pub seed: u64,
    pub bin_scale: f32,
    pub ca_scale: f32,
    /// `"spike_counts"` or `"envelope_ca"`
    pub feature: String,
    /// `"every_cycle"` or `"on_spike"`
    pub synapse_update: String,
}

impl Default for SweepSettings {
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
            feature: "spike_counts".to_string(),
            synapse_update: "every_cycle".to_string(),
        }
    }
}

/// Gradient-descent regression settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RegressionConfig {
    pub learning_rate: f64,
    pub stop_tolerance: f64,
    pub max_iters: usize,
    pub cost_start_iter: usize,
    pub l1_cost: f64,
    pub l2_cost: f64,
    pub zero_offset: bool,
    /// Start from the hand-tuned bin weight curves instead of zeros
    pub seed_from_bin_weights: bool,
    /// Multiplier applied to the bin weight curves when seeding
    pub seed_scale: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            stop_tolerance: 0.001,
            max_iters: 50,
            cost_start_iter: 5,
            l1_cost: 0.0,
            l2_cost: 0.0,
            zero_offset: false,
            seed_from_bin_weights: false,
            seed_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `"text"` or `"json"`
    pub format: String,
    /// Crates logged at debug level regardless of `level`
    pub debug_crates: Vec<String>,
    /// Optional JSON log file
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            debug_crates: Vec::new(),
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config: KinaseConfig = toml::from_str("").unwrap();
        assert_eq!(config, KinaseConfig::default());
        assert_eq!(config.cascade.p_tau, 39.0);
        assert_eq!(config.sweep.n_cycles, 200);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: KinaseConfig = toml::from_str(
            r#"
            [sweep]
            seed = 7
            max_hz = 60.0
            "#,
        )
        .unwrap();
        assert_eq!(config.sweep.seed, 7);
        assert_eq!(config.sweep.max_hz, 60.0);
        assert_eq!(config.sweep.step_hz, 10.0);
        assert_eq!(config.regression, RegressionConfig::default());
    }

    #[test]
    fn test_json_round_trip() {
        let config = KinaseConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: KinaseConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
