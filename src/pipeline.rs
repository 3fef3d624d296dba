// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Config-driven engine setup and the generate -> fit pipeline.
//!
//! [`EngineSettings::from_config`] turns a validated [`KinaseConfig`] into
//! the engine's own parameter types; [`run_sweep_and_fit`] runs a full sweep
//! and regresses synaptic (CaP, CaD) on the bin features.

use kinase_config::{validate_config, ConfigError, KinaseConfig};
use kinase_npu_neural::{
    BinWeightProfile, CalciumCascade, CalciumError, CascadeTimeConstants, EnvelopePreset,
    IntegrationMode, TauAdjustment,
};
use kinase_npu_plasticity::{
    coefficients_from_profile, BinFeature, PlasticityError, RegressionParams, RegressionReport,
    SpikeTraceParams, SweepConfig, SynapseUpdate, SyntheticTrialGenerator, TrialDataset,
};
use ndarray::Array2;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Calcium(#[from] CalciumError),

    #[error(transparent)]
    Plasticity(#[from] PlasticityError),

    #[error("Unknown {what}: '{value}'")]
    UnknownSetting { what: &'static str, value: String },

    #[cfg(feature = "observability")]
    #[error(transparent)]
    Observability(#[from] kinase_observability::ObservabilityError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

pub fn parse_integration_mode(value: &str) -> Result<IntegrationMode> {
    match value.to_ascii_lowercase().as_str() {
        "coarse" => Ok(IntegrationMode::Coarse),
        "analytic" => Ok(IntegrationMode::Analytic),
        _ => Err(PipelineError::UnknownSetting {
            what: "integration mode",
            value: value.to_string(),
        }),
    }
}

pub fn parse_bin_feature(value: &str) -> Result<BinFeature> {
    match value.to_ascii_lowercase().as_str() {
        "spike_counts" => Ok(BinFeature::SpikeCounts),
        "envelope_ca" => Ok(BinFeature::EnvelopeCa),
        _ => Err(PipelineError::UnknownSetting {
            what: "bin feature",
            value: value.to_string(),
        }),
    }
}

pub fn parse_synapse_update(value: &str) -> Result<SynapseUpdate> {
    match value.to_ascii_lowercase().as_str() {
        "every_cycle" => Ok(SynapseUpdate::EveryCycle),
        "on_spike" => Ok(SynapseUpdate::OnSpike),
        _ => Err(PipelineError::UnknownSetting {
            what: "synapse update",
            value: value.to_string(),
        }),
    }
}

/// Engine parameters resolved from a [`KinaseConfig`]
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub cascade: CalciumCascade,
    pub trace: SpikeTraceParams,
    pub sweep: SweepConfig,
    pub regression: RegressionParams,
    /// Seed the fit from the bin weight curves, scaled by this factor
    pub seed_scale: Option<f64>,
    /// Set when equal P / D time constants were pulled apart
    pub tau_adjustment: Option<TauAdjustment>,
}

impl EngineSettings {
    /// Validate `config` and convert every section
    pub fn from_config(config: &KinaseConfig) -> Result<Self> {
        validate_config(config)?;

        let c = &config.cascade;
        let (mut dt, tau_adjustment) = if c.separate_equal_taus {
            CascadeTimeConstants::new_separated(c.m_tau, c.p_tau, c.d_tau)?
        } else {
            (CascadeTimeConstants::new(c.m_tau, c.p_tau, c.d_tau)?, None)
        };
        dt.exp_adj = c.exp_adj;
        let cascade = CalciumCascade {
            spike_gain: c.spike_gain,
            max_isi: c.max_isi,
            mode: parse_integration_mode(&c.integration)?,
            dt,
        };

        let trace = SpikeTraceParams::new(config.trace.syn_tau, config.trace.syn_spike_gain);
        let envelope: EnvelopePreset = config.envelope.preset.parse()?;

        let s = &config.sweep;
        let sweep = SweepConfig {
            n_cycles: s.n_cycles,
            plus_cycles: s.plus_cycles,
            cycles_per_bin: s.cycles_per_bin,
            min_hz: s.min_hz,
            max_hz: s.max_hz,
            step_hz: s.step_hz,
            n_trials: s.n_trials,
            seed: s.seed,
            bin_scale: s.bin_scale,
            ca_scale: s.ca_scale,
            feature: parse_bin_feature(&s.feature)?,
            synapse_update: parse_synapse_update(&s.synapse_update)?,
            envelope,
        };

        let r = &config.regression;
        let regression = RegressionParams {
            learning_rate: r.learning_rate,
            stop_tolerance: r.stop_tolerance,
            max_iters: r.max_iters,
            cost_start_iter: r.cost_start_iter,
            l1_cost: r.l1_cost,
            l2_cost: r.l2_cost,
            zero_offset: r.zero_offset,
        };
        regression.validate()?;

        Ok(Self {
            cascade,
            trace,
            sweep,
            regression,
            seed_scale: r.seed_from_bin_weights.then_some(r.seed_scale),
            tau_adjustment,
        })
    }

    /// Generator using these settings for both neuron and synapse cascades
    pub fn generator(&self) -> Result<SyntheticTrialGenerator> {
        Ok(SyntheticTrialGenerator::new(self.sweep.clone())?
            .with_trace(self.trace)
            .with_cascades(self.cascade, self.cascade))
    }

    /// Starting coefficients for the fit, if seeding from bin weights
    pub fn initial_coefficients(&self) -> Result<Option<Array2<f64>>> {
        let Some(scale) = self.seed_scale else {
            return Ok(None);
        };
        let profile = BinWeightProfile::for_trial(
            self.sweep.n_cycles,
            self.sweep.plus_cycles,
            self.sweep.cycles_per_bin,
        )?;
        Ok(Some(coefficients_from_profile(&profile, scale)))
    }
}

/// Generated dataset (with prediction columns filled) and its fit
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub dataset: TrialDataset,
    pub report: RegressionReport,
}

/// Generate the full sweep described by `settings` and fit it
pub fn run_sweep_and_fit(settings: &EngineSettings) -> Result<FitOutcome> {
    if let Some(adjustment) = settings.tau_adjustment {
        warn!(
            target: "kinase-plasticity",
            "Running with adjusted time constants: PTau = {}, DTau = {} (requested {})",
            adjustment.p_tau, adjustment.d_tau, adjustment.requested
        );
    }

    let generator = settings.generator()?;
    if settings.sweep.synapse_update == SynapseUpdate::OnSpike {
        info!(
            target: "kinase-plasticity",
            "Synapse updated on spikes, {:?} catch-up (exp_adj = {}, max_isi = {})",
            settings.cascade.mode, settings.cascade.dt.exp_adj, settings.cascade.max_isi
        );
    }
    info!(
        target: "kinase-plasticity",
        "Generating {} trials over {} rate combinations",
        settings.sweep.total_trials(),
        generator.n_cells()
    );
    let mut dataset = generator.generate()?;
    let initial = settings.initial_coefficients()?;
    let report = dataset.fit(settings.regression.clone(), initial)?;
    Ok(FitOutcome { dataset, report })
}

/// Logging options from the `[logging]` section plus extra debug flags
#[cfg(feature = "observability")]
pub fn logging_options(
    logging: &kinase_config::LoggingConfig,
    mut debug_flags: kinase_observability::CrateDebugFlags,
) -> Result<kinase_observability::LoggingOptions> {
    debug_flags.extend_names(&logging.debug_crates);
    Ok(kinase_observability::LoggingOptions {
        level: logging.level.to_ascii_lowercase(),
        format: logging.format.parse()?,
        debug_flags,
        #[cfg(feature = "file-logging")]
        log_file: logging.file.as_ref().map(std::path::PathBuf::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_converts() {
        let settings = EngineSettings::from_config(&KinaseConfig::default()).unwrap();
        assert_eq!(settings.sweep, SweepConfig::default());
        assert_eq!(settings.cascade, CalciumCascade::default());
        assert_eq!(settings.trace, SpikeTraceParams::default());
        assert!(settings.tau_adjustment.is_none());
        assert!(settings.initial_coefficients().unwrap().is_none());
    }

    #[test]
    fn test_equal_taus_separated_when_requested() {
        let mut config = KinaseConfig::default();
        config.cascade.p_tau = 40.0;
        config.cascade.d_tau = 40.0;
        assert!(matches!(
            EngineSettings::from_config(&config),
            Err(PipelineError::Config(ConfigError::ValidationError(_)))
        ));

        config.cascade.separate_equal_taus = true;
        let settings = EngineSettings::from_config(&config).unwrap();
        let adjustment = settings.tau_adjustment.unwrap();
        assert_eq!(adjustment.requested, 40.0);
        assert_eq!(settings.cascade.dt.p_tau(), 39.0);
        assert_eq!(settings.cascade.dt.d_tau(), 41.0);
    }

    #[test]
    fn test_enum_settings_parse() {
        let mut config = KinaseConfig::default();
        config.cascade.integration = "Analytic".to_string();
        config.cascade.exp_adj = false;
        config.sweep.feature = "envelope_ca".to_string();
        config.envelope.preset = "ENV10".to_string();
        config.sweep.synapse_update = "ON_SPIKE".to_string();

        let settings = EngineSettings::from_config(&config).unwrap();
        assert_eq!(settings.cascade.mode, IntegrationMode::Analytic);
        assert!(!settings.cascade.dt.exp_adj);
        assert_eq!(settings.sweep.feature, BinFeature::EnvelopeCa);
        assert_eq!(settings.sweep.envelope, EnvelopePreset::Env10);
        assert_eq!(settings.sweep.synapse_update, SynapseUpdate::OnSpike);
    }

    #[test]
    fn test_seeded_coefficients_shape() {
        let mut config = KinaseConfig::default();
        config.regression.seed_from_bin_weights = true;
        config.regression.seed_scale = 0.5;
        let settings = EngineSettings::from_config(&config).unwrap();
        let coeff = settings.initial_coefficients().unwrap().unwrap();
        assert_eq!(coeff.dim(), (2, 9));
        assert_eq!(coeff[[0, 8]], 0.0);
        assert!(coeff[[0, 7]] > coeff[[0, 0]]);
    }
}
