// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Collects every problem in a configuration before reporting, so a user
//! fixing `kinase_configuration.toml` sees all of them at once.

use crate::types::{
    BIN_FEATURES, ENVELOPE_PRESETS, INTEGRATION_MODES, LOG_FORMATS, LOG_LEVELS, SYNAPSE_UPDATES,
};
use crate::{ConfigError, ConfigResult, KinaseConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidValue { field: String, reason: String },
    UnknownChoice { field: String, value: String, allowed: &'static [&'static str] },
    Inconsistent { fields: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::UnknownChoice {
                field,
                value,
                allowed,
            } => {
                write!(
                    f,
                    "Unknown value '{}' for {} (expected one of: {})",
                    value,
                    field,
                    allowed.join(", ")
                )
            }
            Self::Inconsistent { fields, reason } => {
                write!(f, "Inconsistent configuration ({}): {}", fields, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &KinaseConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// All violations in `config`, in section order
pub fn collect_errors(config: &KinaseConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_cascade(config, &mut errors);
    validate_sweep(config, &mut errors);
    validate_regression(config, &mut errors);
    validate_choices(config, &mut errors);
    errors
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigValidationError {
    ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn validate_cascade(config: &KinaseConfig, errors: &mut Vec<ConfigValidationError>) {
    let cascade = &config.cascade;
    for (field, tau) in [
        ("cascade.m_tau", cascade.m_tau),
        ("cascade.p_tau", cascade.p_tau),
        ("cascade.d_tau", cascade.d_tau),
        ("trace.syn_tau", config.trace.syn_tau),
    ] {
        if !(tau >= 1.0) || !tau.is_finite() {
            errors.push(invalid(field, format!("time constant must be >= 1, got {}", tau)));
        }
    }

    if cascade.p_tau == cascade.d_tau && !cascade.separate_equal_taus {
        errors.push(ConfigValidationError::Inconsistent {
            fields: "cascade.p_tau, cascade.d_tau".to_string(),
            reason: format!(
                "equal time constants ({}) have no closed-form solution; \
                 set cascade.separate_equal_taus = true to nudge d_tau",
                cascade.p_tau
            ),
        });
    }
    if cascade.m_tau == cascade.p_tau || cascade.m_tau == cascade.d_tau {
        errors.push(ConfigValidationError::Inconsistent {
            fields: "cascade.m_tau".to_string(),
            reason: format!("must differ from p_tau and d_tau, got {}", cascade.m_tau),
        });
    }
    if cascade.max_isi <= 0 {
        errors.push(invalid(
            "cascade.max_isi",
            format!("must be positive, got {}", cascade.max_isi),
        ));
    }
    if cascade.spike_gain < 0.0 {
        errors.push(invalid(
            "cascade.spike_gain",
            format!("must be non-negative, got {}", cascade.spike_gain),
        ));
    }
}

fn validate_sweep(config: &KinaseConfig, errors: &mut Vec<ConfigValidationError>) {
    let sweep = &config.sweep;
    if sweep.cycles_per_bin == 0 {
        errors.push(invalid("sweep.cycles_per_bin", "must be positive"));
    } else if sweep.n_cycles == 0 || sweep.n_cycles % sweep.cycles_per_bin != 0 {
        errors.push(ConfigValidationError::Inconsistent {
            fields: "sweep.n_cycles, sweep.cycles_per_bin".to_string(),
            reason: format!(
                "n_cycles ({}) must be a positive multiple of cycles_per_bin ({})",
                sweep.n_cycles, sweep.cycles_per_bin
            ),
        });
    }
    if sweep.plus_cycles >= sweep.n_cycles {
        errors.push(ConfigValidationError::Inconsistent {
            fields: "sweep.plus_cycles, sweep.n_cycles".to_string(),
            reason: format!(
                "plus_cycles ({}) must be less than n_cycles ({})",
                sweep.plus_cycles, sweep.n_cycles
            ),
        });
    }
    if !(sweep.step_hz > 0.0) {
        errors.push(invalid(
            "sweep.step_hz",
            format!("must be positive, got {}", sweep.step_hz),
        ));
    }
    if !(sweep.min_hz > 0.0) {
        errors.push(invalid(
            "sweep.min_hz",
            format!("must be positive, got {}", sweep.min_hz),
        ));
    }
    if sweep.max_hz < sweep.min_hz {
        errors.push(ConfigValidationError::Inconsistent {
            fields: "sweep.min_hz, sweep.max_hz".to_string(),
            reason: format!("max_hz ({}) is below min_hz ({})", sweep.max_hz, sweep.min_hz),
        });
    }
    if sweep.n_trials == 0 {
        errors.push(invalid("sweep.n_trials", "must be positive"));
    }
}

fn validate_regression(config: &KinaseConfig, errors: &mut Vec<ConfigValidationError>) {
    let regression = &config.regression;
    if !(regression.learning_rate > 0.0) {
        errors.push(invalid(
            "regression.learning_rate",
            format!("must be positive, got {}", regression.learning_rate),
        ));
    }
    if !(regression.stop_tolerance >= 0.0) {
        errors.push(invalid(
            "regression.stop_tolerance",
            format!("must be non-negative, got {}", regression.stop_tolerance),
        ));
    }
    if regression.max_iters == 0 {
        errors.push(invalid("regression.max_iters", "must be positive"));
    }
    if regression.l1_cost < 0.0 {
        errors.push(invalid(
            "regression.l1_cost",
            format!("must be non-negative, got {}", regression.l1_cost),
        ));
    }
    if regression.l2_cost < 0.0 {
        errors.push(invalid(
            "regression.l2_cost",
            format!("must be non-negative, got {}", regression.l2_cost),
        ));
    }
}

fn check_choice(
    field: &str,
    value: &str,
    allowed: &'static [&'static str],
    errors: &mut Vec<ConfigValidationError>,
) {
    if !allowed.iter().any(|a| a.eq_ignore_ascii_case(value)) {
        errors.push(ConfigValidationError::UnknownChoice {
            field: field.to_string(),
            value: value.to_string(),
            allowed,
        });
    }
}

fn validate_choices(config: &KinaseConfig, errors: &mut Vec<ConfigValidationError>) {
    check_choice(
        "cascade.integration",
        &config.cascade.integration,
        &INTEGRATION_MODES,
        errors,
    );
    check_choice(
        "envelope.preset",
        &config.envelope.preset,
        &ENVELOPE_PRESETS,
        errors,
    );
    check_choice("sweep.feature", &config.sweep.feature, &BIN_FEATURES, errors);
    check_choice(
        "sweep.synapse_update",
        &config.sweep.synapse_update,
        &SYNAPSE_UPDATES,
        errors,
    );
    check_choice("logging.level", &config.logging.level, &LOG_LEVELS, errors);
    check_choice("logging.format", &config.logging.format, &LOG_FORMATS, errors);
}
