// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Values are layered in this order, later layers winning:
//! 1. TOML file
//! 2. Environment variables
//! 3. CLI arguments

use crate::{ConfigError, ConfigResult, KinaseConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "kinase_configuration.toml";

/// Environment variable naming an explicit config file
const CONFIG_PATH_VAR: &str = "KINASE_CONFIG_PATH";

/// Find the kinase configuration file
///
/// Search order:
/// 1. `KINASE_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_VAR) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_VAR,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_VAR
    )))
}

/// Load configuration from a TOML file and apply overrides
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found or contains invalid TOML.
/// Validation is left to [`crate::validate_config`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<KinaseConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config = load_config_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Parse configuration from TOML text without applying overrides
pub fn load_config_str(content: &str) -> ConfigResult<KinaseConfig> {
    Ok(toml::from_str(content)?)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `KINASE_SEED` -> `sweep.seed`
/// - `KINASE_TRIALS` -> `sweep.n_trials`
/// - `KINASE_MIN_HZ` -> `sweep.min_hz`
/// - `KINASE_MAX_HZ` -> `sweep.max_hz`
/// - `KINASE_STEP_HZ` -> `sweep.step_hz`
/// - `KINASE_FEATURE` -> `sweep.feature`
/// - `KINASE_ENVELOPE` -> `envelope.preset`
/// - `KINASE_INTEGRATION` -> `cascade.integration`
/// - `KINASE_SYNAPSE_UPDATE` -> `sweep.synapse_update`
/// - `KINASE_MAX_ITERS` -> `regression.max_iters`
/// - `KINASE_LOG_LEVEL` -> `logging.level`
/// - `KINASE_LOG_FORMAT` -> `logging.format`
///
/// Values that fail to parse are ignored.
pub fn apply_environment_overrides(config: &mut KinaseConfig) {
    if let Ok(value) = env::var("KINASE_SEED") {
        if let Ok(seed) = value.parse() {
            config.sweep.seed = seed;
        }
    }
    if let Ok(value) = env::var("KINASE_TRIALS") {
        if let Ok(trials) = value.parse() {
            config.sweep.n_trials = trials;
        }
    }
    if let Ok(value) = env::var("KINASE_MIN_HZ") {
        if let Ok(hz) = value.parse() {
            config.sweep.min_hz = hz;
        }
    }
    if let Ok(value) = env::var("KINASE_MAX_HZ") {
        if let Ok(hz) = value.parse() {
            config.sweep.max_hz = hz;
        }
    }
    if let Ok(value) = env::var("KINASE_STEP_HZ") {
        if let Ok(hz) = value.parse() {
            config.sweep.step_hz = hz;
        }
    }
    if let Ok(value) = env::var("KINASE_FEATURE") {
        config.sweep.feature = value;
    }
    if let Ok(value) = env::var("KINASE_ENVELOPE") {
        config.envelope.preset = value;
    }
    if let Ok(value) = env::var("KINASE_INTEGRATION") {
        config.cascade.integration = value;
    }
    if let Ok(value) = env::var("KINASE_SYNAPSE_UPDATE") {
        config.sweep.synapse_update = value;
    }
    if let Ok(value) = env::var("KINASE_MAX_ITERS") {
        if let Ok(iters) = value.parse() {
            config.regression.max_iters = iters;
        }
    }
    if let Ok(value) = env::var("KINASE_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Ok(value) = env::var("KINASE_LOG_FORMAT") {
        config.logging.format = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// Supported keys: `seed`, `trials`, `min_hz`, `max_hz`, `step_hz`,
/// `feature`, `envelope`, `integration`, `synapse_update`, `learning_rate`, `max_iters`,
/// `log_level`, `log_format`. Unknown keys and unparsable values are ignored.
pub fn apply_cli_overrides(config: &mut KinaseConfig, cli_args: &HashMap<String, String>) {
    if let Some(seed) = cli_args.get("seed").and_then(|v| v.parse().ok()) {
        config.sweep.seed = seed;
    }
    if let Some(trials) = cli_args.get("trials").and_then(|v| v.parse().ok()) {
        config.sweep.n_trials = trials;
    }
    if let Some(hz) = cli_args.get("min_hz").and_then(|v| v.parse().ok()) {
        config.sweep.min_hz = hz;
    }
    if let Some(hz) = cli_args.get("max_hz").and_then(|v| v.parse().ok()) {
        config.sweep.max_hz = hz;
    }
    if let Some(hz) = cli_args.get("step_hz").and_then(|v| v.parse().ok()) {
        config.sweep.step_hz = hz;
    }
    if let Some(feature) = cli_args.get("feature") {
        config.sweep.feature = feature.clone();
    }
    if let Some(preset) = cli_args.get("envelope") {
        config.envelope.preset = preset.clone();
    }
    if let Some(mode) = cli_args.get("integration") {
        config.cascade.integration = mode.clone();
    }
    if let Some(schedule) = cli_args.get("synapse_update") {
        config.sweep.synapse_update = schedule.clone();
    }
    if let Some(lr) = cli_args.get("learning_rate").and_then(|v| v.parse().ok()) {
        config.regression.learning_rate = lr;
    }
    if let Some(iters) = cli_args.get("max_iters").and_then(|v| v.parse().ok()) {
        config.regression.max_iters = iters;
    }
    if let Some(level) = cli_args.get("log_level") {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli_args.get("log_format") {
        config.logging.format = format.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    // Tests below mutate process-wide environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: [&str; 12] = [
        "KINASE_SEED",
        "KINASE_TRIALS",
        "KINASE_MIN_HZ",
        "KINASE_MAX_HZ",
        "KINASE_STEP_HZ",
        "KINASE_FEATURE",
        "KINASE_ENVELOPE",
        "KINASE_INTEGRATION",
        "KINASE_SYNAPSE_UPDATE",
        "KINASE_MAX_ITERS",
        "KINASE_LOG_LEVEL",
        "KINASE_LOG_FORMAT",
    ];

    fn clear_env() {
        for var in OVERRIDE_VARS {
            env::remove_var(var);
        }
        env::remove_var(CONFIG_PATH_VAR);
    }

    #[test]
    fn test_load_config_from_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "[sweep]\nseed = 42\nn_trials = 3\n\n[envelope]\npreset = \"Env20\"").unwrap();

        let config = load_config(Some(&path), None).unwrap();
        assert_eq!(config.sweep.seed, 42);
        assert_eq!(config.sweep.n_trials, 3);
        assert_eq!(config.envelope.preset, "Env20");
        assert_eq!(config.cascade.m_tau, 5.0);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "[sweep\nseed = ").unwrap();

        assert!(matches!(
            load_config(Some(&path), None),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_config(Some(&path), None),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    fn test_config_path_env_var() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        File::create(&path).unwrap();

        env::set_var(CONFIG_PATH_VAR, &path);
        assert_eq!(find_config_file().unwrap(), path);

        env::set_var(CONFIG_PATH_VAR, dir.path().join("missing.toml"));
        assert!(matches!(
            find_config_file(),
            Err(ConfigError::FileNotFound(_))
        ));
        clear_env();
    }

    #[test]
    fn test_environment_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        env::set_var("KINASE_SEED", "99");
        env::set_var("KINASE_MAX_HZ", "60");
        env::set_var("KINASE_TRIALS", "not-a-number");
        env::set_var("KINASE_LOG_FORMAT", "json");

        let mut config = KinaseConfig::default();
        apply_environment_overrides(&mut config);
        clear_env();

        assert_eq!(config.sweep.seed, 99);
        assert_eq!(config.sweep.max_hz, 60.0);
        assert_eq!(config.sweep.n_trials, 2);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_cli_overrides_win_over_environment() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&path).unwrap();
        writeln!(file, "[sweep]\nseed = 1").unwrap();

        env::set_var("KINASE_SEED", "2");
        env::set_var("KINASE_SYNAPSE_UPDATE", "every_cycle");
        let mut cli = HashMap::new();
        cli.insert("synapse_update".to_string(), "on_spike".to_string());
        cli.insert("seed".to_string(), "3".to_string());
        cli.insert("feature".to_string(), "envelope_ca".to_string());
        cli.insert("max_iters".to_string(), "120".to_string());

        let config = load_config(Some(&path), Some(&cli)).unwrap();
        clear_env();

        assert_eq!(config.sweep.seed, 3);
        assert_eq!(config.sweep.feature, "envelope_ca");
        assert_eq!(config.regression.max_iters, 120);
        assert_eq!(config.sweep.synapse_update, "on_spike");
    }
}
