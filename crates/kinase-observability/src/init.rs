// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Installs a single global `tracing` subscriber: an `EnvFilter` built from
//! the base level plus per-crate debug flags, and a console layer in text or
//! JSON format. With `file-logging`, a JSON copy is written to a file.

#[cfg(feature = "file-logging")]
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(feature = "file-logging")]
use anyhow::anyhow;
use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ObservabilityError {
    #[error("Unknown log format '{0}' (expected 'text' or 'json')")]
    UnknownFormat(String),

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Console output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ObservabilityError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Base level directive for every target not raised by `debug_flags`
    pub level: String,
    pub format: LogFormat,
    pub debug_flags: CrateDebugFlags,
    #[cfg(feature = "file-logging")]
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            debug_flags: CrateDebugFlags::default(),
            #[cfg(feature = "file-logging")]
            log_file: None,
        }
    }
}

/// Keeps background log writers alive; drop it last in `main`
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Build the global filter from the base level and debug flags
pub fn build_filter(options: &LoggingOptions) -> std::result::Result<EnvFilter, ObservabilityError> {
    let filter = options.debug_flags.to_filter_string(&options.level);
    EnvFilter::try_new(&filter).map_err(|e| ObservabilityError::InvalidFilter {
        filter,
        reason: e.to_string(),
    })
}

/// Install the global subscriber
///
/// # Errors
///
/// Fails on an invalid filter, an unusable log file path, or when a global
/// subscriber is already installed.
pub fn init_logging(options: &LoggingOptions) -> Result<LoggingGuard> {
    let filter = build_filter(options)?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let console_layer = match options.format {
        LogFormat::Text => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed(),
    };
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let file_guard = match &options.log_file {
        Some(path) => {
            let (file_layer, guard) = file_layer(path)?;
            layers.push(file_layer);
            Some(guard)
        }
        None => None,
    };

    Registry::default()
        .with(layers)
        .with(filter)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: file_guard,
    })
}

#[cfg(feature = "file-logging")]
fn file_layer(
    path: &Path,
) -> Result<(
    Box<dyn Layer<Registry> + Send + Sync>,
    tracing_appender::non_blocking::WorkerGuard,
)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Log file path has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .boxed();
    Ok((layer, guard))
}

/// Initialize logging at `info` with text output and the given debug flags
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(&LoggingOptions {
        debug_flags: debug_flags.clone(),
        ..LoggingOptions::default()
    })
}
