// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # kinase-observability
//!
//! Logging setup shared by the kinase tools and tests, with per-crate
//! debug flag support.
//!
//! Library crates only emit `tracing` events under their own targets
//! (`kinase-neural`, `kinase-plasticity`, ...). Binaries call
//! [`init_logging`] once to install a subscriber.
//!
//! ## Features
//! - `file-logging`: mirror console output into a log file

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Log targets used across the workspace, for `--debug-all`
pub const KNOWN_CRATES: &[&str] = &[
    "kinase-neural",
    "kinase-plasticity",
    "kinase-config",
    "linear_fit",
];
