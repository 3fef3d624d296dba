//! # Kinase - synaptic calcium traces and their binned approximations
//!
//! Kinase-style plasticity drives learning from a cascade of exponentially
//! filtered calcium signals (CaM -> CaP -> CaD). Simulating that cascade at
//! every synapse on every cycle is expensive, so this crate also provides the
//! tools to approximate it from per-bin spike statistics and to fit those
//! approximations by linear regression.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kinase = "0.1"  # Default: parallel sweep + config + observability
//! ```
//!
//! ## Feature Flags
//!
//! - **`parallel`** (default): generate sweep cells with rayon
//! - **`config`** (default): `kinase_configuration.toml` loading and the
//!   [`pipeline`] helpers
//! - **`observability`** (default): `tracing-subscriber` setup
//!
//! ## Usage Examples
//!
//! ### Stepping a cascade
//!
//! ```rust
//! use kinase::prelude::*;
//!
//! let cascade = CalciumCascade::default();
//! let mut state = CascadeState::default();
//! cascade.step_from_spike(1.0, &mut state);
//! for _ in 0..50 {
//!     cascade.step_from_spike(0.0, &mut state);
//! }
//! assert!(state.ca_d > 0.0);
//! ```
//!
//! ### Generate and fit
//!
//! ```rust,no_run
//! use kinase::prelude::*;
//!
//! let generator = SyntheticTrialGenerator::new(SweepConfig::default())?;
//! let mut dataset = generator.generate()?;
//! let report = dataset.fit(RegressionParams::default(), None)?;
//! println!("{}", report.variance_summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  kinase-npu-neural                                      │
//! │  (cascade, envelopes, bin weights, decay tables)        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  kinase-npu-plasticity                                  │
//! │  (synthetic trials, dataset, linear regression)         │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  kinase-config / kinase-observability                   │
//! │  (TOML settings, logging), used by tools               │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

// Re-export algorithms
pub use kinase_npu_neural as neural;
pub use kinase_npu_plasticity as plasticity;

// Re-export infrastructure
#[cfg(feature = "config")]
pub use kinase_config as config;

#[cfg(feature = "observability")]
pub use kinase_observability as observability;

#[cfg(feature = "config")]
pub mod pipeline;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::neural::{
        BinWeightProfile, BinnedEnvelope, CalciumCascade, CascadeState, CascadeTimeConstants,
        DecayTableCache, DecayTableParams, DecayTables, EnvelopePreset, IntegrationMode,
        SynapseCalcium,
    };
    pub use crate::plasticity::{
        BinFeature, LinearRegression, RegressionParams, RegressionReport, SpikeTraceParams,
        SweepConfig, SyntheticTrialGenerator, TrialDataset,
    };

    #[cfg(feature = "config")]
    pub use crate::config::{load_config, validate_config, KinaseConfig};

    #[cfg(feature = "config")]
    pub use crate::pipeline::{run_sweep_and_fit, EngineSettings, FitOutcome};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let profile = BinWeightProfile::for_plus(8, 2, 25).unwrap();
        assert_eq!(profile.len(), 8);
        assert_eq!(SweepConfig::default().n_bins(), 8);
    }
}
