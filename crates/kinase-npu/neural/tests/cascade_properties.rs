// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for cascade integration and bin weight curves

use kinase_npu_neural::*;
use proptest::prelude::*;

// Time constants with three distinct values, ordered fast to slow
fn distinct_taus() -> impl Strategy<Value = (f32, f32, f32)> {
    (1u32..20, 21u32..60, 1u32..20).prop_map(|(m, p, gap)| (m as f32, p as f32, (p + gap) as f32))
}

fn cascade_state() -> impl Strategy<Value = CascadeState> {
    (0.0f32..3.0, 0.0f32..2.0, 0.0f32..2.0).prop_map(|(m, p, d)| CascadeState::new(m, p, d))
}

proptest! {
    // Property: the compensated closed form reproduces fine stepping
    #[test]
    fn test_analytic_jump_matches_stepping(
        (m_tau, p_tau, d_tau) in distinct_taus(),
        start in cascade_state(),
        interval in 1i32..150,
    ) {
        let tc = CascadeTimeConstants::new(m_tau, p_tau, d_tau).unwrap();
        let cascade = CalciumCascade::new(tc);

        let mut stepped = start;
        for _ in 0..interval {
            cascade.step_from_level(0.0, &mut stepped);
        }
        let mut jumped = start;
        cascade.analytic_jump(interval, &mut jumped).unwrap();

        prop_assert!((stepped.ca_m - jumped.ca_m).abs() < 1e-4);
        prop_assert!((stepped.ca_p - jumped.ca_p).abs() < 1e-4,
            "CaP {} vs {}", stepped.ca_p, jumped.ca_p);
        prop_assert!((stepped.ca_d - jumped.ca_d).abs() < 1e-4,
            "CaD {} vs {}", stepped.ca_d, jumped.ca_d);
    }

    // Property: stages stay within [0, spike_gain] for any spike train
    #[test]
    fn test_cascade_bounded_by_drive(
        (m_tau, p_tau, d_tau) in distinct_taus(),
        spikes in prop::collection::vec(any::<bool>(), 1..400),
    ) {
        let tc = CascadeTimeConstants::new(m_tau, p_tau, d_tau).unwrap();
        let cascade = CalciumCascade::new(tc);
        let ceiling = cascade.spike_gain * (1.0 + 1e-5);

        let mut state = CascadeState::default();
        for spike in spikes {
            cascade.step_from_spike(if spike { 1.0 } else { 0.0 }, &mut state);
            prop_assert!(state.ca_m >= 0.0 && state.ca_m <= ceiling);
            prop_assert!(state.ca_p >= 0.0 && state.ca_p <= ceiling);
            prop_assert!(state.ca_d >= 0.0 && state.ca_d <= ceiling);
        }
    }

    // Property: coarse catch-up never leaves the non-negative range either
    #[test]
    fn test_current_calcium_non_negative(
        start in cascade_state(),
        isi in 0i32..120,
    ) {
        let cascade = CalciumCascade::default();
        let mut state = start;
        cascade.current_calcium(isi, 0, &mut state).unwrap();
        prop_assert!(state.ca_m >= 0.0);
        prop_assert!(state.ca_p >= 0.0);
        prop_assert!(state.ca_d >= 0.0);
    }

    // Property: valid layouts give non-negative curves peaking at the end
    #[test]
    fn test_bin_weights_non_negative(
        n in 2usize..40,
        nplus_frac in 0.0f64..1.0,
        cycles_per_bin in 1usize..60,
    ) {
        let nplus = 1 + ((n - 1) as f64 * nplus_frac) as usize;
        let nplus = nplus.min(n - 1);
        let profile = BinWeightProfile::for_plus(n, nplus, cycles_per_bin).unwrap();

        prop_assert!(profile.cp.iter().all(|w| *w >= 0.0));
        prop_assert!(profile.cd.iter().all(|w| *w >= 0.0));
        prop_assert!(profile.cp[n - 1] > profile.cp[0]);
    }
}

#[test]
fn test_envelope_weights_normalized_for_every_preset() {
    for name in ["Env30", "Env25", "Env20", "Env10"] {
        let env = BinnedEnvelope::new(name.parse().unwrap());
        let sum_t: f32 = env.bin_t.iter().sum();
        assert!((sum_t - 1.0).abs() < 1e-6);
        assert!((env.bin1_cur + env.bin1_prev - 1.0).abs() < 1e-6);
    }
}
