// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Whole-engine scenarios through the umbrella crate

use kinase::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_single_spike_time_course() {
    let cascade = CalciumCascade::default();
    let mut state = CascadeState::default();
    let mut trace = Vec::with_capacity(201);

    cascade.step_from_spike(1.0, &mut state);
    trace.push(state);
    for _ in 0..200 {
        cascade.step_from_spike(0.0, &mut state);
        trace.push(state);
    }

    assert!(trace[50].ca_m < 0.01);

    let argmax = |f: fn(&CascadeState) -> f32| {
        trace
            .iter()
            .enumerate()
            .max_by(|a, b| f(a.1).total_cmp(&f(b.1)))
            .map(|(i, _)| i)
            .unwrap()
    };
    let p_peak = argmax(|s| s.ca_p);
    let d_peak = argmax(|s| s.ca_d);
    assert!(d_peak > p_peak);

    assert!(trace[5].ca_p > trace[5].ca_d);
    assert!(trace[200].ca_d > trace[200].ca_p);
    assert!(trace[200].ca_p < trace[p_peak].ca_p);
}

#[test]
fn test_analytic_catch_up_matches_per_cycle_updates() {
    let cascade = CalciumCascade::default().with_mode(IntegrationMode::Analytic);
    let mut stepped = CascadeState::default();
    cascade.step_from_spike(1.0, &mut stepped);
    let mut jumped = stepped;

    for _ in 0..37 {
        cascade.step_from_spike(0.0, &mut stepped);
    }
    cascade.current_calcium(47, 10, &mut jumped).unwrap();

    assert!((stepped.ca_m - jumped.ca_m).abs() < 1e-4);
    assert!((stepped.ca_p - jumped.ca_p).abs() < 1e-4);
    assert!((stepped.ca_d - jumped.ca_d).abs() < 1e-4);
}

#[test]
fn test_event_driven_updates_track_random_spike_train() {
    let mut cascade = CalciumCascade::default().with_mode(IntegrationMode::Analytic);
    cascade.max_isi = 10_000;
    let mut rng = StdRng::seed_from_u64(2025);

    let mut stepped = CascadeState::default();
    let mut event = CascadeState::default();
    let mut last_update = -1;
    for time in 0..2000 {
        let spike = if rng.gen::<f32>() < 0.03 { 1.0 } else { 0.0 };
        cascade.step_from_spike(spike, &mut stepped);
        if spike > 0.0 {
            cascade.current_calcium(time, last_update, &mut event).unwrap();
            cascade.step_from_spike(spike, &mut event);
            last_update = time + 1;
        }
    }
    cascade.current_calcium(2000, last_update, &mut event).unwrap();

    let close = |a: f32, b: f32| (a - b).abs() <= 1e-3 * a.abs().max(1e-3);
    assert!(stepped.ca_p > 0.0);
    assert!(close(stepped.ca_m, event.ca_m), "{:?} vs {:?}", stepped, event);
    assert!(close(stepped.ca_p, event.ca_p), "{:?} vs {:?}", stepped, event);
    assert!(close(stepped.ca_d, event.ca_d), "{:?} vs {:?}", stepped, event);
}

#[test]
fn test_shared_decay_tables() {
    let cache = DecayTableCache::new();
    let params = DecayTableParams {
        y_res: 0.1,
        m_max: 1.0,
        pd_max: 0.5,
        t_max: 20,
        ..DecayTableParams::default()
    };
    let (tables, existed) = cache.get_or_build(&params).unwrap();
    assert!(!existed);
    let (again, existed) = cache.get_or_build(&params).unwrap();
    assert!(existed);
    assert!(std::sync::Arc::ptr_eq(&tables, &again));

    // No-input decay from a grid point lines up with the cascade itself
    let cascade = CalciumCascade::default();
    let mut state = CascadeState {
        ca_m: 0.5,
        ca_p: 0.2,
        ca_d: 0.1,
    };
    for _ in 0..10 {
        cascade.step_from_level(0.0, &mut state);
    }
    assert!((tables.p_from_last_spike(0.2, 0.5, 10) - state.ca_p).abs() < 1e-5);
    assert!((tables.d_from_last_spike(0.1, 0.2, 0.5, 10) - state.ca_d).abs() < 1e-5);
}

#[test]
fn test_bin_weights_favor_plus_phase() {
    let profile = BinWeightProfile::for_trial(200, 50, 25).unwrap();
    assert_eq!(profile.len(), 8);
    let mut sorted = profile.cp.clone();
    sorted.sort_by(|a, b| b.total_cmp(a));
    assert_eq!(&sorted[..2], &[profile.cp[7], profile.cp[6]]);
}
