// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Property tests for gradient-descent regression

use kinase_npu_plasticity::{LinearRegression, RegressionParams};
use ndarray::Array2;
use proptest::prelude::*;

fn unit_features(rows: usize, seed: u32) -> Array2<f64> {
    Array2::from_shape_fn((rows, 3), |(r, c)| {
        let x = (r as u32 * 31 + c as u32 * 17 + seed) % 97;
        x as f64 / 96.0
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_mse_non_increasing_without_costs(
        w0 in -2.0f64..2.0,
        w1 in -2.0f64..2.0,
        w2 in -2.0f64..2.0,
        offset in -1.0f64..1.0,
        seed in 0u32..1000,
    ) {
        let x = unit_features(40, seed);
        let y = Array2::from_shape_fn((40, 1), |(r, _)| {
            w0 * x[[r, 0]] + w1 * x[[r, 1]] + w2 * x[[r, 2]] + offset
        });

        let params = RegressionParams {
            stop_tolerance: 0.0,
            max_iters: 40,
            ..RegressionParams::default()
        };
        let mut model = LinearRegression::new(params, 3, 1);
        let report = model.fit(x.view(), y.view(), None, None).unwrap();

        prop_assert_eq!(report.mse_history.len(), 40);
        for pair in report.mse_history.windows(2) {
            prop_assert!(pair[1] <= pair[0] + 1e-12, "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_prediction_and_residual_sum_to_target(
        scale in 0.1f64..3.0,
        seed in 0u32..1000,
    ) {
        let x = unit_features(25, seed);
        let y = Array2::from_shape_fn((25, 2), |(r, c)| scale * x[[r, c]]);
        let mut pred = Array2::zeros((25, 2));
        let mut err = Array2::zeros((25, 2));

        let mut model = LinearRegression::new(RegressionParams::default(), 3, 2);
        model
            .fit(x.view(), y.view(), Some(pred.view_mut()), Some(err.view_mut()))
            .unwrap();

        for ((p, e), t) in pred.iter().zip(err.iter()).zip(y.iter()) {
            prop_assert!((p + e - t).abs() < 1e-12);
        }
    }
}
