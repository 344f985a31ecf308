use proptest::prelude::*;

use crate::audio::average::RunningExponentialAverage;

#[test]
fn test_empty_until_first_add() {
    let mut average = RunningExponentialAverage::new();
    assert!(average.is_empty());

    average.add(1.0, 1e-3);
    assert!(!average.is_empty());
}

#[test]
fn test_single_add_returns_value() {
    for weight in [1e-6, 1e-3, 1.0, 500.0] {
        let mut average = RunningExponentialAverage::new();
        average.add(0.25, weight);

        assert!((average.get() - 0.25).abs() < 1e-12);
    }
}

#[test]
fn test_two_adds_weighted_mean() {
    let mut average = RunningExponentialAverage::new();
    average.add(1.0, 3.0);
    average.add(5.0, 1.0);

    // (1*3 + 5*1) / (3+1)
    assert!((average.get() - 2.0).abs() < 1e-12);
}

#[test]
fn test_heavy_weight_dominates() {
    let mut average = RunningExponentialAverage::new();
    average.add(0.5, 1e-3);
    average.add(100.0, 1e-9);

    assert!((average.get() - 0.5).abs() < 1e-3);
}

proptest! {
    #[test]
    fn prop_matches_manual_weighted_mean(
        samples in prop::collection::vec((-1e3f64..1e3, 1e-9f64..1e3), 1..32)
    ) {
        let mut average = RunningExponentialAverage::new();
        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for &(value, weight) in &samples {
            average.add(value, weight);
            weighted_sum += value * weight;
            total_weight += weight;
        }

        let expected = weighted_sum / total_weight;
        prop_assert!((average.get() - expected).abs() < 1e-9 * expected.abs().max(1.0));
    }
}
