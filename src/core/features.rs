//! Feature computation from drained samples.
//!
//! Every extractor here is a total function: empty or sparse input, clock
//! skew and out-of-range sensor values all map to a defined number.

use crate::capture::types::{Sample, SampleKind, SampleValue};
use crate::core::snapshot::DrainedSamples;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap};

/// The reduced output of one snapshot cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Population variance of the orientation beta axis
    pub gyro_variance: f64,
    /// Mean KeyDown to KeyUp duration in milliseconds
    pub typing_cadence_mean_millis: f64,
    /// Mean touch force, in [0, 1]
    pub touch_pressure_avg: f64,
    /// Mean acceleration vector magnitude
    pub accel_magnitude_mean: f64,
    /// Samples drained across all kinds
    pub sample_count: usize,
    /// Samples drained per kind
    pub sample_counts: BTreeMap<SampleKind, usize>,
    /// When the snapshot was taken
    pub snapshot_timestamp: DateTime<Utc>,
}

impl FeatureVector {
    /// Number of samples drained for one kind.
    pub fn count_of(&self, kind: SampleKind) -> usize {
        self.sample_counts.get(&kind).copied().unwrap_or(0)
    }
}

/// Compute every feature from one set of drained samples.
pub fn compute_features(drained: &DrainedSamples, snapshot_timestamp: DateTime<Utc>) -> FeatureVector {
    let betas = orientation_beta(drained.samples(SampleKind::Orientation));
    let keystrokes = merge_by_arrival(
        drained.samples(SampleKind::KeyDown),
        drained.samples(SampleKind::KeyUp),
    );

    let sample_counts: BTreeMap<SampleKind, usize> = SampleKind::ALL
        .iter()
        .map(|&kind| (kind, drained.samples(kind).len()))
        .collect();

    FeatureVector {
        gyro_variance: variance(&betas),
        typing_cadence_mean_millis: typing_cadence_mean(&keystrokes),
        touch_pressure_avg: mean_pressure(drained.samples(SampleKind::TouchStart)),
        accel_magnitude_mean: mean_magnitude(drained.samples(SampleKind::Acceleration)),
        sample_count: sample_counts.values().sum(),
        sample_counts,
        snapshot_timestamp,
    }
}

/// Population variance. Fewer than two values means no observed variability.
pub fn variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let direct = xs.iter().population_variance();
    if direct.is_finite() {
        // Guard against a tiny negative from rounding
        return direct.max(0.0);
    }

    // Squared deviations overflowed; reduce in units of the largest magnitude.
    let scale = xs.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    let scaled = xs.iter().map(|x| x / scale).population_variance().max(0.0);
    saturate(scaled * scale * scale)
}

/// Mean KeyDown to KeyUp duration over events in the order given.
///
/// A repeated KeyDown replaces the pending press for its key. A KeyUp with
/// no pending press is ignored. Negative durations are clamped to zero.
pub fn typing_cadence_mean(events: &[Sample]) -> f64 {
    let mut pending: HashMap<&str, i64> = HashMap::new();
    let mut durations: Vec<f64> = Vec::new();

    for event in events {
        let Some(key) = event.key() else {
            continue;
        };
        match event.kind() {
            SampleKind::KeyDown => {
                pending.insert(key, event.captured_at_millis());
            }
            SampleKind::KeyUp => {
                if let Some(down) = pending.remove(key) {
                    let held = event.captured_at_millis().saturating_sub(down).max(0);
                    durations.push(held as f64);
                }
            }
            _ => {}
        }
    }

    if durations.is_empty() {
        0.0
    } else {
        durations.iter().mean()
    }
}

/// Mean touch force, each value clamped into [0, 1] first.
pub fn mean_pressure(touches: &[Sample]) -> f64 {
    let forces: Vec<f64> = touches
        .iter()
        .filter_map(|s| match s.value() {
            SampleValue::Touch { force, .. } if force.is_finite() => Some(force.clamp(0.0, 1.0)),
            _ => None,
        })
        .collect();

    if forces.is_empty() {
        return 0.0;
    }
    forces.iter().mean().clamp(0.0, 1.0)
}

/// Mean Euclidean norm of acceleration vectors.
pub fn mean_magnitude(accels: &[Sample]) -> f64 {
    let magnitudes: Vec<f64> = accels
        .iter()
        .filter_map(|s| match s.value() {
            SampleValue::Acceleration { x, y, z } => Some(x.hypot(*y).hypot(*z)),
            _ => None,
        })
        .map(saturate)
        .collect();

    if magnitudes.is_empty() {
        0.0
    } else {
        saturate(magnitudes.iter().mean())
    }
}

/// Clamp an overflowed reduction to the largest finite value.
fn saturate(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        f64::MAX
    }
}

/// Project orientation samples onto the beta (front/back tilt) axis.
pub fn orientation_beta(samples: &[Sample]) -> Vec<f64> {
    samples
        .iter()
        .filter_map(|s| match s.value() {
            SampleValue::Orientation { beta, .. } => Some(*beta),
            _ => None,
        })
        .collect()
}

/// Interleave two drained sequences by store arrival order.
pub fn merge_by_arrival(a: &[Sample], b: &[Sample]) -> Vec<Sample> {
    let mut merged: Vec<Sample> = a.iter().chain(b.iter()).cloned().collect();
    merged.sort_by_key(Sample::arrival);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped(samples: Vec<Sample>) -> Vec<Sample> {
        samples
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.stamped(i as u64 + 1))
            .collect()
    }

    #[test]
    fn test_variance_short_input_is_zero() {
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(variance(&[42.0]), 0.0);
    }

    #[test]
    fn test_variance_population() {
        let v = variance(&[10.0, 20.0, 30.0]);
        assert!((v - 200.0 / 3.0).abs() < 1e-9);

        let v = variance(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((v - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_variance_of_huge_values_stays_finite() {
        let v = variance(&[1e200, -1e200, 0.0]);
        assert_eq!(v, f64::MAX);

        let v = variance(&[1e300, 1e300, 1e300]);
        assert_eq!(v, 0.0);

        let mut spike = vec![0.0; 10];
        spike[0] = 3e154;
        let v = variance(&spike);
        assert!((v / 8.1e307 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_magnitude_of_huge_vectors_stays_finite() {
        let accels = vec![Sample::acceleration(1e200, 1e200, 0.0, 1)];
        let m = mean_magnitude(&accels);
        assert!((m / (1e200 * 2f64.sqrt()) - 1.0).abs() < 1e-12);

        let accels = vec![Sample::acceleration(f64::MAX, f64::MAX, 0.0, 1)];
        assert_eq!(mean_magnitude(&accels), f64::MAX);
    }

    #[test]
    fn test_variance_constant_input() {
        assert_eq!(variance(&[5.5, 5.5, 5.5, 5.5]), 0.0);
    }

    #[test]
    fn test_cadence_pairs_by_key() {
        let events = vec![
            Sample::key_down("a", 100),
            Sample::key_up("a", 180),
            Sample::key_down("b", 120),
            Sample::key_up("b", 300),
        ];
        assert_eq!(typing_cadence_mean(&events), 130.0);
    }

    #[test]
    fn test_cadence_interleaved_keys() {
        let events = vec![
            Sample::key_down("a", 100),
            Sample::key_down("b", 120),
            Sample::key_up("a", 180),
            Sample::key_up("b", 300),
        ];
        assert_eq!(typing_cadence_mean(&events), 130.0);
    }

    #[test]
    fn test_cadence_ignores_unmatched_key_up() {
        let events = vec![
            Sample::key_up("z", 50),
            Sample::key_down("a", 100),
            Sample::key_up("a", 180),
        ];
        assert_eq!(typing_cadence_mean(&events), 80.0);
    }

    #[test]
    fn test_cadence_repeated_key_down_latest_wins() {
        let events = vec![
            Sample::key_down("a", 100),
            Sample::key_down("a", 150),
            Sample::key_up("a", 200),
        ];
        assert_eq!(typing_cadence_mean(&events), 50.0);
    }

    #[test]
    fn test_cadence_clamps_clock_skew() {
        let events = vec![
            Sample::key_down("a", 500),
            Sample::key_up("a", 400),
            Sample::key_down("b", 0),
            Sample::key_up("b", 100),
        ];
        assert_eq!(typing_cadence_mean(&events), 50.0);
    }

    #[test]
    fn test_cadence_empty_and_unpaired() {
        assert_eq!(typing_cadence_mean(&[]), 0.0);
        assert_eq!(typing_cadence_mean(&[Sample::key_down("a", 1)]), 0.0);
    }

    #[test]
    fn test_pressure_clamped() {
        let touches = vec![
            Sample::touch(1.7, 0.0, 0.0, 1),
            Sample::touch(-0.3, 0.0, 0.0, 2),
            Sample::touch(0.5, 0.0, 0.0, 3),
        ];
        let avg = mean_pressure(&touches);
        assert!((avg - 0.5).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&avg));
    }

    #[test]
    fn test_pressure_empty_is_zero() {
        assert_eq!(mean_pressure(&[]), 0.0);
    }

    #[test]
    fn test_mean_magnitude() {
        let accels = vec![
            Sample::acceleration(3.0, 4.0, 0.0, 1),
            Sample::acceleration(0.0, 0.0, 1.0, 2),
        ];
        assert!((mean_magnitude(&accels) - 3.0).abs() < 1e-9);
        assert_eq!(mean_magnitude(&[]), 0.0);
    }

    #[test]
    fn test_merge_by_arrival_restores_interleaving() {
        let all = stamped(vec![
            Sample::key_down("a", 100),
            Sample::key_down("b", 120),
            Sample::key_up("a", 180),
            Sample::key_up("b", 300),
        ]);
        let downs: Vec<Sample> = all.iter().filter(|s| s.kind() == SampleKind::KeyDown).cloned().collect();
        let ups: Vec<Sample> = all.iter().filter(|s| s.kind() == SampleKind::KeyUp).cloned().collect();

        let merged = merge_by_arrival(&downs, &ups);
        assert_eq!(merged, all);
    }

    #[test]
    fn test_compute_features_counts_every_kind() {
        let drained = DrainedSamples::from_samples(stamped(vec![
            Sample::orientation(0.0, 10.0, 0.0, 1),
            Sample::orientation(0.0, 20.0, 0.0, 2),
            Sample::orientation(0.0, 30.0, 0.0, 3),
            Sample::acceleration(3.0, 4.0, 0.0, 4),
            Sample::key_down("a", 100),
            Sample::key_up("a", 180),
            Sample::touch(0.25, 1.0, 1.0, 5),
        ]));

        let features = compute_features(&drained, Utc::now());
        assert_eq!(features.sample_count, 7);
        assert_eq!(features.count_of(SampleKind::Orientation), 3);
        assert_eq!(features.count_of(SampleKind::KeyUp), 1);
        assert!((features.gyro_variance - 66.666_666).abs() < 1e-3);
        assert_eq!(features.typing_cadence_mean_millis, 80.0);
        assert_eq!(features.touch_pressure_avg, 0.25);
        assert_eq!(features.accel_magnitude_mean, 5.0);
    }
}
