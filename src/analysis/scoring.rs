// Ground-truth matching and detection metrics
//
// Every ground-truth peak is matched to its single nearest detection (ties
// go to the earliest detection). The match counts when the time difference
// is within `tolerance`. Matching is greedy and one-sided: one detection may
// be claimed by several ground-truth peaks. Such duplicate claims are
// absorbed by counting false positives against the number of *distinct*
// detections used, so
//
//   TP = matched ground-truth peaks
//   FN = unmatched ground-truth peaks
//   FP = detections - distinct matched detections
//
// Metrics never fail. With no matches the timing and amplitude errors are
// NaN and the ratios fall back to 0 when their denominator is 0.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::analysis::types::{Peak, PeakSet};

/// Headline metrics for one method on one signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    /// TP / (TP + FN)
    pub sensitivity: f64,
    /// TP / (TP + FP); a precision-style ratio
    pub specificity: f64,
    /// Mean |t_gt - t_det| over matched pairs
    pub time_accuracy: f64,
    /// Mean |a_gt - a_det| over matched pairs
    pub mae_intensity: f64,
}

impl MetricsRecord {
    /// Values in persisted column order
    pub fn as_row(&self) -> [f64; 4] {
        [
            self.sensitivity,
            self.specificity,
            self.time_accuracy,
            self.mae_intensity,
        ]
    }

    pub fn from_row(row: [f64; 4]) -> Self {
        Self {
            sensitivity: row[0],
            specificity: row[1],
            time_accuracy: row[2],
            mae_intensity: row[3],
        }
    }
}

/// One ground-truth peak and the detection it claimed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub ground_truth_index: usize,
    pub detected_index: usize,
    pub time_error: f64,
    pub amplitude_error: f64,
}

/// Raw counts behind a `MetricsRecord`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub true_positives: usize,
    pub false_negatives: usize,
    pub false_positives: usize,
    pub pairs: Vec<MatchedPair>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub metrics: MetricsRecord,
    pub summary: MatchSummary,
}

/// Score `detected` against `ground_truth`
pub fn score(ground_truth: &PeakSet, detected: &PeakSet, tolerance: f64) -> ScoreCard {
    let det = detected.as_slice();

    let pairs: Vec<MatchedPair> = ground_truth
        .iter()
        .enumerate()
        .filter_map(|(gt_index, gt)| {
            let (det_index, diff) = nearest(det, gt.time)?;
            (diff <= tolerance).then(|| MatchedPair {
                ground_truth_index: gt_index,
                detected_index: det_index,
                time_error: diff,
                amplitude_error: (gt.amplitude - det[det_index].amplitude).abs(),
            })
        })
        .collect();

    let distinct: BTreeSet<usize> = pairs.iter().map(|p| p.detected_index).collect();
    let tp = pairs.len();
    let fn_ = ground_truth.len() - tp;
    let fp = det.len() - distinct.len();

    let metrics = MetricsRecord {
        sensitivity: ratio_or_zero(tp, tp + fn_),
        specificity: ratio_or_zero(tp, tp + fp),
        time_accuracy: mean_or_nan(pairs.iter().map(|p| p.time_error)),
        mae_intensity: mean_or_nan(pairs.iter().map(|p| p.amplitude_error)),
    };

    ScoreCard {
        metrics,
        summary: MatchSummary {
            true_positives: tp,
            false_negatives: fn_,
            false_positives: fp,
            pairs,
        },
    }
}

fn ratio_or_zero(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

fn mean_or_nan(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count > 0 {
        sum / count as f64
    } else {
        f64::NAN
    }
}

/// Index and distance of the closest detection; first one wins on ties
fn nearest(detected: &[Peak], time: f64) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, peak) in detected.iter().enumerate() {
        let diff = (peak.time - time).abs();
        match best {
            Some((_, best_diff)) if !(diff < best_diff) => {}
            _ => best = Some((i, diff)),
        }
    }
    best
}
