// Adaptive windowed peak detection
//
// The signal is cut into consecutive windows of `sample_rate *
// window_duration` samples (the last one may be shorter). Each window is
// searched with thresholds scaled by the window maximum, and the number of
// ground-truth peaks inside the window decides which filters apply:
//
// - 0 peaks: window skipped
// - 1 peak: height + prominence
// - 2+ peaks: height + prominence + minimum distance taken from the mean
//   ground-truth spacing in that window
//
// Because the ground truth picks both the windows and the distance
// constraint, this is an evaluation tool measuring detectability under
// oracle windowing. It is not a detector that can run on unannotated data.

use serde::{Deserialize, Serialize};

use crate::analysis::peaks::{find_peaks, PeakParams};
use crate::analysis::types::{Peak, PeakSet, Signal};
use crate::config::WindowedConfig;
use crate::error::{DetectionError, Result};

/// What happened in one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    /// First sample index (inclusive)
    pub start: usize,
    /// Last sample index (exclusive)
    pub end: usize,
    pub ground_truth_count: usize,
    /// Distance constraint in samples, when one was applied
    pub min_distance: Option<usize>,
    pub detected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedOutput {
    pub peaks: PeakSet,
    pub windows: Vec<WindowSummary>,
}

/// Run the adaptive windowed detector
///
/// # Arguments
/// * `signal` - signal to search
/// * `ground_truth` - same length as `signal`; samples > 0 mark true peaks
/// * `params` - window length and threshold factors
///
/// # Errors
/// `InvalidParameter` on invalid parameters or when `ground_truth` and
/// `signal` differ in length.
pub fn detect(
    signal: &Signal,
    ground_truth: &[f64],
    params: &WindowedConfig,
) -> Result<WindowedOutput> {
    params.validate()?;
    if ground_truth.len() != signal.len() {
        return Err(DetectionError::invalid_parameter(
            "ground_truth",
            format!(
                "length {} does not match signal length {}",
                ground_truth.len(),
                signal.len()
            ),
        ));
    }

    let win_size = params.window_samples()?;
    let gt_times: Vec<f64> = signal
        .t
        .iter()
        .zip(ground_truth)
        .filter(|(_, &g)| g > 0.0)
        .map(|(&t, _)| t)
        .collect();

    let mut peaks = PeakSet::new();
    let mut windows = Vec::new();

    for start in (0..signal.len()).step_by(win_size) {
        let end = (start + win_size).min(signal.len());
        let win_x = &signal.x[start..end];
        let win_t = &signal.t[start..end];
        let (t_first, t_last) = (win_t[0], win_t[win_t.len() - 1]);

        let in_window: Vec<f64> = gt_times
            .iter()
            .copied()
            .filter(|&t| t >= t_first && t <= t_last)
            .collect();

        let mut summary = WindowSummary {
            start,
            end,
            ground_truth_count: in_window.len(),
            min_distance: None,
            detected: 0,
        };
        if in_window.is_empty() {
            windows.push(summary);
            continue;
        }

        let max_v = win_x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if in_window.len() >= 2 {
            summary.min_distance = Some(min_distance(&in_window, params.sample_rate));
        }
        let search = PeakParams {
            min_height: Some(params.height_factor * max_v),
            min_prominence: Some(params.prominence_factor * max_v),
            distance: summary.min_distance,
        };

        let found = find_peaks(win_x, &search)?;
        summary.detected = found.len();
        peaks.extend(
            found
                .into_iter()
                .map(|i| Peak {
                    time: win_t[i],
                    amplitude: win_x[i],
                })
                .collect(),
        );
        windows.push(summary);
    }

    log::debug!(
        "[Windowed] samples={} win_size={} windows={} searched={} peaks={}",
        signal.len(),
        win_size,
        windows.len(),
        windows.iter().filter(|w| w.ground_truth_count > 0).count(),
        peaks.len()
    );

    Ok(WindowedOutput { peaks, windows })
}

/// floor(mean spacing * sample_rate), at least 1
fn min_distance(gt_times: &[f64], sample_rate: f64) -> usize {
    let gaps: Vec<f64> = gt_times.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let samples = (mean_gap * sample_rate).floor();
    if samples >= 1.0 {
        samples as usize
    } else {
        1
    }
}
