// Custom pipeline: smoothing -> ALS baseline -> subtraction -> hysteresis
//
// The baseline is estimated on the smoothed signal, not the raw one, and
// detected peak amplitudes are read from the baseline-corrected signal.
// Each stage fails fast; later stages never run after an earlier error.

use serde::{Deserialize, Serialize};

use crate::analysis::baseline::AlsBaseline;
use crate::analysis::hysteresis::find_extrema;
use crate::analysis::smoothing::SavitzkyGolay;
use crate::analysis::types::{PeakSet, Signal};
use crate::config::CustomMethodConfig;
use crate::error::Result;

/// Intermediate signals and detected maxima of the custom pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomOutput {
    pub smoothed: Vec<f64>,
    pub baseline: Vec<f64>,
    /// smoothed - baseline
    pub filtered: Vec<f64>,
    pub peaks: PeakSet,
}

/// Run the custom pipeline on `signal`
pub fn detect(signal: &Signal, params: &CustomMethodConfig) -> Result<CustomOutput> {
    params.validate()?;

    let smoother = SavitzkyGolay::new(params.window_len, params.poly_order)?;
    let smoothed = smoother.smooth(&signal.x)?;

    let estimator = AlsBaseline::new(params.lambda, params.penalty, params.max_iter)?;
    let baseline = estimator.estimate(&smoothed)?;

    let filtered: Vec<f64> = smoothed
        .iter()
        .zip(&baseline)
        .map(|(s, b)| s - b)
        .collect();

    let extrema = find_extrema(&signal.t, &filtered, params.threshold)?;

    log::debug!(
        "[CustomMethod] samples={} maxima={} minima={}",
        signal.len(),
        extrema.maxima.len(),
        extrema.minima.len()
    );

    Ok(CustomOutput {
        smoothed,
        baseline,
        filtered,
        peaks: extrema.maxima,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectionError;

    fn params() -> CustomMethodConfig {
        CustomMethodConfig {
            window_len: 7,
            poly_order: 2,
            lambda: 1e4,
            penalty: 0.01,
            max_iter: 10,
            threshold: 0.5,
        }
    }

    fn drifting_peaks(n: usize, centres: &[usize]) -> Signal {
        let x = (0..n)
            .map(|i| {
                let drift = 0.5 + 0.004 * i as f64;
                let events: f64 = centres
                    .iter()
                    .map(|&c| {
                        let z = (i as f64 - c as f64) / 3.0;
                        3.0 * (-0.5 * z * z).exp()
                    })
                    .sum();
                drift + events
            })
            .collect();
        Signal::from_samples(x, 10.0).unwrap()
    }

    #[test]
    fn test_detects_peaks_above_drifting_baseline() {
        let signal = drifting_peaks(300, &[50, 150, 250]);
        let output = detect(&signal, &params()).unwrap();

        assert_eq!(output.smoothed.len(), 300);
        assert_eq!(output.baseline.len(), 300);
        assert_eq!(output.filtered.len(), 300);

        // Every event is followed by a drop, so none is left unconfirmed
        let times = output.peaks.times();
        assert_eq!(times.len(), 3, "peaks at {:?}", times);
        for (found, expected) in times.iter().zip([5.0, 15.0, 25.0]) {
            assert!((found - expected).abs() <= 0.2, "{} vs {}", found, expected);
        }
    }

    #[test]
    fn test_amplitudes_come_from_filtered_signal() {
        let signal = drifting_peaks(200, &[60, 140]);
        let output = detect(&signal, &params()).unwrap();
        for peak in &output.peaks {
            let index = signal.t.iter().position(|&t| t == peak.time).unwrap();
            assert_eq!(peak.amplitude, output.filtered[index]);
            assert!(peak.amplitude < signal.x[index]);
        }
    }

    #[test]
    fn test_filtered_is_smoothed_minus_baseline() {
        let signal = drifting_peaks(120, &[60]);
        let output = detect(&signal, &params()).unwrap();
        for i in 0..120 {
            assert_eq!(output.filtered[i], output.smoothed[i] - output.baseline[i]);
        }
    }

    #[test]
    fn test_smoother_failure_stops_pipeline() {
        let signal = Signal::from_samples(vec![1.0, 2.0, 1.0], 10.0).unwrap();
        let err = detect(&signal, &params()).unwrap_err();
        assert!(matches!(err, DetectionError::DegenerateInput { .. }));
    }
}
