// Hysteresis peak/valley detector
//
// Two-state machine (SeekingMax / SeekingMin) that confirms an extremum only
// once the signal has moved more than `threshold` away from it. Running max
// and min trackers are updated on every sample; a confirmed maximum resets
// the min tracker to the current sample and vice versa, so maxima and minima
// strictly alternate.
//
// A trailing candidate that is never confirmed before the signal ends is
// dropped. Existing result sets were produced with this behaviour, so it is
// kept as-is.
//
// References:
// - Billauer, E. peakdet: Peak detection using MATLAB (2009)

use crate::analysis::types::{Extrema, Peak};
use crate::error::{DetectionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeekState {
    SeekingMax,
    SeekingMin,
}

/// Stateful detector; one instance processes one signal
#[derive(Debug)]
struct HysteresisDetector {
    threshold: f64,
    state: SeekState,
    max_value: f64,
    max_time: f64,
    min_value: f64,
    min_time: f64,
    extrema: Extrema,
}

impl HysteresisDetector {
    fn new(threshold: f64) -> Self {
        Self {
            threshold,
            state: SeekState::SeekingMax,
            max_value: f64::NEG_INFINITY,
            max_time: f64::NAN,
            min_value: f64::INFINITY,
            min_time: f64::NAN,
            extrema: Extrema::default(),
        }
    }

    fn push(&mut self, time: f64, value: f64) {
        if value > self.max_value {
            self.max_value = value;
            self.max_time = time;
        }
        if value < self.min_value {
            self.min_value = value;
            self.min_time = time;
        }

        match self.state {
            SeekState::SeekingMax => {
                if value < self.max_value - self.threshold {
                    self.extrema.maxima.push(Peak {
                        time: self.max_time,
                        amplitude: self.max_value,
                    });
                    self.min_value = value;
                    self.min_time = time;
                    self.state = SeekState::SeekingMin;
                }
            }
            SeekState::SeekingMin => {
                if value > self.min_value + self.threshold {
                    self.extrema.minima.push(Peak {
                        time: self.min_time,
                        amplitude: self.min_value,
                    });
                    self.max_value = value;
                    self.max_time = time;
                    self.state = SeekState::SeekingMax;
                }
            }
        }
    }

    fn finish(self) -> Extrema {
        self.extrema
    }
}

/// Find alternating maxima and minima separated by more than `threshold`
///
/// # Errors
/// `InvalidParameter` when `threshold` is negative or not finite, or when
/// `t` and `signal` differ in length.
pub fn find_extrema(t: &[f64], signal: &[f64], threshold: f64) -> Result<Extrema> {
    if !(threshold >= 0.0) || !threshold.is_finite() {
        return Err(DetectionError::invalid_parameter(
            "threshold",
            format!("must be a finite value >= 0 (got {})", threshold),
        ));
    }
    if t.len() != signal.len() {
        return Err(DetectionError::invalid_parameter(
            "signal",
            format!(
                "time and amplitude lengths differ ({} vs {})",
                t.len(),
                signal.len()
            ),
        ));
    }

    let mut detector = HysteresisDetector::new(threshold);
    for (&time, &value) in t.iter().zip(signal) {
        detector.push(time, value);
    }
    Ok(detector.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_axis(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn test_alternating_square_wave_confirms_both_maxima() {
        let signal = [0.0, 10.0, 0.0, 10.0, 0.0];
        let extrema = find_extrema(&index_axis(5), &signal, 5.0).unwrap();

        // Two maxima, not one: the drop at index 4 confirms the second
        // maximum. max@1 confirmed at 2, min@2 confirmed at 3, max@3
        // confirmed at 4; only the final minimum at 4 stays unconfirmed.
        assert_eq!(extrema.maxima.times(), vec![1.0, 3.0]);
        assert_eq!(extrema.maxima.amplitudes(), vec![10.0, 10.0]);
        assert_eq!(extrema.minima.times(), vec![2.0]);
        assert_eq!(extrema.maxima.as_slice()[0].time, 1.0);
    }

    #[test]
    fn test_maxima_and_minima_alternate() {
        let t = index_axis(200);
        let signal: Vec<f64> = t.iter().map(|&x| (x * 0.2).sin() * (1.0 + 0.3 * (x * 0.05).cos())).collect();
        let extrema = find_extrema(&t, &signal, 0.3).unwrap();

        let max_times = extrema.maxima.times();
        let min_times = extrema.minima.times();
        assert!(!max_times.is_empty());
        // Starting in SeekingMax means every minimum sits between two maxima
        assert!(max_times.len() == min_times.len() || max_times.len() == min_times.len() + 1);
        for (i, &min_t) in min_times.iter().enumerate() {
            assert!(max_times[i] < min_t);
            if let Some(&next_max) = max_times.get(i + 1) {
                assert!(min_t < next_max);
            }
        }
    }

    #[test]
    fn test_small_wiggles_below_threshold_are_ignored() {
        let signal = [0.0, 1.0, 0.8, 1.0, 0.9, 5.0, 0.0];
        let extrema = find_extrema(&index_axis(7), &signal, 2.0).unwrap();
        assert_eq!(extrema.maxima.times(), vec![5.0]);
        assert!(extrema.minima.is_empty());
    }

    #[test]
    fn test_monotonic_signal_has_no_confirmed_extrema() {
        let signal: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let extrema = find_extrema(&index_axis(10), &signal, 0.5).unwrap();
        assert!(extrema.maxima.is_empty());
        assert!(extrema.minima.is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        // Drop of exactly the threshold does not confirm the maximum
        let signal = [0.0, 4.0, 2.0];
        let extrema = find_extrema(&index_axis(3), &signal, 2.0).unwrap();
        assert!(extrema.maxima.is_empty());
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let err = find_extrema(&[0.0], &[1.0], -1.0).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidParameter { .. }));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = find_extrema(&[0.0, 1.0], &[1.0], 1.0).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidParameter { .. }));
    }
}
