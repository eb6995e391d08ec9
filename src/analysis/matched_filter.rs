// Matched-filter pipeline
//
// 1. Zero-phase Butterworth band-pass
// 2. Rectify (negative samples set to zero)
// 3. Full convolution with the reference template
// 4. Local maxima of the convolution with height >= fraction * max
// 5. Shift every convolution index back by ceil(len(template) / 2) and read
//    time and amplitude from the rectified filtered signal
//
// The shift can move early or late peaks outside the signal. `IndexPolicy`
// decides whether those are dropped or pinned to the nearest edge sample.

use serde::{Deserialize, Serialize};

use crate::analysis::butterworth::butter_bandpass;
use crate::analysis::convolution::convolve_full;
use crate::analysis::peaks::{find_peaks, PeakParams};
use crate::analysis::types::{Peak, PeakSet, Signal};
use crate::config::MatchedFilterConfig;
use crate::error::{DetectionError, Result};

/// Handling of aligned indices that fall outside `[0, len(signal))`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexPolicy {
    /// Discard the peak
    #[default]
    Drop,
    /// Move the peak to the first or last sample
    Clamp,
}

/// Intermediate signals and detections of the matched-filter pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedFilterOutput {
    /// Band-passed and rectified signal
    pub filtered: Vec<f64>,
    /// Full convolution of `filtered` with the template
    pub convolved: Vec<f64>,
    pub peaks: PeakSet,
    /// Peaks whose aligned index left the signal
    pub out_of_range: usize,
}

/// Convolution peaks mapped back onto the signal's sample grid
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMatch {
    pub convolved: Vec<f64>,
    pub indices: Vec<usize>,
    pub out_of_range: usize,
}

/// Offset between a convolution index and the matching signal index
pub fn alignment_shift(template_len: usize) -> usize {
    template_len.div_ceil(2)
}

/// Convolve a rectified signal with `template` and locate template matches
///
/// # Errors
/// `InvalidParameter` when the signal or template is empty or when
/// `threshold_fraction` is negative or not finite.
pub fn match_template(
    rectified: &[f64],
    template: &[f64],
    threshold_fraction: f64,
    policy: IndexPolicy,
) -> Result<TemplateMatch> {
    if !(threshold_fraction >= 0.0) || !threshold_fraction.is_finite() {
        return Err(DetectionError::invalid_parameter(
            "threshold_fraction",
            format!("must be a finite value >= 0 (got {})", threshold_fraction),
        ));
    }

    let convolved = convolve_full(rectified, template)?;
    let max = convolved.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let conv_peaks = find_peaks(&convolved, &PeakParams::with_height(max * threshold_fraction))?;

    let n = rectified.len() as i64;
    let shift = alignment_shift(template.len()) as i64;
    let mut indices = Vec::with_capacity(conv_peaks.len());
    let mut out_of_range = 0;

    for peak in conv_peaks {
        let aligned = peak as i64 - shift;
        if (0..n).contains(&aligned) {
            indices.push(aligned as usize);
            continue;
        }
        out_of_range += 1;
        if policy == IndexPolicy::Clamp {
            indices.push(aligned.clamp(0, n - 1) as usize);
        }
    }

    Ok(TemplateMatch {
        convolved,
        indices,
        out_of_range,
    })
}

/// Run the matched-filter pipeline on `signal`
pub fn detect(
    signal: &Signal,
    template: &[f64],
    params: &MatchedFilterConfig,
) -> Result<MatchedFilterOutput> {
    params.validate()?;

    let bandpass = butter_bandpass(
        params.filter_order,
        params.low_cut,
        params.high_cut,
        params.sample_rate,
    )?;
    let mut filtered = bandpass.filtfilt(&signal.x)?;
    for v in filtered.iter_mut() {
        if *v < 0.0 {
            *v = 0.0;
        }
    }

    let matched = match_template(
        &filtered,
        template,
        params.threshold_fraction,
        params.index_policy,
    )?;

    if matched.out_of_range > 0 {
        log::debug!(
            "[MatchedFilter] {} peak(s) aligned outside the signal, policy={:?}",
            matched.out_of_range,
            params.index_policy
        );
    }

    let peaks: PeakSet = matched
        .indices
        .iter()
        .map(|&i| Peak {
            time: signal.t[i],
            amplitude: filtered[i],
        })
        .collect();

    log::debug!(
        "[MatchedFilter] samples={} template_len={} peaks={}",
        signal.len(),
        template.len(),
        peaks.len()
    );

    Ok(MatchedFilterOutput {
        filtered,
        convolved: matched.convolved,
        peaks,
        out_of_range: matched.out_of_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian_template(len: usize, sigma: f64) -> Vec<f64> {
        let centre = (len - 1) as f64 / 2.0;
        (0..len)
            .map(|i| {
                let z = (i as f64 - centre) / sigma;
                (-0.5 * z * z).exp()
            })
            .collect()
    }

    #[test]
    fn test_alignment_shift_is_ceiling_of_half() {
        assert_eq!(alignment_shift(1), 1);
        assert_eq!(alignment_shift(4), 2);
        assert_eq!(alignment_shift(5), 3);
    }

    #[test]
    fn test_impulse_train_reproduces_template_at_aligned_offsets() {
        let template = gaussian_template(9, 1.5);
        let mut impulses = vec![0.0; 100];
        for &i in &[20usize, 45, 70] {
            impulses[i] = 1.0;
        }

        let matched = match_template(&impulses, &template, 0.5, IndexPolicy::Drop).unwrap();

        // Each impulse leaves an exact copy of the template in the output
        for &i in &[20usize, 45, 70] {
            assert_eq!(&matched.convolved[i..i + template.len()], template.as_slice());
        }
        // Template maximum sits at offset 4; aligned index = i + 4 - 5
        assert_eq!(matched.indices, vec![19, 44, 69]);
        assert_eq!(matched.out_of_range, 0);
    }

    #[test]
    fn test_out_of_range_peaks_follow_policy() {
        let template = [1.0, 2.0, 3.0, 2.0, 1.0];
        let mut rectified = vec![0.0; 8];
        rectified[0] = 1.0;
        rectified[6] = 1.0;

        // Convolution peaks at 2 and 8; shift 3 puts the first at -1
        let dropped = match_template(&rectified, &template, 0.5, IndexPolicy::Drop).unwrap();
        assert_eq!(dropped.indices, vec![5]);
        assert_eq!(dropped.out_of_range, 1);

        let clamped = match_template(&rectified, &template, 0.5, IndexPolicy::Clamp).unwrap();
        assert_eq!(clamped.indices, vec![0, 5]);
        assert_eq!(clamped.out_of_range, 1);
    }

    #[test]
    fn test_threshold_fraction_filters_small_matches() {
        let template = [1.0, 1.0, 1.0];
        let mut rectified = vec![0.0; 30];
        rectified[5] = 1.0;
        rectified[20] = 0.2;

        let strict = match_template(&rectified, &template, 0.5, IndexPolicy::Drop).unwrap();
        assert_eq!(strict.indices.len(), 1);
        let loose = match_template(&rectified, &template, 0.1, IndexPolicy::Drop).unwrap();
        assert_eq!(loose.indices.len(), 2);
    }

    #[test]
    fn test_detects_events_through_bandpass() {
        let fs = 10.0;
        let n = 500;
        let events = [50usize, 100, 150, 200, 250, 300, 350, 400, 450];
        let x: Vec<f64> = (0..n)
            .map(|i| {
                let events: f64 = events
                    .iter()
                    .map(|&c| {
                        let z = (i as f64 - c as f64) / 2.0;
                        (-0.5 * z * z).exp()
                    })
                    .sum();
                1.0 + 0.001 * i as f64 + events
            })
            .collect();
        let signal = Signal::from_samples(x, fs).unwrap();

        let params = MatchedFilterConfig {
            sample_rate: fs,
            filter_order: 2,
            low_cut: 0.2,
            high_cut: 2.0,
            threshold_fraction: 0.3,
            index_policy: IndexPolicy::Drop,
        };
        let template = gaussian_template(11, 2.0);
        let output = detect(&signal, &template, &params).unwrap();

        assert_eq!(output.filtered.len(), n);
        assert_eq!(output.convolved.len(), n + template.len() - 1);
        assert!(output.filtered.iter().all(|&v| v >= 0.0));

        let times = output.peaks.times();
        assert_eq!(times.len(), events.len(), "peaks at {:?}", times);
        for (found, &event) in times.iter().zip(&events) {
            let expected = event as f64 / fs;
            assert!((found - expected).abs() <= 0.25, "{} vs {}", found, expected);
        }
        for peak in &output.peaks {
            let i = (peak.time * fs).round() as usize;
            assert_eq!(peak.amplitude, output.filtered[i]);
        }
    }

    #[test]
    fn test_rejects_invalid_band() {
        let signal = Signal::from_samples(vec![0.0; 100], 10.0).unwrap();
        let params = MatchedFilterConfig {
            low_cut: 2.0,
            high_cut: 1.0,
            ..MatchedFilterConfig::default()
        };
        let err = detect(&signal, &[1.0], &params).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidParameter { .. }));
    }
}
