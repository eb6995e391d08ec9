// Core data model shared by every pipeline
//
// A Signal is a pair of parallel sequences (time, amplitude). Peaks are
// (time, amplitude) pairs kept in time order. All values are transient:
// built per invocation and handed back to the caller.

use serde::{Deserialize, Serialize};

use crate::error::{DetectionError, Result};

/// Uniformly (or near-uniformly) sampled time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub t: Vec<f64>,
    pub x: Vec<f64>,
}

impl Signal {
    /// Build a signal, checking that both columns agree in length, the
    /// signal is non-empty and time is finite and strictly increasing.
    pub fn new(t: Vec<f64>, x: Vec<f64>) -> Result<Self> {
        if t.len() != x.len() {
            return Err(DetectionError::invalid_parameter(
                "signal",
                format!(
                    "time and amplitude lengths differ ({} vs {})",
                    t.len(),
                    x.len()
                ),
            ));
        }
        if t.is_empty() {
            return Err(DetectionError::invalid_parameter("signal", "signal has no samples"));
        }
        if let Some(i) = t.iter().position(|v| !v.is_finite()) {
            return Err(DetectionError::invalid_parameter(
                "signal",
                format!("time must be finite (t[{}]={})", i, t[i]),
            ));
        }
        if let Some(i) = t.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(DetectionError::invalid_parameter(
                "signal",
                format!(
                    "time must be strictly increasing (t[{}]={} >= t[{}]={})",
                    i,
                    t[i],
                    i + 1,
                    t[i + 1]
                ),
            ));
        }
        Ok(Self { t, x })
    }

    /// Build a signal sampled at `sample_rate` Hz starting at t = 0
    pub fn from_samples(x: Vec<f64>, sample_rate: f64) -> Result<Self> {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(DetectionError::invalid_parameter(
                "sample_rate",
                format!("must be positive and finite (got {})", sample_rate),
            ));
        }
        let t = (0..x.len()).map(|i| i as f64 / sample_rate).collect();
        Self::new(t, x)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Same time axis, new amplitudes
    pub fn with_amplitudes(&self, x: Vec<f64>) -> Self {
        debug_assert_eq!(x.len(), self.t.len());
        Self {
            t: self.t.clone(),
            x,
        }
    }

    /// Peaks marked by strictly positive samples (ground-truth encoding)
    pub fn positive_samples(&self) -> PeakSet {
        self.t
            .iter()
            .zip(self.x.iter())
            .filter(|(_, &v)| v > 0.0)
            .map(|(&time, &amplitude)| Peak { time, amplitude })
            .collect()
    }
}

/// A detected or annotated event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub time: f64,
    pub amplitude: f64,
}

/// Time-ordered sequence of peaks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeakSet {
    peaks: Vec<Peak>,
}

impl PeakSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parallel time/amplitude columns
    pub fn from_columns(times: &[f64], amplitudes: &[f64]) -> Result<Self> {
        if times.len() != amplitudes.len() {
            return Err(DetectionError::invalid_parameter(
                "peaks",
                format!(
                    "time and amplitude lengths differ ({} vs {})",
                    times.len(),
                    amplitudes.len()
                ),
            ));
        }
        Ok(times
            .iter()
            .zip(amplitudes)
            .map(|(&time, &amplitude)| Peak { time, amplitude })
            .collect())
    }

    pub fn push(&mut self, peak: Peak) {
        self.peaks.push(peak);
    }

    pub fn extend(&mut self, other: PeakSet) {
        self.peaks.extend(other.peaks);
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Peak> {
        self.peaks.iter()
    }

    pub fn as_slice(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn times(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.time).collect()
    }

    pub fn amplitudes(&self) -> Vec<f64> {
        self.peaks.iter().map(|p| p.amplitude).collect()
    }
}

impl FromIterator<Peak> for PeakSet {
    fn from_iter<I: IntoIterator<Item = Peak>>(iter: I) -> Self {
        Self {
            peaks: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for PeakSet {
    type Item = Peak;
    type IntoIter = std::vec::IntoIter<Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.into_iter()
    }
}

impl<'a> IntoIterator for &'a PeakSet {
    type Item = &'a Peak;
    type IntoIter = std::slice::Iter<'a, Peak>;

    fn into_iter(self) -> Self::IntoIter {
        self.peaks.iter()
    }
}

/// Confirmed maxima and minima from the hysteresis detector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extrema {
    pub maxima: PeakSet,
    pub minima: PeakSet,
}
