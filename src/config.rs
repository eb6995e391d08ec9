//! Configuration management for pipeline parameters
//!
//! Parameters for each detection method and for scoring are loaded from a
//! JSON file so runs can be re-tuned without recompilation. Missing fields
//! fall back to the defaults of the reference benchmark; every block is
//! validated before any computation starts.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::analysis::matched_filter::IndexPolicy;
use crate::error::{DetectionError, Result};

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub custom: CustomMethodConfig,
    pub matched_filter: MatchedFilterConfig,
    pub windowed: WindowedConfig,
    pub scoring: ScoringConfig,
}

/// Smoothing, baseline and hysteresis parameters of the custom method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomMethodConfig {
    /// Savitzky-Golay window length (odd, >= 3)
    pub window_len: usize,
    /// Savitzky-Golay polynomial order (< window_len)
    pub poly_order: usize,
    /// ALS smoothness penalty
    pub lambda: f64,
    /// ALS asymmetry, in (0, 1)
    pub penalty: f64,
    /// ALS iterations; always run in full
    pub max_iter: usize,
    /// Hysteresis threshold on the baseline-corrected signal
    pub threshold: f64,
}

impl Default for CustomMethodConfig {
    fn default() -> Self {
        Self {
            window_len: 151,
            poly_order: 3,
            lambda: 1e8,
            penalty: 0.001,
            max_iter: 50,
            threshold: 0.1,
        }
    }
}

impl CustomMethodConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_len < 3 || self.window_len % 2 == 0 {
            return Err(DetectionError::invalid_parameter(
                "window_len",
                format!("must be odd and at least 3 (got {})", self.window_len),
            ));
        }
        if self.poly_order >= self.window_len {
            return Err(DetectionError::invalid_parameter(
                "poly_order",
                format!(
                    "must be less than window_len (got poly_order={}, window_len={})",
                    self.poly_order, self.window_len
                ),
            ));
        }
        check_positive("lambda", self.lambda)?;
        if !(self.penalty > 0.0 && self.penalty < 1.0) {
            return Err(DetectionError::invalid_parameter(
                "penalty",
                format!("must lie in (0, 1) (got {})", self.penalty),
            ));
        }
        if self.max_iter < 1 {
            return Err(DetectionError::invalid_parameter(
                "max_iter",
                "at least one iteration is required",
            ));
        }
        check_non_negative("threshold", self.threshold)
    }
}

/// Band-pass and template-matching parameters of the matched-filter method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchedFilterConfig {
    /// Sampling frequency in Hz
    pub sample_rate: f64,
    /// Butterworth prototype order
    pub filter_order: usize,
    /// Pass-band lower edge in Hz
    pub low_cut: f64,
    /// Pass-band upper edge in Hz
    pub high_cut: f64,
    /// Peak height threshold as a fraction of the convolution maximum
    pub threshold_fraction: f64,
    /// What to do with peaks whose aligned index leaves the signal
    pub index_policy: IndexPolicy,
}

impl Default for MatchedFilterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 10.0,
            filter_order: 1,
            low_cut: 0.01,
            high_cut: 0.1,
            threshold_fraction: 0.01,
            index_policy: IndexPolicy::default(),
        }
    }
}

impl MatchedFilterConfig {
    pub fn validate(&self) -> Result<()> {
        check_positive("sample_rate", self.sample_rate)?;
        if self.filter_order < 1 {
            return Err(DetectionError::invalid_parameter(
                "filter_order",
                "must be at least 1",
            ));
        }
        let nyquist = self.sample_rate / 2.0;
        if !(self.low_cut > 0.0 && self.low_cut < self.high_cut && self.high_cut < nyquist) {
            return Err(DetectionError::invalid_parameter(
                "cutoff",
                format!(
                    "need 0 < low_cut < high_cut < {} (got low_cut={}, high_cut={})",
                    nyquist, self.low_cut, self.high_cut
                ),
            ));
        }
        check_non_negative("threshold_fraction", self.threshold_fraction)
    }
}

/// Per-window thresholds of the adaptive windowed method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowedConfig {
    /// Sampling frequency in Hz
    pub sample_rate: f64,
    /// Window length in seconds
    pub window_duration: f64,
    /// Minimum height as a fraction of the window maximum
    pub height_factor: f64,
    /// Minimum prominence as a fraction of the window maximum
    pub prominence_factor: f64,
}

impl Default for WindowedConfig {
    fn default() -> Self {
        Self {
            sample_rate: 10.0,
            window_duration: 500.0,
            height_factor: 0.25,
            prominence_factor: 0.15,
        }
    }
}

impl WindowedConfig {
    pub fn validate(&self) -> Result<()> {
        check_positive("sample_rate", self.sample_rate)?;
        check_positive("window_duration", self.window_duration)?;
        check_finite("height_factor", self.height_factor)?;
        check_finite("prominence_factor", self.prominence_factor)?;
        self.window_samples().map(|_| ())
    }

    /// Window length in samples
    ///
    /// Products within 1e-9 of an integer are rounded, anything else is
    /// floored.
    pub fn window_samples(&self) -> Result<usize> {
        let exact = self.sample_rate * self.window_duration;
        let rounded = exact.round();
        let samples = if (exact - rounded).abs() < 1e-9 {
            rounded
        } else {
            exact.floor()
        };
        if !(samples >= 1.0) || !samples.is_finite() {
            return Err(DetectionError::invalid_parameter(
                "window_duration",
                format!(
                    "window must span at least one sample (sample_rate={}, window_duration={})",
                    self.sample_rate, self.window_duration
                ),
            ));
        }
        Ok(samples as usize)
    }
}

/// Matching tolerance used by the scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Maximum |t_gt - t_det| in seconds for a match
    pub tolerance: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { tolerance: 0.5 }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        check_non_negative("tolerance", self.tolerance)
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    ///
    /// Falls back to `AppConfig::default()` (with a warning) if the file is
    /// missing or is not valid JSON.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load_from_file(&path) {
            Ok(config) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!("[Config] {:#}. Using defaults.", err);
                Self::default()
            }
        }
    }

    /// Load configuration from a JSON file, failing on any read or parse error
    pub fn try_load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from {:?}", path))
    }

    /// Validate every parameter block
    pub fn validate(&self) -> Result<()> {
        self.custom.validate()?;
        self.matched_filter.validate()?;
        self.windowed.validate()?;
        self.scoring.validate()
    }
}

fn check_finite(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(DetectionError::invalid_parameter(
            name,
            format!("must be finite (got {})", value),
        ));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    check_finite(name, value)?;
    if value <= 0.0 {
        return Err(DetectionError::invalid_parameter(
            name,
            format!("must be positive (got {})", value),
        ));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<()> {
    check_finite(name, value)?;
    if value < 0.0 {
        return Err(DetectionError::invalid_parameter(
            name,
            format!("must be >= 0 (got {})", value),
        ));
    }
    Ok(())
}
