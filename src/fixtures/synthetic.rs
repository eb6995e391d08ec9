//! Seeded synthetic signals for tests and demos.
//!
//! A synthetic sample is a uniformly sampled trace made of Gaussian events on
//! top of a slow drifting baseline with uniform noise. The generator also
//! returns the matching full-length ground truth (event amplitude at the
//! event's sample, 0 elsewhere) and the event shape as a reference template.
//! The same spec and seed always produce bit-identical output.

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::types::Signal;
use crate::error::{DetectionError, Result};
use crate::fixtures::ReferenceTemplate;

/// Parameters of a synthetic sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSpec {
    /// Sampling rate in Hz
    pub sample_rate: f64,
    /// Signal length in seconds
    pub duration: f64,
    /// Mean spacing between events in seconds
    pub mean_interval: f64,
    /// Gaussian sigma of each event in seconds
    pub event_width: f64,
    /// Event amplitudes are drawn uniformly from this range
    pub amplitude_range: (f64, f64),
    /// Peak-to-peak size of the baseline drift
    pub drift: f64,
    /// Half-width of the uniform noise
    pub noise: f64,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            sample_rate: 10.0,
            duration: 600.0,
            mean_interval: 8.0,
            event_width: 0.5,
            amplitude_range: (0.5, 1.5),
            drift: 2.0,
            noise: 0.02,
            seed: 42,
        }
    }
}

impl SyntheticSpec {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("sample_rate", self.sample_rate),
            ("duration", self.duration),
            ("mean_interval", self.mean_interval),
            ("event_width", self.event_width),
        ];
        for (name, value) in positive {
            if !(value > 0.0) || !value.is_finite() {
                return Err(DetectionError::invalid_parameter(
                    name,
                    format!("must be positive and finite (got {})", value),
                ));
            }
        }
        let (lo, hi) = self.amplitude_range;
        if !(lo > 0.0) || !(hi >= lo) || !hi.is_finite() {
            return Err(DetectionError::invalid_parameter(
                "amplitude_range",
                format!("expected 0 < low <= high (got {}..{})", lo, hi),
            ));
        }
        for (name, value) in [("drift", self.drift), ("noise", self.noise)] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(DetectionError::invalid_parameter(
                    name,
                    format!("must be finite and >= 0 (got {})", value),
                ));
            }
        }
        if self.sample_count() < 2 {
            return Err(DetectionError::degenerate_input(
                "synthetic signal would have fewer than 2 samples",
            ));
        }
        Ok(())
    }

    pub fn sample_count(&self) -> usize {
        (self.duration * self.sample_rate).round() as usize
    }

    /// Same parameters with another seed
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSample {
    pub signal: Signal,
    /// Same length as `signal`; > 0 at each event's sample
    pub ground_truth: Vec<f64>,
    /// Unit-height event shape covering +/- 3 sigma
    pub template: ReferenceTemplate,
    /// Sample index of every event, ascending
    pub event_indices: Vec<usize>,
}

/// Generate a sample from `spec`
pub fn generate(spec: &SyntheticSpec) -> Result<SyntheticSample> {
    spec.validate()?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let n = spec.sample_count();
    let fs = spec.sample_rate;
    let sigma = spec.event_width * fs;

    // Event positions: jittered intervals, kept 3 sigma away from both ends
    let margin = (3.0 * sigma).ceil() as usize + 1;
    let mut events: Vec<(usize, f64)> = Vec::new();
    let mut position = spec.mean_interval * fs * 0.5;
    loop {
        let index = position.round() as usize;
        if index + margin >= n {
            break;
        }
        if index >= margin {
            let (lo, hi) = spec.amplitude_range;
            let amplitude = if hi > lo { rng.gen_range(lo..hi) } else { lo };
            events.push((index, amplitude));
        }
        position += spec.mean_interval * fs * rng.gen_range(0.6..1.4);
    }

    let mut x = vec![0.0; n];
    let mut ground_truth = vec![0.0; n];
    let span = (n - 1) as f64;
    let phase = rng.gen_range(0.0..std::f64::consts::TAU);
    for (i, v) in x.iter_mut().enumerate() {
        let u = i as f64 / span;
        // Quadratic trend plus one slow oscillation
        let trend = 0.5 * spec.drift * (u * u - u);
        let wave = 0.5 * spec.drift * (std::f64::consts::TAU * u + phase).sin();
        *v = trend + wave;
    }

    for &(centre, amplitude) in &events {
        let lo = centre.saturating_sub(margin);
        let hi = (centre + margin).min(n - 1);
        for i in lo..=hi {
            let z = (i as f64 - centre as f64) / sigma;
            x[i] += amplitude * (-0.5 * z * z).exp();
        }
        ground_truth[centre] = amplitude;
    }

    if spec.noise > 0.0 {
        for v in x.iter_mut() {
            *v += rng.gen_range(-spec.noise..spec.noise);
        }
    }

    let signal = Signal::from_samples(x, fs)?;
    let template = event_template(spec.event_width, fs);

    log::debug!(
        "[Fixtures] synthetic seed={} samples={} events={}",
        spec.seed,
        n,
        events.len()
    );

    Ok(SyntheticSample {
        signal,
        ground_truth,
        template,
        event_indices: events.into_iter().map(|(i, _)| i).collect(),
    })
}

/// Unit-height Gaussian sampled at `sample_rate` over +/- 3 sigma
pub fn event_template(event_width: f64, sample_rate: f64) -> ReferenceTemplate {
    let sigma = event_width * sample_rate;
    let half = (3.0 * sigma).ceil().max(1.0) as i64;
    let (time, amplitude) = (-half..=half)
        .map(|k| {
            let z = k as f64 / sigma;
            ((k + half) as f64 / sample_rate, (-0.5 * z * z).exp())
        })
        .unzip();
    ReferenceTemplate { time, amplitude }
}
