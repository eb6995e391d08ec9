// Analysis module - peak detection pipelines and scoring
//
// Three independent detectors share the same data model but take different
// parameters and inputs:
//
// - Custom: Savitzky-Golay -> ALS baseline -> subtraction -> hysteresis
// - MatchedFilter: band-pass -> rectify -> template convolution -> peaks
// - Windowed: ground-truth-guided per-window peak search
//
// `DetectionMethod` names a detector, `run` dispatches to it, and
// `PipelineOutput` carries the method-specific intermediates together with
// the detected peaks. Scoring against ground truth lives in `scoring`.

pub mod baseline;
pub mod butterworth;
pub mod convolution;
pub mod custom;
pub mod hysteresis;
pub mod linalg;
pub mod matched_filter;
pub mod peaks;
pub mod scoring;
pub mod smoothing;
pub mod types;
pub mod windowed;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::error::{DetectionError, Result};

pub use custom::CustomOutput;
pub use matched_filter::{IndexPolicy, MatchedFilterOutput};
pub use scoring::{score, MatchSummary, MetricsRecord, ScoreCard};
pub use types::{Extrema, Peak, PeakSet, Signal};
pub use windowed::WindowedOutput;

/// The detection pipelines under comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    Custom,
    MatchedFilter,
    Windowed,
}

impl DetectionMethod {
    pub const ALL: [DetectionMethod; 3] = [
        DetectionMethod::Custom,
        DetectionMethod::MatchedFilter,
        DetectionMethod::Windowed,
    ];

    /// Identifier used on the command line and in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Custom => "custom",
            DetectionMethod::MatchedFilter => "matched-filter",
            DetectionMethod::Windowed => "windowed",
        }
    }

    /// Name used in result file and directory names
    pub fn result_tag(&self) -> &'static str {
        match self {
            DetectionMethod::Custom => "custom",
            DetectionMethod::MatchedFilter => "hybrid",
            DetectionMethod::Windowed => "scipy",
        }
    }

    /// Whether the method reads the ground truth while detecting
    pub fn needs_ground_truth(&self) -> bool {
        matches!(self, DetectionMethod::Windowed)
    }

    pub fn needs_template(&self) -> bool {
        matches!(self, DetectionMethod::MatchedFilter)
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMethod {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "custom" => Ok(DetectionMethod::Custom),
            "matched-filter" | "matched_filter" | "hybrid" => Ok(DetectionMethod::MatchedFilter),
            "windowed" | "scipy" => Ok(DetectionMethod::Windowed),
            other => Err(DetectionError::invalid_parameter(
                "method",
                format!(
                    "unknown method '{}' (expected custom, matched-filter or windowed)",
                    other
                ),
            )),
        }
    }
}

/// Everything a pipeline may read; unused fields are ignored
#[derive(Debug, Clone, Copy)]
pub struct PipelineInputs<'a> {
    pub signal: &'a Signal,
    /// Full-length ground-truth signal (samples > 0 mark peaks)
    pub ground_truth: Option<&'a [f64]>,
    /// Matched-filter reference template
    pub template: Option<&'a [f64]>,
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum PipelineOutput {
    Custom(CustomOutput),
    MatchedFilter(MatchedFilterOutput),
    Windowed(WindowedOutput),
}

impl PipelineOutput {
    pub fn method(&self) -> DetectionMethod {
        match self {
            PipelineOutput::Custom(_) => DetectionMethod::Custom,
            PipelineOutput::MatchedFilter(_) => DetectionMethod::MatchedFilter,
            PipelineOutput::Windowed(_) => DetectionMethod::Windowed,
        }
    }

    pub fn peaks(&self) -> &PeakSet {
        match self {
            PipelineOutput::Custom(out) => &out.peaks,
            PipelineOutput::MatchedFilter(out) => &out.peaks,
            PipelineOutput::Windowed(out) => &out.peaks,
        }
    }
}

/// Run `method` on `inputs` with the matching parameter block of `config`
///
/// # Errors
/// `InvalidParameter` when an input the method needs is missing, otherwise
/// whatever the selected pipeline raises.
pub fn run(
    method: DetectionMethod,
    inputs: PipelineInputs<'_>,
    config: &AppConfig,
) -> Result<PipelineOutput> {
    match method {
        DetectionMethod::Custom => {
            custom::detect(inputs.signal, &config.custom).map(PipelineOutput::Custom)
        }
        DetectionMethod::MatchedFilter => {
            let template = inputs.template.ok_or_else(|| {
                DetectionError::invalid_parameter(
                    "template",
                    "the matched-filter method needs a reference template",
                )
            })?;
            matched_filter::detect(inputs.signal, template, &config.matched_filter)
                .map(PipelineOutput::MatchedFilter)
        }
        DetectionMethod::Windowed => {
            let ground_truth = inputs.ground_truth.ok_or_else(|| {
                DetectionError::invalid_parameter(
                    "ground_truth",
                    "the windowed method needs the ground-truth signal",
                )
            })?;
            windowed::detect(inputs.signal, ground_truth, &config.windowed)
                .map(PipelineOutput::Windowed)
        }
    }
}
