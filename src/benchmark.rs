// Benchmark driver - runs every detection method over a sample catalog
//
// For each sample the driver runs the custom, matched-filter and windowed
// pipelines, scores them against the sample's ground truth and writes
// peaks, intermediate signals and metrics under an `OutputLayout`.
// Samples are processed in parallel; the report keeps catalog order.
//
// A failing sample or method is logged and recorded in the report. The
// remaining samples and methods still run.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::{self, DetectionMethod, MetricsRecord, PipelineInputs, PipelineOutput};
use crate::config::AppConfig;
use crate::error::log_detection_error;
use crate::fixtures::{self, ReferenceTemplate, SampleCatalog, SampleData, SampleMetadata};

/// Intermediate signals persisted next to the peaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intermediate {
    CustomSmoothed,
    CustomBaseline,
    CustomFiltered,
    MatchedFilterFiltered,
    MatchedFilterConvolved,
}

impl Intermediate {
    pub const ALL: [Intermediate; 5] = [
        Intermediate::CustomSmoothed,
        Intermediate::CustomBaseline,
        Intermediate::CustomFiltered,
        Intermediate::MatchedFilterFiltered,
        Intermediate::MatchedFilterConvolved,
    ];

    fn relative_dir(&self) -> &'static str {
        match self {
            Intermediate::CustomSmoothed => "signals/custom_method/smoothed",
            Intermediate::CustomBaseline => "signals/custom_method/baseline",
            Intermediate::CustomFiltered => "signals/custom_method/filtered",
            Intermediate::MatchedFilterFiltered => "signals/hybrid_method/filtered",
            Intermediate::MatchedFilterConvolved => "signals/hybrid_method/convolved",
        }
    }
}

/// Directory layout of benchmark results
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn intermediate_path(&self, kind: Intermediate, name: &str) -> PathBuf {
        self.root.join(kind.relative_dir()).join(file_name(name))
    }

    pub fn peaks_path(&self, method: DetectionMethod, name: &str) -> PathBuf {
        self.peaks_dir(method).join(file_name(name))
    }

    pub fn metrics_path(&self, method: DetectionMethod, name: &str) -> PathBuf {
        self.metrics_dir(method).join(file_name(name))
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join("report.json")
    }

    fn peaks_dir(&self, method: DetectionMethod) -> PathBuf {
        self.root
            .join("peaks")
            .join(format!("{}_peaks", method.result_tag()))
    }

    fn metrics_dir(&self, method: DetectionMethod) -> PathBuf {
        self.root
            .join("metrics")
            .join(format!("{}_metrics", method.result_tag()))
    }

    /// Create every result directory
    pub fn prepare(&self) -> Result<()> {
        let dirs = Intermediate::ALL
            .iter()
            .map(|kind| self.root.join(kind.relative_dir()))
            .chain(DetectionMethod::ALL.iter().map(|&m| self.peaks_dir(m)))
            .chain(DetectionMethod::ALL.iter().map(|&m| self.metrics_dir(m)));
        for dir in dirs {
            fs::create_dir_all(&dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        Ok(())
    }
}

fn file_name(name: &str) -> String {
    format!("{}.{}", name, fixtures::DATA_EXTENSION)
}

/// Outcome of one method on one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodResult {
    pub method: DetectionMethod,
    pub detected: usize,
    pub true_positives: usize,
    pub false_negatives: usize,
    pub false_positives: usize,
    /// Absent when the method failed
    pub metrics: Option<MetricsRecord>,
    pub error: Option<String>,
}

impl MethodResult {
    fn failed(method: DetectionMethod, error: String) -> Self {
        Self {
            method,
            detected: 0,
            true_positives: 0,
            false_negatives: 0,
            false_positives: 0,
            metrics: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleReport {
    pub name: String,
    pub samples: usize,
    pub ground_truth_peaks: usize,
    pub methods: Vec<MethodResult>,
    /// Set when the sample could not be loaded or its results written
    pub error: Option<String>,
}

/// Per-method means over the samples where the method succeeded
///
/// Each mean only includes finite values, so a sample without matches does
/// not turn the time or amplitude mean into NaN. NaN serialises as `null`,
/// so reports are written for reading, not loaded back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSummary {
    pub method: DetectionMethod,
    pub succeeded: usize,
    pub failed: usize,
    pub mean: MetricsRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub samples: Vec<SampleReport>,
    pub summary: Vec<MethodSummary>,
}

impl BenchmarkReport {
    fn from_samples(samples: Vec<SampleReport>) -> Self {
        let summary = DetectionMethod::ALL
            .iter()
            .map(|&method| summarise(method, &samples))
            .collect();
        Self { samples, summary }
    }

    pub fn method_summary(&self, method: DetectionMethod) -> Option<&MethodSummary> {
        self.summary.iter().find(|s| s.method == method)
    }

    /// Number of failed samples plus failed sample/method runs
    pub fn failure_count(&self) -> usize {
        self.samples
            .iter()
            .map(|s| {
                usize::from(s.error.is_some())
                    + s.methods.iter().filter(|m| m.error.is_some()).count()
            })
            .sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?).with_context(|| format!("writing {}", path.display()))
    }
}

fn summarise(method: DetectionMethod, samples: &[SampleReport]) -> MethodSummary {
    let results: Vec<&MethodResult> = samples
        .iter()
        .flat_map(|s| s.methods.iter())
        .filter(|m| m.method == method)
        .collect();
    let rows: Vec<[f64; 4]> = results
        .iter()
        .filter_map(|m| m.metrics.map(|r| r.as_row()))
        .collect();

    let mut mean = [f64::NAN; 4];
    for (column, slot) in mean.iter_mut().enumerate() {
        *slot = finite_mean(rows.iter().map(|row| row[column]));
    }

    MethodSummary {
        method,
        succeeded: rows.len(),
        failed: results.len() - rows.len(),
        mean: MetricsRecord::from_row(mean),
    }
}

/// Mean of the finite values, NaN when there are none
pub fn finite_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count > 0 {
        sum / count as f64
    } else {
        f64::NAN
    }
}

/// Runs every method over a catalog and persists the results
pub struct Benchmark<'a> {
    config: &'a AppConfig,
    template: &'a ReferenceTemplate,
    layout: &'a OutputLayout,
}

impl<'a> Benchmark<'a> {
    pub fn new(config: &'a AppConfig, template: &'a ReferenceTemplate, layout: &'a OutputLayout) -> Self {
        Self {
            config,
            template,
            layout,
        }
    }

    /// Process every sample of `catalog` and write `report.json`
    ///
    /// # Errors
    /// Fails on invalid configuration or template, when the catalog cannot
    /// be listed, or when the output directories or report cannot be
    /// written. Per-sample failures are recorded in the report instead.
    pub fn run(
        catalog: &SampleCatalog,
        template: &ReferenceTemplate,
        config: &AppConfig,
        layout: &OutputLayout,
    ) -> Result<BenchmarkReport> {
        config.validate().context("invalid configuration")?;
        template.validate()?;
        layout.prepare()?;

        let samples = catalog.discover()?;
        tracing::info!(
            "[Benchmark] Processing {} sample(s) from {} into {}",
            samples.len(),
            catalog.root().display(),
            layout.root().display()
        );

        let bench = Benchmark::new(config, template, layout);
        let reports: Vec<SampleReport> = samples
            .par_iter()
            .map(|metadata| bench.process(catalog, metadata))
            .collect();

        let report = BenchmarkReport::from_samples(reports);
        report.save(&layout.report_path())?;

        tracing::info!(
            "[Benchmark] Finished: {} sample(s), {} failure(s)",
            report.samples.len(),
            report.failure_count()
        );
        Ok(report)
    }

    fn process(&self, catalog: &SampleCatalog, metadata: &SampleMetadata) -> SampleReport {
        let sample = match catalog.load(metadata) {
            Ok(sample) => sample,
            Err(err) => {
                log::error!("[Benchmark] Failed to load '{}': {:#}", metadata.name, err);
                return SampleReport {
                    name: metadata.name.clone(),
                    samples: 0,
                    ground_truth_peaks: 0,
                    methods: Vec::new(),
                    error: Some(format!("{:#}", err)),
                };
            }
        };

        let ground_truth_peaks = sample.ground_truth_peaks();
        let mut report = SampleReport {
            name: metadata.name.clone(),
            samples: sample.signal.len(),
            ground_truth_peaks: ground_truth_peaks.len(),
            methods: Vec::with_capacity(DetectionMethod::ALL.len()),
            error: None,
        };

        for method in DetectionMethod::ALL {
            match self.run_method(method, &sample, &ground_truth_peaks) {
                Ok(result) => report.methods.push(result),
                Err(err) => {
                    log::error!(
                        "[Benchmark] Failed to write {} results for '{}': {:#}",
                        method,
                        metadata.name,
                        err
                    );
                    report.methods.push(MethodResult::failed(method, format!("{:#}", err)));
                }
            }
        }

        tracing::debug!(
            "[Benchmark] {} done ({} samples, {} ground-truth peaks)",
            report.name,
            report.samples,
            report.ground_truth_peaks
        );
        report
    }

    /// Detection failures are recorded in the result; write failures are errors
    fn run_method(
        &self,
        method: DetectionMethod,
        sample: &SampleData,
        ground_truth_peaks: &analysis::PeakSet,
    ) -> Result<MethodResult> {
        let name = sample.metadata.name.as_str();
        let inputs = PipelineInputs {
            signal: &sample.signal,
            ground_truth: Some(sample.ground_truth.as_slice()),
            template: Some(self.template.amplitude.as_slice()),
        };

        let output = match analysis::run(method, inputs, self.config) {
            Ok(output) => output,
            Err(err) => {
                log_detection_error(&err, &format!("{} on '{}'", method, name));
                return Ok(MethodResult::failed(method, err.to_string()));
            }
        };

        self.write_intermediates(&output, sample)?;
        fixtures::write_peaks(&self.layout.peaks_path(method, name), output.peaks())?;

        let card = analysis::score(ground_truth_peaks, output.peaks(), self.config.scoring.tolerance);
        fixtures::write_metrics(&self.layout.metrics_path(method, name), &card.metrics)?;

        tracing::debug!(
            "[Benchmark] {} / {}: detected={} tp={} fn={} fp={}",
            name,
            method,
            output.peaks().len(),
            card.summary.true_positives,
            card.summary.false_negatives,
            card.summary.false_positives
        );

        Ok(MethodResult {
            method,
            detected: output.peaks().len(),
            true_positives: card.summary.true_positives,
            false_negatives: card.summary.false_negatives,
            false_positives: card.summary.false_positives,
            metrics: Some(card.metrics),
            error: None,
        })
    }

    fn write_intermediates(&self, output: &PipelineOutput, sample: &SampleData) -> Result<()> {
        let name = sample.metadata.name.as_str();
        let t = &sample.signal.t;
        let path = |kind| self.layout.intermediate_path(kind, name);

        match output {
            PipelineOutput::Custom(out) => {
                fixtures::write_columns(&path(Intermediate::CustomSmoothed), t, &out.smoothed)?;
                fixtures::write_columns(&path(Intermediate::CustomBaseline), t, &out.baseline)?;
                fixtures::write_columns(&path(Intermediate::CustomFiltered), t, &out.filtered)?;
            }
            PipelineOutput::MatchedFilter(out) => {
                fixtures::write_columns(&path(Intermediate::MatchedFilterFiltered), t, &out.filtered)?;
                fixtures::write_series(&path(Intermediate::MatchedFilterConvolved), &out.convolved)?;
            }
            PipelineOutput::Windowed(_) => {}
        }
        Ok(())
    }
}
