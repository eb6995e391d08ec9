//! Fixture utilities for the benchmark driver and CLI.
//!
//! This module reads and writes the delimited-text files exchanged with the
//! rest of the toolchain (signals, peak lists, metrics rows), loads the
//! matched-filter reference template, and discovers annotated samples on
//! disk. All numbers are written fixed-point with 6 decimals.

pub mod synthetic;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::scoring::MetricsRecord;
use crate::analysis::types::{PeakSet, Signal};

/// Header written above the metrics row
pub const METRICS_HEADER: &str = "Sensitivity,Specificity,Time_Accuracy,MAE_Intensity";

/// Extension of every delimited-text file
pub const DATA_EXTENSION: &str = "txt";

/// Largest allowed gap between a signal and its ground-truth time axis
///
/// Files carry 6 decimals, so this covers one unit of rounding.
pub const TIME_AXIS_TOLERANCE: f64 = 1e-6;

/// Format a value the way every persisted file stores it
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:.6}", value)
    }
}

/// Read every row of a comma-delimited numeric file
///
/// Blank lines and lines starting with `#` are skipped. Every row must have
/// exactly `columns` fields.
pub fn read_rows(path: &Path, columns: usize) -> Result<Vec<Vec<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() != columns {
            bail!(
                "{}:{}: expected {} column(s), found {}",
                path.display(),
                line,
                columns,
                record.len()
            );
        }
        let row = record
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|err| {
                    anyhow!("{}:{}: invalid number '{}': {}", path.display(), line, field, err)
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write rows of numbers, optionally preceded by a `# header` line
pub fn write_rows<'a, I>(path: &Path, header: Option<&str>, rows: I) -> Result<()>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
    }

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    if let Some(header) = header {
        writeln!(out, "# {}", header).with_context(|| format!("writing {}", path.display()))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    for row in rows {
        writer
            .write_record(row.iter().map(|&v| format_value(v)))
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Load a two-column `time, amplitude` signal
pub fn read_signal(path: &Path) -> Result<Signal> {
    let (t, x) = read_two_columns(path)?;
    Signal::new(t, x).with_context(|| format!("invalid signal in {}", path.display()))
}

pub fn write_signal(path: &Path, signal: &Signal) -> Result<()> {
    write_columns(path, &signal.t, &signal.x)
}

/// Write two equal-length columns
pub fn write_columns(path: &Path, first: &[f64], second: &[f64]) -> Result<()> {
    if first.len() != second.len() {
        bail!(
            "column lengths differ ({} vs {}) writing {}",
            first.len(),
            second.len(),
            path.display()
        );
    }
    let rows: Vec<[f64; 2]> = first.iter().zip(second).map(|(&a, &b)| [a, b]).collect();
    write_rows(path, None, rows.iter().map(|r| r.as_slice()))
}

/// Load a two-column `time, amplitude` peak list
pub fn read_peaks(path: &Path) -> Result<PeakSet> {
    let (t, a) = read_two_columns(path)?;
    Ok(PeakSet::from_columns(&t, &a)?)
}

pub fn write_peaks(path: &Path, peaks: &PeakSet) -> Result<()> {
    write_columns(path, &peaks.times(), &peaks.amplitudes())
}

/// Single-column series (used for the convolution output)
pub fn read_series(path: &Path) -> Result<Vec<f64>> {
    Ok(read_rows(path, 1)?.into_iter().map(|row| row[0]).collect())
}

pub fn write_series(path: &Path, values: &[f64]) -> Result<()> {
    write_rows(path, None, values.chunks(1))
}

/// Read the single metrics row written by `write_metrics`
pub fn read_metrics(path: &Path) -> Result<MetricsRecord> {
    let rows = read_rows(path, 4)?;
    match rows.as_slice() {
        [row] => Ok(MetricsRecord::from_row([row[0], row[1], row[2], row[3]])),
        _ => bail!(
            "{}: expected exactly one metrics row, found {}",
            path.display(),
            rows.len()
        ),
    }
}

pub fn write_metrics(path: &Path, metrics: &MetricsRecord) -> Result<()> {
    let row = metrics.as_row();
    write_rows(path, Some(METRICS_HEADER), [row.as_slice()])
}

/// Peaks encoded in a full-length ground-truth signal (samples > 0)
pub fn ground_truth_peaks(ground_truth: &Signal) -> PeakSet {
    ground_truth.positive_samples()
}

fn read_two_columns(path: &Path) -> Result<(Vec<f64>, Vec<f64>)> {
    let rows = read_rows(path, 2)?;
    Ok(rows.into_iter().map(|row| (row[0], row[1])).unzip())
}

/// Matched-filter reference shape with its own time axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTemplate {
    pub time: Vec<f64>,
    pub amplitude: Vec<f64>,
}

impl ReferenceTemplate {
    pub fn new(time: Vec<f64>, amplitude: Vec<f64>) -> Result<Self> {
        let template = Self { time, amplitude };
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> Result<()> {
        if self.amplitude.is_empty() {
            bail!("reference template has no samples");
        }
        if self.time.len() != self.amplitude.len() {
            bail!(
                "reference template time and amplitude lengths differ ({} vs {})",
                self.time.len(),
                self.amplitude.len()
            );
        }
        if self.amplitude.iter().any(|v| !v.is_finite()) {
            bail!("reference template contains non-finite amplitudes");
        }
        Ok(())
    }

    /// Load from a JSON file `{"time": [...], "amplitude": [...]}`
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading template {}", path.display()))?;
        let template: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", path.display()))?;
        template
            .validate()
            .with_context(|| format!("invalid template {}", path.display()))?;
        log::info!(
            "[Fixtures] Loaded reference template ({} samples) from {}",
            template.amplitude.len(),
            path.display()
        );
        Ok(template)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))
    }
}

/// Metadata describing an available sample
#[derive(Clone, Debug, PartialEq)]
pub struct SampleMetadata {
    pub name: String,
    pub signal_path: PathBuf,
    pub ground_truth_path: PathBuf,
}

/// A signal with its full-length ground-truth annotation
#[derive(Debug, Clone)]
pub struct SampleData {
    pub metadata: SampleMetadata,
    pub signal: Signal,
    /// Ground-truth amplitudes on the signal's time axis
    pub ground_truth: Vec<f64>,
}

impl SampleData {
    pub fn ground_truth_peaks(&self) -> PeakSet {
        self.signal.with_amplitudes(self.ground_truth.clone()).positive_samples()
    }
}

/// Catalog responsible for discovering samples on disk
///
/// Layout: `<root>/raw/<name>.txt` paired with `<root>/ground_truth/<name>.txt`.
pub struct SampleCatalog {
    root: PathBuf,
}

impl SampleCatalog {
    pub const RAW_DIR: &'static str = "raw";
    pub const GROUND_TRUTH_DIR: &'static str = "ground_truth";

    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn signal_path(&self, name: &str) -> PathBuf {
        self.root
            .join(Self::RAW_DIR)
            .join(format!("{}.{}", name, DATA_EXTENSION))
    }

    pub fn ground_truth_path(&self, name: &str) -> PathBuf {
        self.root
            .join(Self::GROUND_TRUTH_DIR)
            .join(format!("{}.{}", name, DATA_EXTENSION))
    }

    /// List every raw signal that has a ground-truth file, sorted by name
    pub fn discover(&self) -> Result<Vec<SampleMetadata>> {
        let raw_dir = self.root.join(Self::RAW_DIR);
        let mut samples = Vec::new();
        if !raw_dir.exists() {
            return Ok(samples);
        }

        for entry in fs::read_dir(&raw_dir)
            .with_context(|| format!("listing {}", raw_dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(DATA_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let ground_truth_path = self.ground_truth_path(name);
            if !ground_truth_path.exists() {
                log::warn!(
                    "[Fixtures] Skipping {}: no ground truth at {}",
                    name,
                    ground_truth_path.display()
                );
                continue;
            }
            samples.push(SampleMetadata {
                name: name.to_string(),
                signal_path: path.clone(),
                ground_truth_path,
            });
        }

        samples.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(samples)
    }

    /// Load a sample by metadata
    pub fn load(&self, metadata: &SampleMetadata) -> Result<SampleData> {
        let signal = read_signal(&metadata.signal_path)?;
        let ground_truth = read_signal(&metadata.ground_truth_path)?;
        if ground_truth.len() != signal.len() {
            bail!(
                "sample '{}': ground truth has {} samples, signal has {}",
                metadata.name,
                ground_truth.len(),
                signal.len()
            );
        }
        if let Some(i) = signal
            .t
            .iter()
            .zip(&ground_truth.t)
            .position(|(a, b)| (a - b).abs() > TIME_AXIS_TOLERANCE)
        {
            bail!(
                "sample '{}': time axes differ at row {} (signal t={}, ground truth t={})",
                metadata.name,
                i + 1,
                signal.t[i],
                ground_truth.t[i]
            );
        }

        Ok(SampleData {
            metadata: metadata.clone(),
            signal,
            ground_truth: ground_truth.x,
        })
    }

    /// Save a signal and its ground truth under `name`
    pub fn store(&self, name: &str, signal: &Signal, ground_truth: &[f64]) -> Result<()> {
        write_signal(&self.signal_path(name), signal)?;
        write_columns(&self.ground_truth_path(name), &signal.t, ground_truth)
    }
}
