use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use peak_bench::analysis::{self, DetectionMethod, MetricsRecord, PeakSet, PipelineInputs};
use peak_bench::benchmark::{Benchmark, OutputLayout};
use peak_bench::config::AppConfig;
use peak_bench::error::log_detection_error;
use peak_bench::fixtures::synthetic::{self, SyntheticSpec};
use peak_bench::fixtures::{self, ReferenceTemplate, SampleCatalog};

#[derive(Parser, Debug)]
#[command(
    name = "peak_bench",
    about = "Compare peak-detection pipelines against ground-truth annotations"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate seeded synthetic samples and a matching template
    Synth {
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 3)]
        samples: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Signal length in seconds
        #[arg(long, default_value_t = 600.0)]
        duration: f64,
        #[arg(long, default_value_t = 10.0)]
        sample_rate: f64,
    },
    /// Run every method over a sample directory and write all results
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        template: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run one method on one signal and print the peaks as JSON
    Detect {
        #[arg(long)]
        method: DetectionMethod,
        #[arg(long)]
        signal: PathBuf,
        #[arg(long)]
        ground_truth: Option<PathBuf>,
        #[arg(long)]
        template: Option<PathBuf>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Score a peak list against a ground-truth signal
    Score {
        #[arg(long)]
        ground_truth: PathBuf,
        #[arg(long)]
        peaks: PathBuf,
        #[arg(long)]
        tolerance: Option<f64>,
    },
    /// List annotated samples in a directory
    List {
        #[arg(long)]
        input: PathBuf,
    },
    /// Print the default configuration as JSON
    PrintConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("Warning: logging disabled, subscriber setup failed: {err}");
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Synth {
            output,
            samples,
            seed,
            duration,
            sample_rate,
        } => run_synth(&output, samples, seed, duration, sample_rate),
        Commands::Run {
            input,
            template,
            output,
            config,
        } => run_benchmark(&input, &template, &output, config.as_deref()),
        Commands::Detect {
            method,
            signal,
            ground_truth,
            template,
            config,
        } => run_detect(
            method,
            &signal,
            ground_truth.as_deref(),
            template.as_deref(),
            config.as_deref(),
        ),
        Commands::Score {
            ground_truth,
            peaks,
            tolerance,
        } => run_score(&ground_truth, &peaks, tolerance),
        Commands::List { input } => run_list(&input),
        Commands::PrintConfig => print_json(&AppConfig::default()),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::try_load_from_file(path)?,
        None => AppConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run_synth(
    output: &Path,
    samples: usize,
    seed: u64,
    duration: f64,
    sample_rate: f64,
) -> Result<()> {
    let catalog = SampleCatalog::new(output);
    let spec = SyntheticSpec {
        duration,
        sample_rate,
        ..SyntheticSpec::default()
    };

    for i in 0..samples {
        let sample = synthetic::generate(&spec.with_seed(seed.wrapping_add(i as u64)))
            .context("generating synthetic sample")?;
        let name = format!("sample_{:02}", i + 1);
        catalog.store(&name, &sample.signal, &sample.ground_truth)?;
        println!("{} ({} events)", name, sample.event_indices.len());
    }

    let template = synthetic::event_template(spec.event_width, spec.sample_rate);
    let template_path = output.join("template.json");
    fs::create_dir_all(output).with_context(|| format!("creating {}", output.display()))?;
    template.save(&template_path)?;
    println!("template -> {}", template_path.display());
    Ok(())
}

fn run_benchmark(input: &Path, template: &Path, output: &Path, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let template = ReferenceTemplate::load(template)?;
    let catalog = SampleCatalog::new(input);
    let layout = OutputLayout::new(output);

    let report = Benchmark::run(&catalog, &template, &config, &layout)?;
    print_json(&report.summary)?;

    let failures = report.failure_count();
    if failures > 0 {
        eprintln!(
            "{} failure(s); see {}",
            failures,
            layout.report_path().display()
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct DetectPayload<'a> {
    method: DetectionMethod,
    peak_count: usize,
    peaks: &'a PeakSet,
}

fn run_detect(
    method: DetectionMethod,
    signal_path: &Path,
    ground_truth: Option<&Path>,
    template: Option<&Path>,
    config: Option<&Path>,
) -> Result<()> {
    let config = load_config(config)?;
    let signal = fixtures::read_signal(signal_path)?;
    let ground_truth = ground_truth
        .map(|path| fixtures::read_signal(path).map(|gt| gt.x))
        .transpose()?;
    let template = template.map(ReferenceTemplate::load).transpose()?;

    let inputs = PipelineInputs {
        signal: &signal,
        ground_truth: ground_truth.as_deref(),
        template: template.as_ref().map(|t| t.amplitude.as_slice()),
    };
    let output = analysis::run(method, inputs, &config).map_err(|err| {
        log_detection_error(&err, &format!("{} on {}", method, signal_path.display()));
        err
    })?;

    print_json(&DetectPayload {
        method,
        peak_count: output.peaks().len(),
        peaks: output.peaks(),
    })
}

#[derive(Serialize)]
struct ScorePayload {
    metrics: MetricsRecord,
    true_positives: usize,
    false_negatives: usize,
    false_positives: usize,
}

fn run_score(ground_truth: &Path, peaks: &Path, tolerance: Option<f64>) -> Result<()> {
    let tolerance = tolerance.unwrap_or(AppConfig::default().scoring.tolerance);
    if !(tolerance >= 0.0) || !tolerance.is_finite() {
        anyhow::bail!("tolerance must be a finite value >= 0 (got {})", tolerance);
    }

    let ground_truth = fixtures::ground_truth_peaks(&fixtures::read_signal(ground_truth)?);
    let detected = fixtures::read_peaks(peaks)?;
    let card = analysis::score(&ground_truth, &detected, tolerance);

    print_json(&ScorePayload {
        metrics: card.metrics,
        true_positives: card.summary.true_positives,
        false_negatives: card.summary.false_negatives,
        false_positives: card.summary.false_positives,
    })
}

fn run_list(input: &Path) -> Result<()> {
    let catalog = SampleCatalog::new(input);
    let samples = catalog.discover()?;
    if samples.is_empty() {
        println!("No samples found under {}", catalog.root().display());
        return Ok(());
    }

    for metadata in samples {
        println!("{} -> {}", metadata.name, metadata.ground_truth_path.display());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
