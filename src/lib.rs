// Peak Bench - offline comparison of peak-detection pipelines
// Three detectors (custom, matched-filter, windowed) scored against ground truth

// Module declarations
pub mod analysis;
pub mod benchmark;
pub mod config;
pub mod error;
pub mod fixtures;

// Re-exports for convenience
pub use analysis::{
    run, score, DetectionMethod, Peak, PeakSet, PipelineInputs, PipelineOutput, ScoreCard,
    Signal,
};
pub use benchmark::{Benchmark, BenchmarkReport, OutputLayout};
pub use config::AppConfig;
pub use error::{DetectionError, ErrorCode, Result};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports_run_a_pipeline() {
        let x: Vec<f64> = (0..60)
            .map(|i| (-0.5 * ((i as f64 - 30.0) / 2.0).powi(2)).exp())
            .collect();
        let signal = Signal::from_samples(x, 10.0).unwrap();
        let mut gt = vec![0.0; 60];
        gt[30] = 1.0;

        let output = run(
            DetectionMethod::Windowed,
            PipelineInputs {
                signal: &signal,
                ground_truth: Some(gt.as_slice()),
                template: None,
            },
            &AppConfig::default(),
        )
        .unwrap();
        let card = score(&signal.with_amplitudes(gt).positive_samples(), output.peaks(), 0.5);
        assert_eq!(card.metrics.sensitivity, 1.0);
    }
}
