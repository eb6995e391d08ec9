use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_peak_bench"))
}

fn run_ok(args: &[&str]) -> String {
    let output = cli().args(args).output().expect("failed to run peak_bench");
    assert!(
        output.status.success(),
        "{:?} exited with {:?}: {}",
        args,
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout UTF-8")
}

fn run_err(args: &[&str]) -> Output {
    let output = cli().args(args).output().expect("failed to run peak_bench");
    assert_eq!(output.status.code(), Some(1), "{:?} should fail", args);
    output
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn synth(dir: &Path) {
    run_ok(&[
        "synth",
        "--output",
        &path_str(dir),
        "--samples",
        "2",
        "--duration",
        "60",
        "--seed",
        "7",
    ]);
}

#[test]
fn print_config_emits_defaults() {
    let stdout = run_ok(&["print-config"]);
    let json: Value = serde_json::from_str(stdout.trim()).expect("config JSON");
    assert_eq!(json["custom"]["window_len"], 151);
    assert_eq!(json["matched_filter"]["index_policy"], "drop");
    assert_eq!(json["scoring"]["tolerance"], 0.5);
}

#[test]
fn synth_then_list_samples() {
    let dir = tempfile::tempdir().unwrap();
    synth(dir.path());
    assert!(dir.path().join("raw/sample_01.txt").exists());
    assert!(dir.path().join("ground_truth/sample_02.txt").exists());
    assert!(dir.path().join("template.json").exists());

    let stdout = run_ok(&["list", "--input", &path_str(dir.path())]);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "{}", stdout);
    assert!(lines[0].starts_with("sample_01"));
}

#[test]
fn run_writes_results_tree() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    synth(input.path());

    let stdout = run_ok(&[
        "run",
        "--input",
        &path_str(input.path()),
        "--template",
        &path_str(&input.path().join("template.json")),
        "--output",
        &path_str(output.path()),
    ]);
    let summary: Value = serde_json::from_str(stdout.trim()).expect("summary JSON");
    assert_eq!(summary.as_array().map(Vec::len), Some(3));

    for rel in [
        "peaks/custom_peaks/sample_01.txt",
        "peaks/hybrid_peaks/sample_01.txt",
        "peaks/scipy_peaks/sample_02.txt",
        "metrics/custom_metrics/sample_02.txt",
        "signals/custom_method/baseline/sample_01.txt",
        "signals/hybrid_method/convolved/sample_02.txt",
        "report.json",
    ] {
        assert!(output.path().join(rel).exists(), "missing {}", rel);
    }

    let metrics = std::fs::read_to_string(output.path().join("metrics/scipy_metrics/sample_01.txt")).unwrap();
    assert!(metrics.starts_with("# Sensitivity,Specificity,Time_Accuracy,MAE_Intensity\n"));
}

#[test]
fn detect_prints_peaks_and_score_reads_them() {
    let dir = tempfile::tempdir().unwrap();
    synth(dir.path());
    let signal = path_str(&dir.path().join("raw/sample_01.txt"));
    let ground_truth = path_str(&dir.path().join("ground_truth/sample_01.txt"));

    let stdout = run_ok(&[
        "detect",
        "--method",
        "windowed",
        "--signal",
        &signal,
        "--ground-truth",
        &ground_truth,
    ]);
    let json: Value = serde_json::from_str(stdout.trim()).expect("detect JSON");
    assert_eq!(json["method"], "windowed");
    let peaks = json["peaks"].as_array().expect("peaks array");
    assert_eq!(json["peak_count"].as_u64(), Some(peaks.len() as u64));

    // Write the detections as a peak file and score them
    let peaks_path = dir.path().join("peaks.txt");
    let rows: String = peaks
        .iter()
        .map(|p| format!("{},{}\n", p["time"], p["amplitude"]))
        .collect();
    std::fs::write(&peaks_path, rows).unwrap();

    let stdout = run_ok(&[
        "score",
        "--ground-truth",
        &ground_truth,
        "--peaks",
        &path_str(&peaks_path),
    ]);
    let json: Value = serde_json::from_str(stdout.trim()).expect("score JSON");
    let sensitivity = json["metrics"]["sensitivity"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&sensitivity));
}

#[test]
fn detect_accepts_result_tag_alias() {
    let dir = tempfile::tempdir().unwrap();
    synth(dir.path());

    let stdout = run_ok(&[
        "detect",
        "--method",
        "hybrid",
        "--signal",
        &path_str(&dir.path().join("raw/sample_02.txt")),
        "--template",
        &path_str(&dir.path().join("template.json")),
    ]);
    let json: Value = serde_json::from_str(stdout.trim()).expect("detect JSON");
    assert_eq!(json["method"], "matched-filter");
}

#[test]
fn missing_inputs_exit_with_error() {
    let dir = tempfile::tempdir().unwrap();
    synth(dir.path());
    let signal = path_str(&dir.path().join("raw/sample_01.txt"));

    let output = run_err(&["detect", "--method", "windowed", "--signal", &signal]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ground_truth"), "{}", stderr);

    let output = run_err(&["score", "--ground-truth", "/nonexistent/gt.txt", "--peaks", &signal]);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error:"));
}

#[test]
fn verbose_logs_go_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    synth(dir.path());

    let output = cli()
        .env_remove("RUST_LOG")
        .args([
            "-vv",
            "detect",
            "--method",
            "windowed",
            "--signal",
            &path_str(&dir.path().join("raw/sample_01.txt")),
            "--ground-truth",
            &path_str(&dir.path().join("ground_truth/sample_01.txt")),
        ])
        .output()
        .expect("failed to run peak_bench");
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[Windowed]"), "{}", stderr);
    assert!(!stderr.contains("logging disabled"), "{}", stderr);

    let stdout = String::from_utf8(output.stdout).unwrap();
    let json: Value = serde_json::from_str(stdout.trim()).expect("stdout stays pure JSON");
    assert_eq!(json["method"], "windowed");
}
