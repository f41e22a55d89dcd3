//! End-to-end tests of the `soak-harness` command line

use pretty_assertions::assert_eq;
use std::io::Write;
use std::process::{Command, Output, Stdio};

const HARNESS: &str = env!("CARGO_BIN_EXE_soak-harness");
const FAKE_TESTER: &str = env!("CARGO_BIN_EXE_fake_tester");

fn harness() -> Command {
    let mut cmd = Command::new(HARNESS);
    for var in [
        "SOAK_HARNESS_DRIVER",
        "SOAK_HARNESS_SUBJECT",
        "SOAK_HARNESS_REPETITIONS",
        "SOAK_HARNESS_SEEDS",
        "SOAK_HARNESS_TIMEOUT",
        "SOAK_HARNESS_WORKERS",
        "SOAK_HARNESS_EXPECTED_CHECKS",
        "FAKE_TESTER_FAIL_SEEDS",
        "FAKE_TESTER_HANG_SEEDS",
        "FAKE_TESTER_EXIT_CODE",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn run_fake(extra: &[&str]) -> Command {
    let mut cmd = harness();
    cmd.args(["run", "--driver", FAKE_TESTER, "--subject", "./reliable"])
        .args(extra);
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_all_passing_run_exits_zero() {
    let output = run_fake(&["-r", "2", "-s", "1-3"]).output().unwrap();
    let text = stdout(&output);

    assert_eq!(output.status.code(), Some(0));
    assert!(text.ends_with("\nScore: 6/6\n"), "unexpected output: {text}");
    assert_eq!(text.matches("14/14").count(), 6);
}

#[test]
fn test_text_run_reports_aux_seed() {
    let output = run_fake(&["-r", "1", "-s", "1", "--aux-seed", "9"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("Auxiliary seed: 9 (rerun with --aux-seed 9)"), "stderr was: {err}");
    assert!(!stdout(&output).contains("Auxiliary seed"));

    // without --aux-seed the clock picks one, and it must still be shown
    let output = run_fake(&["-r", "1", "-s", "1"]).output().unwrap();
    let err = String::from_utf8_lossy(&output.stderr);
    let seed = err
        .lines()
        .find_map(|l| l.strip_prefix("Auxiliary seed: "))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|s| s.parse::<u64>().ok());
    assert!(seed.is_some(), "stderr was: {err}");
}

#[test]
fn test_failing_seed_exits_one_and_lists_failures() {
    let output = run_fake(&["-r", "2", "-s", "1-3"])
        .env("FAKE_TESTER_FAIL_SEEDS", "2")
        .output()
        .unwrap();
    let text = stdout(&output);

    assert_eq!(output.status.code(), Some(1));
    assert!(text.contains("Score: 4/6"));
    let (_, tail) = text.split_once("Score: 4/6\n").unwrap();
    let first = tail.find(" seed: 2, w: 1").unwrap();
    let second = tail.find(" seed: 2, w: 2").unwrap();
    assert!(first < second);
    assert!(tail.contains("13/14"));
}

#[test]
fn test_missing_driver_exits_two() {
    let output = harness()
        .args(["run", "--driver", "/nonexistent/tester", "-r", "1", "-s", "1"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let err = String::from_utf8_lossy(&output.stderr);
    assert!(err.contains("Error:"), "stderr was: {err}");
    assert!(!stdout(&output).contains("Score:"));
}

#[test]
fn test_invalid_seed_set_is_rejected() {
    let output = run_fake(&["-s", "5-1"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));

    let output = run_fake(&["-s", "0-18446744073709551615"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid seed set"));
}

#[test]
fn test_json_report_on_stdout() {
    let output = run_fake(&["-r", "2", "-s", "1,2", "--json", "--aux-seed", "9"])
        .env("FAKE_TESTER_FAIL_SEEDS", "1")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["success"], false);
    assert_eq!(report["aux_seed"], 9);
    assert_eq!(report["summary"]["total_trials"], 4);
    assert_eq!(report["summary"]["passed_trials"], 2);
    assert_eq!(report["summary"]["failures"].as_array().unwrap().len(), 2);

    // subject output goes to stderr so stdout stays parseable
    assert!(String::from_utf8_lossy(&output.stderr).contains("14/14"));
}

#[test]
fn test_output_dir_persists_report_and_failure_logs() {
    let dir = tempfile::tempdir().unwrap();
    let session_dir = dir.path().join("soak");
    let output = run_fake(&["-r", "3", "-s", "1-2", "--no-echo", "-o"])
        .arg(&session_dir)
        .env("FAKE_TESTER_FAIL_SEEDS", "2")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let text = stdout(&output);
    assert!(!text.contains("Testing ./reliable"));
    assert!(text.contains("Session: "));

    assert!(session_dir.join("report.json").is_file());
    assert!(session_dir.join(".session.json").is_file());
    let mut logs: Vec<String> = std::fs::read_dir(session_dir.join("failures"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    logs.sort();
    assert_eq!(
        logs,
        vec![
            "00001_seed2_w1.log",
            "00003_seed2_w2.log",
            "00005_seed2_w3.log"
        ]
    );
}

#[test]
fn test_timeout_counts_as_failure() {
    let output = run_fake(&["-r", "1", "-s", "1-2", "-t", "1", "--quiet-stderr"])
        .env("FAKE_TESTER_HANG_SEEDS", "2")
        .output()
        .unwrap();
    let text = stdout(&output);

    assert_eq!(output.status.code(), Some(1));
    assert!(text.contains("Score: 1/2"));
    assert!(text.contains(" seed: 2, w: 1 (timed out)"));
}

#[test]
fn test_plan_lists_command_lines() {
    let output = harness()
        .args([
            "plan",
            "--driver",
            "./tester",
            "--subject",
            "./reliable",
            "-r",
            "2",
            "-s",
            "1,2",
            "--aux-seed",
            "7",
        ])
        .output()
        .unwrap();
    let text = stdout(&output);

    assert_eq!(output.status.code(), Some(0));
    assert!(text.starts_with("# 4 trials (2 repetitions x 2 seeds), aux seed 7"));
    let lines: Vec<&str> = text.lines().skip(1).collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].ends_with("./tester --seed 1 -w 1 ./reliable"));
    assert!(lines[3].ends_with("./tester --seed 2 -w 2 ./reliable"));
}

#[test]
fn test_plan_json_is_reproducible() {
    let plan_json = || {
        let output = harness()
            .args(["plan", "-r", "3", "-s", "1-2", "--aux-seed", "42", "--json"])
            .output()
            .unwrap();
        serde_json::from_slice::<serde_json::Value>(&output.stdout).unwrap()
    };

    let first = plan_json();
    assert_eq!(first.as_array().unwrap().len(), 6);
    assert_eq!(first, plan_json());
    for spec in first.as_array().unwrap() {
        let aux = spec["auxiliary"].as_u64().unwrap();
        assert!((1..=14).contains(&aux));
    }
}

#[test]
fn test_classify_from_stdin() {
    let classify = |input: &str, extra: &[&str]| {
        let mut child = harness()
            .args(["classify", "-"])
            .args(extra)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        child.wait_with_output().unwrap()
    };

    assert_eq!(classify("Passed 14/14 tests\n", &[]).status.code(), Some(0));
    assert_eq!(classify("13/14\n", &[]).status.code(), Some(1));
    assert_eq!(classify("114/14\n", &[]).status.code(), Some(0));
    assert_eq!(
        classify("114/14\n", &["--strict-marker"]).status.code(),
        Some(1)
    );
    assert_eq!(
        classify("Passed 5/5\n", &["--expected-checks", "5"]).status.code(),
        Some(0)
    );
}

#[test]
fn test_bare_invocation_prints_usage() {
    let output = harness().output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Usage: soak-harness <COMMAND>"));
}
