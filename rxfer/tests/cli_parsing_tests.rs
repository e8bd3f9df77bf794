//! CLI argument parsing tests for rxfer
//!
//! These verify that arguments are accepted or rejected as expected without
//! running a real transfer.

use assert_cmd::Command;

#[test]
fn test_help_runs() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn test_version_runs() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .arg("--version")
        .assert()
        .success();
}

#[test]
fn test_help_mentions_option_groups() {
    let output = Command::cargo_bin("rxfer")
        .unwrap()
        .arg("--help")
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Transfer options"));
    assert!(stdout.contains("Progress & output"));
    assert!(stdout.contains("Advanced settings"));
}

#[test]
fn test_missing_paths_fails() {
    Command::cargo_bin("rxfer").unwrap().assert().failure();
}

#[test]
fn test_single_path_fails() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .arg("/only/one")
        .assert()
        .failure();
}

#[test]
fn test_unknown_flag_fails() {
    Command::cargo_bin("rxfer")
        .unwrap()
        .args(["--definitely-not-a-flag", "/a", "/b"])
        .assert()
        .failure();
}

#[test]
fn test_zero_workers_is_a_fatal_setting() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    Command::cargo_bin("rxfer")
        .unwrap()
        .args([
            "--no-log",
            "--max-workers",
            "0",
            src.path().to_str().unwrap(),
            dst.path().to_str().unwrap(),
        ])
        .assert()
        .code(2);
}

#[test]
fn test_bad_progress_delay_is_a_fatal_setting() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    Command::cargo_bin("rxfer")
        .unwrap()
        .args([
            "--no-log",
            "--progress",
            "--progress-delay",
            "not-a-duration",
            src.path().to_str().unwrap(),
            dst.path().to_str().unwrap(),
        ])
        .assert()
        .code(2);
}

#[test]
fn test_bandwidth_limit_accepts_integers() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("one.txt"), "1").unwrap();
    Command::cargo_bin("rxfer")
        .unwrap()
        .args([
            "--no-log",
            "--bandwidth-limit",
            "100",
            src.path().to_str().unwrap(),
            dst.path().to_str().unwrap(),
        ])
        .assert()
        .success();
}
