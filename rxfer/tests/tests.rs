use predicates::prelude::PredicateBooleanExt;

fn setup_test_env() -> (tempfile::TempDir, tempfile::TempDir) {
    let src_dir = tempfile::tempdir().unwrap();
    let dst_dir = tempfile::tempdir().unwrap();
    (src_dir, dst_dir)
}

fn seed_source(src: &std::path::Path) {
    std::fs::write(src.join("top.txt"), "top contents").unwrap();
    std::fs::create_dir_all(src.join("nested/deep")).unwrap();
    std::fs::write(src.join("nested/deep/leaf.txt"), "leaf contents").unwrap();
    std::fs::create_dir(src.join("empty")).unwrap();
}

fn rxfer() -> assert_cmd::Command {
    assert_cmd::Command::cargo_bin("rxfer").unwrap()
}

#[test]
fn test_basic_migration_preserves_hierarchy() {
    let (src_dir, dst_dir) = setup_test_env();
    seed_source(src_dir.path());
    rxfer()
        .args([
            "--no-log",
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    assert_eq!(
        std::fs::read_to_string(dst_dir.path().join("top.txt")).unwrap(),
        "top contents"
    );
    assert_eq!(
        std::fs::read_to_string(dst_dir.path().join("nested/deep/leaf.txt")).unwrap(),
        "leaf contents"
    );
    assert!(dst_dir.path().join("empty").is_dir());
}

#[test]
fn test_second_run_skips_unchanged_objects() {
    let (src_dir, dst_dir) = setup_test_env();
    seed_source(src_dir.path());
    rxfer()
        .args([
            "--no-log",
            "--summary",
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("objects transferred: 3"));
    rxfer()
        .args([
            "--no-log",
            "--summary",
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(
            predicates::str::contains("objects unchanged: 3")
                .and(predicates::str::contains("objects transferred: 0")),
        );
}

#[test]
fn test_changed_object_is_retransferred() {
    let (src_dir, dst_dir) = setup_test_env();
    std::fs::write(src_dir.path().join("doc.txt"), "version one").unwrap();
    rxfer()
        .args([
            "--no-log",
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    std::fs::write(src_dir.path().join("doc.txt"), "version two").unwrap();
    rxfer()
        .args([
            "--no-log",
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    assert_eq!(
        std::fs::read_to_string(dst_dir.path().join("doc.txt")).unwrap(),
        "version two"
    );
}

#[test]
fn test_missing_destination_aborts() {
    let src_dir = tempfile::tempdir().unwrap();
    std::fs::write(src_dir.path().join("one.txt"), "1").unwrap();
    let missing = src_dir.path().join("nope/nowhere");
    rxfer()
        .args([
            "--no-log",
            src_dir.path().to_str().unwrap(),
            missing.to_str().unwrap(),
        ])
        .assert()
        .code(2);
    // nothing was created at the destination path
    assert!(!missing.exists());
}

#[test]
fn test_transfer_log_is_written() {
    let (src_dir, dst_dir) = setup_test_env();
    let log_dir = tempfile::tempdir().unwrap();
    std::fs::write(src_dir.path().join("one.txt"), "1").unwrap();
    rxfer()
        .args([
            "--log-dir",
            log_dir.path().to_str().unwrap(),
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    let entries: Vec<std::path::PathBuf> = std::fs::read_dir(log_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    let name = entries[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.ends_with(".log"), "{name}");
    assert!(name.contains("_to_"), "{name}");
    let contents = std::fs::read_to_string(&entries[0]).unwrap();
    assert!(contents.contains("[START] one.txt"));
    assert!(contents.contains("[OK] one.txt"));
    assert!(contents.contains("[RECONCILE] matched"));
}

#[test]
fn test_json_report_on_stdout() {
    let (src_dir, dst_dir) = setup_test_env();
    std::fs::write(src_dir.path().join("one.txt"), "1").unwrap();
    let output = rxfer()
        .args([
            "--no-log",
            "--json",
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["matched"], serde_json::Value::Bool(true));
    assert_eq!(report["succeeded"], serde_json::json!(1));
    assert_eq!(report["failed"], serde_json::json!(0));
}

#[test]
fn test_staging_directory_is_removed() {
    let (src_dir, dst_dir) = setup_test_env();
    let staging_root = tempfile::tempdir().unwrap();
    let staging_dir = staging_root.path().join("stage");
    std::fs::write(src_dir.path().join("one.txt"), "1").unwrap();
    rxfer()
        .args([
            "--no-log",
            "--staging-dir",
            staging_dir.to_str().unwrap(),
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    assert!(!staging_dir.exists());
}

#[test]
fn test_empty_source_succeeds() {
    let (src_dir, dst_dir) = setup_test_env();
    rxfer()
        .args([
            "--no-log",
            "--summary",
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("objects transferred: 0"));
}

#[test]
fn test_bandwidth_limited_run_completes() {
    let (src_dir, dst_dir) = setup_test_env();
    std::fs::write(src_dir.path().join("blob.bin"), vec![0u8; 64 * 1024]).unwrap();
    rxfer()
        .args([
            "--no-log",
            "--bandwidth-limit",
            "1",
            "--max-workers",
            "2",
            src_dir.path().to_str().unwrap(),
            dst_dir.path().to_str().unwrap(),
        ])
        .assert()
        .success();
    assert_eq!(
        std::fs::read(dst_dir.path().join("blob.bin")).unwrap().len(),
        64 * 1024
    );
}
