use std::fs;

use assert_cmd::Command;

mod common;
use common::write_png;

#[test]
fn runs() {
    let mut cmd = Command::cargo_bin("cropgen").unwrap();
    cmd.assert().success();
}

#[test]
fn outputs_tool_name() {
    let mut cmd = Command::cargo_bin("cropgen").unwrap();
    cmd.arg("-V");
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("cropgen"));
}

// Build subcommand tests

#[test]
fn build_writes_a_snapshot() {
    let temp = tempfile::tempdir().expect("create temp dir");
    write_png(&temp.path().join("images/img_a.png"), 64, 64);
    write_png(&temp.path().join("images/img_b.png"), 48, 48);
    let snapshot = temp.path().join("sampler.snapshot");

    let mut cmd = Command::cargo_bin("cropgen").unwrap();
    cmd.args([
        "build",
        temp.path().join("images").to_str().unwrap(),
        "--output",
        snapshot.to_str().unwrap(),
        "--window-size",
        "16x16",
        "--output-size",
        "32x32",
        "--stride-x",
        "8",
        "--stride-y",
        "8",
        "--max-scales",
        "1",
        "--seed",
        "9",
    ]);
    cmd.assert()
        .success()
        .stdout(predicates::str::contains("records"));
    assert!(snapshot.exists());
}

#[test]
fn build_fails_on_missing_images() {
    let temp = tempfile::tempdir().expect("create temp dir");
    fs::create_dir_all(temp.path().join("empty")).expect("create empty dir");

    let mut cmd = Command::cargo_bin("cropgen").unwrap();
    cmd.args([
        "build",
        temp.path().join("empty").to_str().unwrap(),
        "--output",
        temp.path().join("out.snapshot").to_str().unwrap(),
    ]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("No images found"));
}

#[test]
fn build_rejects_invalid_geometry() {
    let temp = tempfile::tempdir().expect("create temp dir");
    write_png(&temp.path().join("images/img.png"), 64, 64);

    let mut cmd = Command::cargo_bin("cropgen").unwrap();
    cmd.args([
        "build",
        temp.path().join("images").to_str().unwrap(),
        "--output",
        temp.path().join("out.snapshot").to_str().unwrap(),
        "--scale-ratio",
        "1.0",
    ]);
    cmd.assert()
        .failure()
        .stderr(predicates::str::contains("scale_ratio"));
}

// Full build -> inspect -> sample flow

#[test]
fn build_inspect_sample_flow() {
    let temp = tempfile::tempdir().expect("create temp dir");
    write_png(&temp.path().join("images/img_a.png"), 64, 64);
    let snapshot = temp.path().join("sampler.snapshot");

    let annotations = temp.path().join("truth.json");
    fs::write(
        &annotations,
        r#"[{"file_name": "img_a.png", "boxes": [{"x": 16, "y": 16, "width": 16, "height": 16}]}]"#,
    )
    .expect("write sidecar");

    let mut build = Command::cargo_bin("cropgen").unwrap();
    build.args([
        "build",
        temp.path().join("images").to_str().unwrap(),
        "--output",
        snapshot.to_str().unwrap(),
        "--annotations",
        annotations.to_str().unwrap(),
        "--window-size",
        "16x16",
        "--output-size",
        "16x16",
        "--stride-x",
        "16",
        "--stride-y",
        "16",
        "--max-scales",
        "1",
        "--seed",
        "3",
    ]);
    build.assert().success();

    let mut inspect = Command::cargo_bin("cropgen").unwrap();
    inspect.args(["inspect", snapshot.to_str().unwrap()]);
    inspect
        .assert()
        .success()
        .stdout(predicates::str::contains("records:  1"))
        .stdout(predicates::str::contains("window (16, 16) 16x16"));

    let out_dir = temp.path().join("crops");
    let mut sample = Command::cargo_bin("cropgen").unwrap();
    sample.args([
        "sample",
        snapshot.to_str().unwrap(),
        "--count",
        "4",
        "--out-dir",
        out_dir.to_str().unwrap(),
        "--flip-horizontal",
    ]);
    sample
        .assert()
        .success()
        .stdout(predicates::str::contains("wrote 4 crops"));

    let crops: Vec<_> = fs::read_dir(&out_dir).expect("read out dir").collect();
    assert_eq!(crops.len(), 4);
}

#[test]
fn sample_fails_cleanly_on_empty_snapshot() {
    let temp = tempfile::tempdir().expect("create temp dir");
    // Image too small for the default 32x32 window: zero records.
    write_png(&temp.path().join("images/img.png"), 8, 8);
    let snapshot = temp.path().join("sampler.snapshot");

    let mut build = Command::cargo_bin("cropgen").unwrap();
    build.args([
        "build",
        temp.path().join("images").to_str().unwrap(),
        "--output",
        snapshot.to_str().unwrap(),
    ]);
    build.assert().success();

    let mut sample = Command::cargo_bin("cropgen").unwrap();
    sample.args([
        "sample",
        snapshot.to_str().unwrap(),
        "--out-dir",
        temp.path().join("crops").to_str().unwrap(),
    ]);
    sample
        .assert()
        .failure()
        .stderr(predicates::str::contains("No sample windows"));
}

#[test]
fn inspect_rejects_corrupted_snapshot() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let snapshot = temp.path().join("bad.snapshot");
    fs::write(&snapshot, b"CROPGEN\x01 garbage beyond the magic").expect("write bad file");

    let mut inspect = Command::cargo_bin("cropgen").unwrap();
    inspect.args(["inspect", snapshot.to_str().unwrap()]);
    inspect.assert().failure();
}
