use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn ocr2alto(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ocr2alto").expect("binary should be built");
    cmd.arg("--config").arg(config);
    cmd
}

fn init(root: &Path) -> std::path::PathBuf {
    let config = root.join("config.json");
    ocr2alto(&config)
        .args(["config", "init", "--root"])
        .arg(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    config
}

#[test]
fn init_writes_a_valid_configuration() {
    let dir = tempdir().expect("tempdir should be created");
    let config = init(dir.path());

    let content = fs::read_to_string(&config).expect("config should be written");
    assert!(content.contains("low_confidence_threshold"));

    ocr2alto(&config)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("json_sorter"));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = tempdir().expect("tempdir should be created");
    let config = init(dir.path());

    ocr2alto(&config)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    ocr2alto(&config)
        .args(["config", "init", "--force", "--root"])
        .arg(dir.path())
        .assert()
        .success();
}

#[test]
fn get_and_set_parameters() {
    let dir = tempdir().expect("tempdir should be created");
    let config = init(dir.path());

    ocr2alto(&config)
        .args(["config", "get", "parameters.low_confidence_threshold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("60.0"));

    ocr2alto(&config)
        .args(["config", "set", "parameters.low_confidence_threshold", "75.5"])
        .assert()
        .success();

    ocr2alto(&config)
        .args(["config", "get", "parameters.low_confidence_threshold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("75.5"));
}

#[test]
fn set_rejects_out_of_range_threshold() {
    let dir = tempdir().expect("tempdir should be created");
    let config = init(dir.path());

    ocr2alto(&config)
        .args(["config", "set", "parameters.low_confidence_threshold", "150"])
        .assert()
        .failure();

    let content = fs::read_to_string(&config).expect("config should still be readable");
    assert!(content.contains("\"low_confidence_threshold\": 60.0"));
}

#[test]
fn get_unknown_key_fails() {
    let dir = tempdir().expect("tempdir should be created");
    let config = init(dir.path());

    ocr2alto(&config)
        .args(["config", "get", "parameters.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}

#[test]
fn missing_configuration_points_at_init() {
    let dir = tempdir().expect("tempdir should be created");

    ocr2alto(&dir.path().join("absent.json"))
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn empty_pipeline_is_idle() {
    let dir = tempdir().expect("tempdir should be created");
    let config = init(dir.path());

    ocr2alto(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("idle"));

    ocr2alto(&config)
        .arg("sort")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing staged to sort"));

    ocr2alto(&config)
        .arg("reconcile")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to reconcile"));
}

#[test]
fn recognize_requires_an_ocr_command() {
    let dir = tempdir().expect("tempdir should be created");
    let config = init(dir.path());

    ocr2alto(&config)
        .arg("recognize")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ocr.command is empty"));
}
