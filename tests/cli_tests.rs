//! Smoke tests for the optionpipe binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn help_describes_the_tool() {
    Command::cargo_bin("optionpipe")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--option-type"))
        .stdout(predicate::str::contains("--strike"));
}

#[test]
fn missing_symbols_is_a_usage_error() {
    Command::cargo_bin("optionpipe")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("SYMBOLS"));
}

#[test]
fn invalid_option_type_is_rejected() {
    Command::cargo_bin("optionpipe")
        .unwrap()
        .args(["--option-type", "straddle", "AAPL"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("call"));
}

#[test]
fn malformed_config_file_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[pipeline]\nqueue_capacity = 0\n").unwrap();

    Command::cargo_bin("optionpipe")
        .unwrap()
        .args(["--config", path.to_str().unwrap(), "AAPL"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
