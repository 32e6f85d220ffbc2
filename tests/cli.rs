//! CLI surface smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn missing_target_exits_with_config_error() {
    Command::cargo_bin("passiverec")
        .unwrap()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("target"));
}

#[test]
fn unknown_tool_exits_with_config_error() {
    Command::cargo_bin("passiverec")
        .unwrap()
        .args(["--target", "example.com", "--tools", "nmap"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("nmap"));
}

#[test]
fn empty_tool_selection_completes_cleanly() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("passiverec")
        .unwrap()
        .args([
            "--target",
            "example.com",
            "--tools",
            "",
            "--outdir",
            dir.path().to_str().unwrap(),
        ])
        .assert()
        .success();

    // The sanitized run directory was created.
    assert!(dir.path().join("example_com").is_dir());
}

#[test]
fn help_documents_the_flag_surface() {
    Command::cargo_bin("passiverec")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--target"))
        .stdout(predicate::str::contains("--active"))
        .stdout(predicate::str::contains("--tools"))
        .stdout(predicate::str::contains("--report"));
}
