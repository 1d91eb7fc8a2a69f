//! Tests for the `macro-kit` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn macro_kit() -> Command {
    let mut cmd = Command::cargo_bin("macro-kit").unwrap();
    cmd.env_remove("MACRO_KIT_HELPER").env("RUST_LOG", "warn");
    cmd
}

fn project_with_scenario() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let scenarios = dir.path().join(".macro-kit/scenarios");
    std::fs::create_dir_all(&scenarios).unwrap();
    std::fs::write(
        scenarios.join("login.json"),
        r#"{
            "id": "5b8f4a52-6f43-4a8e-9d1e-2f0c7a1b3c4d",
            "name": "login",
            "steps": [
                {"type": "click", "position": {"x": 100, "y": 400}, "button": "left"}
            ],
            "createdAt": "2024-05-01T10:00:00Z",
            "lastUsedAt": "2024-05-02T10:00:00Z"
        }"#,
    )
    .unwrap();
    dir
}

#[test]
fn test_list_shows_scenarios() {
    let project = project_with_scenario();
    macro_kit()
        .args(["list", "--root"])
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("login").and(predicate::str::contains("1 steps")));
}

#[test]
fn test_list_without_config_directory() {
    let empty = tempfile::tempdir().unwrap();
    macro_kit()
        .args(["list", "--root"])
        .arg(empty.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No scenarios found"));
}

#[test]
fn test_play_unknown_scenario_fails() {
    let project = project_with_scenario();
    macro_kit()
        .args(["play", "logout", "--in-process", "--root"])
        .arg(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No scenario named or with id 'logout'"));
}

// Only requests answered on the read loop are guaranteed a response when
// input closes right after them; spawned handlers are aborted at EOF.
#[test]
fn test_helper_answers_on_stdout_only() {
    let empty = tempfile::tempdir().unwrap();
    macro_kit()
        .args(["helper", "--no-native", "--root"])
        .arg(empty.path())
        .write_stdin(concat!(
            r#"{"id":"1","method":"setRecorderState","params":{"state":"action","subState":"mouse"}}"#,
            "\n",
            r#"{"id":"2","method":"scrollWheel"}"#,
            "\n",
        ))
        .assert()
        .success()
        .stdout(
            predicate::str::starts_with("{\"id\":\"1\",\"success\":true}\n")
                .and(predicate::str::contains(r#"{"id":"2","success":false,"error":"UnknownMethod"#)),
        );
}
