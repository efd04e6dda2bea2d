use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const WALL_SCENARIO: &str = r#"{
    "dynamics": { "a": [[1.0, 0.0], [0.0, 1.0]], "b": [[1.0], [0.0]], "c": [0.0, 0.0] },
    "safe": [ { "normals": [[1.0, 0.0]], "offsets": [-5.0] } ],
    "unsafe": [ { "normals": [[-1.0, 0.0]], "offsets": [5.0] } ],
    "bounds": { "low": [-10.0], "high": [10.0] },
    "state": [4.0, 0.0],
    "proposal": [PROPOSAL],
    "config": { "horizon": 2 }
}"#;

fn scenario_file(proposal: f64) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    let text = WALL_SCENARIO.replace("PROPOSAL", &format!("{proposal:?}"));
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("polyshield").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Runtime safety shield"));
}

#[test]
fn test_cli_list() {
    let mut cmd = Command::cargo_bin("polyshield").unwrap();
    cmd.arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Available environments:"))
        .stdout(predicate::str::contains("wall-cart"))
        .stdout(predicate::str::contains("double-integrator"));
}

#[test]
fn test_cli_simulate() {
    let mut cmd = Command::cargo_bin("polyshield").unwrap();
    cmd.arg("simulate")
        .arg("double-integrator")
        .arg("--steps")
        .arg("20")
        .arg("--seed")
        .arg("3")
        .assert()
        .success()
        .stdout(predicate::str::contains("Steps:            20"))
        .stdout(predicate::str::contains("Shielded actions:"))
        .stdout(predicate::str::contains("Mean decision:"));
}

#[test]
fn test_cli_simulate_unknown_env() {
    let mut cmd = Command::cargo_bin("polyshield").unwrap();
    cmd.arg("simulate")
        .arg("cartpole")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown environment"));
}

#[test]
fn test_cli_check_projects_unsafe_proposal() {
    let file = scenario_file(10.0);
    let mut cmd = Command::cargo_bin("polyshield").unwrap();
    cmd.arg("check")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Outcome: shielded"))
        .stdout(predicate::str::contains("Proposal unsafe: true"));
}

#[test]
fn test_cli_check_json() {
    let file = scenario_file(0.5);
    let output = Command::cargo_bin("polyshield")
        .unwrap()
        .arg("check")
        .arg(file.path())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["outcome"], "agent");
    assert_eq!(value["action"][0], 0.5);
    assert_eq!(value["unsafe_proposal"], false);
}

#[test]
fn test_cli_check_missing_file() {
    let mut cmd = Command::cargo_bin("polyshield").unwrap();
    cmd.arg("check")
        .arg("does-not-exist.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read scenario"));
}
