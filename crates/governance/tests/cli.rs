use assert_cmd::Command;
use predicates::str::contains;
use tempfile::TempDir;

fn cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("governance").unwrap();
    cmd.arg("--config").arg(dir.path().join("governance.yaml"));
    cmd
}

#[test]
fn demo_json_prints_only_json() {
    let dir = TempDir::new().unwrap();
    let output = cmd(&dir).args(["demo", "--json"]).output().unwrap();
    assert!(output.status.success());

    let events: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let events = events.as_array().unwrap();
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e["kind"].is_string() && e["message"].is_string()));
}

#[test]
fn demo_narrates_without_json() {
    let dir = TempDir::new().unwrap();
    cmd(&dir)
        .arg("demo")
        .assert()
        .success()
        .stdout(contains("Governance Demo"))
        .stdout(contains("Audit trail"));
}

#[test]
fn validate_json_exit_codes() {
    let dir = TempDir::new().unwrap();
    let output = cmd(&dir)
        .args(["validate", "--sender", "someone", "--content", "verified report", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let verdict: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(verdict.is_object());

    cmd(&dir)
        .args(["validate", "--sender", "someone", "--content", "this looks suspicious"])
        .assert()
        .code(1)
        .stdout(contains("REJECT"));
}
