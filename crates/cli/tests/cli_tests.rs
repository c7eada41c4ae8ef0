//! CLI integration tests

use std::process::Command;

fn dashctl() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dashctl"))
}

#[test]
fn test_cli_help() {
    let output = dashctl().arg("--help").output().expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Cloud Dashboard"), "Should show app name");
    for command in ["idle", "optimize", "status", "train", "config"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

#[test]
fn test_cli_version() {
    let output = dashctl().arg("--version").output().expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("dashctl"), "Should show binary name");
}

#[test]
fn test_idle_help_shows_live_flag() {
    let output = dashctl()
        .args(["idle", "--help"])
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--live"));
}

#[test]
fn test_train_help_shows_options() {
    let output = dashctl()
        .args(["train", "--help"])
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--force"));
    assert!(stdout.contains("--telemetry"));
    assert!(stdout.contains("--artifact-dir"));
}

#[test]
fn test_unknown_command_fails() {
    let output = dashctl()
        .arg("costs")
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());
}

#[test]
fn test_unreachable_api_reports_error() {
    let output = dashctl()
        .args(["--api-url", "http://127.0.0.1:1", "status"])
        .env("HOME", std::env::temp_dir())
        .env("XDG_CONFIG_HOME", std::env::temp_dir().join("dashctl-test-config"))
        .output()
        .expect("Failed to execute command");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to send request"));
}

#[test]
fn test_local_train_on_csv() {
    let dir = tempfile::TempDir::new().unwrap();
    let csv = dir.path().join("telemetry.csv");
    let mut content = String::from(
        "vm_id,timestamp,cpu_usage,memory_usage,network_traffic,power_consumption,execution_time,task_type\n",
    );
    for i in 0..9 {
        let p = (i % 3) as f64;
        content.push_str(&format!(
            "vm-{},2023-01-25 09:10:54,{},{},{},{},{},io\n",
            i,
            10.0 + p * 30.0 + i as f64,
            20.0 + p * 25.0,
            100.0 + p * 200.0,
            150.0 + p * 90.0,
            5.0 + p * 10.0
        ));
    }
    std::fs::write(&csv, content).unwrap();

    let output = dashctl()
        .args(["--format", "json", "train", "--force", "--telemetry"])
        .arg(&csv)
        .arg("--artifact-dir")
        .arg(dir.path().join("artifacts"))
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "train failed: {}", String::from_utf8_lossy(&output.stderr));
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["outcome"], "trained");
    assert_eq!(outcome["train_size"], 7);
    assert_eq!(outcome["test_size"], 2);
    assert!(dir.path().join("artifacts").join("CURRENT").exists());
}
