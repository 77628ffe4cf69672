//! Tests for the port-selector binary
//!
//! Every test runs against its own config directory with a high port range
//! so real listeners on the machine are unlikely to interfere.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn selector_binary() -> String {
    env!("CARGO_BIN_EXE_port-selector").to_string()
}

fn create_config_dir(range: (u16, u16)) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(
        dir.path().join("config.yaml"),
        format!(
            "portStart: {}\nportEnd: {}\nfreezePeriodMinutes: 1440\nallocationTTL: 30d\n",
            range.0, range.1
        ),
    )
    .expect("Failed to write test config");
    dir
}

fn selector(config_dir: &Path, project: &str, args: &[&str]) -> Output {
    Command::new(selector_binary())
        .args(["--config-dir", config_dir.to_str().unwrap(), "--dir", project])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run port-selector")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_get_is_stable_across_runs() {
    let config = create_config_dir((41000, 41099));

    let first = selector(config.path(), "/tmp/project-a", &[]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    let port: u16 = stdout(&first).parse().expect("stdout is just the port");
    assert!((41000..=41099).contains(&port));

    let second = selector(config.path(), "/tmp/project-a", &["get"]);
    assert_eq!(stdout(&second), port.to_string());

    let other = selector(config.path(), "/tmp/project-b", &[]);
    assert_ne!(stdout(&other), port.to_string());

    assert!(config.path().join("allocations.yaml").exists());
}

#[test]
fn test_list_json_reports_allocations() {
    let config = create_config_dir((41100, 41199));
    selector(config.path(), "/tmp/project-a", &["--name", "web"]);

    let output = selector(config.path(), "/tmp/project-a", &["list", "--json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["directory"], "/tmp/project-a");
    assert_eq!(rows[0]["name"], "web");
    assert_eq!(rows[0]["current"], true);
}

#[test]
fn test_lock_conflict_needs_force() {
    let config = create_config_dir((41200, 41299));

    let locked = selector(config.path(), "/tmp/project-a", &["lock", "41250"]);
    assert!(locked.status.success(), "stderr: {}", stderr(&locked));

    let refused = selector(config.path(), "/tmp/project-b", &["lock", "41250"]);
    assert_eq!(refused.status.code(), Some(1));
    let message = stderr(&refused);
    assert!(message.contains("Error:"), "stderr: {}", message);
    assert!(message.contains("--force"), "stderr: {}", message);
    assert!(message.contains("Hint:"), "stderr: {}", message);

    let forced = selector(config.path(), "/tmp/project-b", &["lock", "41250", "--force"]);
    assert!(forced.status.success(), "stderr: {}", stderr(&forced));
    assert!(stderr(&forced).contains("reassigned"));

    let get = selector(config.path(), "/tmp/project-b", &[]);
    assert_eq!(stdout(&get), "41250");
}

#[test]
fn test_forget_releases_allocation() {
    let config = create_config_dir((41300, 41399));
    selector(config.path(), "/tmp/project-a", &[]);

    let forgot = selector(config.path(), "/tmp/project-a", &["forget"]);
    assert!(forgot.status.success(), "stderr: {}", stderr(&forgot));

    let list = selector(config.path(), "/tmp/project-a", &["list", "--json"]);
    assert_eq!(stdout(&list), "[]");
}

#[test]
fn test_corrupted_store_is_reported() {
    let config = create_config_dir((41400, 41499));
    fs::write(config.path().join("allocations.yaml"), "allocations: [oops").unwrap();

    let output = selector(config.path(), "/tmp/project-a", &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("corrupted"), "stderr: {}", stderr(&output));
    assert_eq!(
        fs::read_to_string(config.path().join("allocations.yaml")).unwrap(),
        "allocations: [oops"
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = create_config_dir((5000, 4000));
    let output = selector(config.path(), "/tmp/project-a", &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid configuration"), "stderr: {}", stderr(&output));
}

#[test]
fn test_completions_need_no_config() {
    let output = Command::new(selector_binary())
        .args(["completions", "bash"])
        .env("PORT_SELECTOR_CONFIG_DIR", "/nonexistent/port-selector-test")
        .output()
        .expect("Failed to run port-selector");

    assert!(output.status.success());
    assert!(stdout(&output).contains("port-selector"));
}
