// Integration tests for CLI commands
// These run the built binary and never touch a real WhatsApp bridge.

use std::process::Command;
use tempfile::TempDir;

fn wagate() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wagate"))
}

#[test]
fn test_cli_help() {
    let output = wagate().arg("--help").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("status"));
    assert!(stdout.contains("reset-credentials"));
    assert!(stdout.contains("version"));
}

#[test]
fn test_cli_version() {
    let output = wagate().arg("version").output().expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("wagate {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_cli_reset_credentials_with_yes() {
    let temp_dir = TempDir::new().unwrap();
    let credentials = temp_dir.path().join("auth_info.json");
    let config = temp_dir.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "[whatsapp]\ncredentials_path = {:?}\n",
            credentials.to_string_lossy()
        ),
    )
    .unwrap();
    std::fs::write(&credentials, "{}").unwrap();

    let output = wagate()
        .args(["reset-credentials", "--yes", "--config"])
        .arg(&config)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert!(!credentials.exists());
}

#[test]
fn test_cli_bad_config_exits_nonzero() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config.toml");
    std::fs::write(&config, "this is not toml = = =").unwrap();

    let output = wagate()
        .args(["reset-credentials", "--yes", "--config"])
        .arg(&config)
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"));
}

#[test]
fn test_cli_status_without_server_fails() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let output = wagate()
        .args(["status", "--url", &format!("http://{}", addr)])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
}
