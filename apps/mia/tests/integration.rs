//! Integration tests for the mia CLI

use std::process::Command;

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_mia"))
        .arg("--version")
        .output()
        .expect("Failed to execute mia");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("mia"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_mia"))
        .arg("--help")
        .output()
        .expect("Failed to execute mia");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Managed software install agent for macOS"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("rebuild-receipts"));
    assert!(stdout.contains("owned-paths"));
}

#[test]
fn test_cli_invalid_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_mia"))
        .arg("invalid-command")
        .output()
        .expect("Failed to execute mia");

    assert!(!output.status.success());
}

#[test]
fn test_owned_paths_requires_a_package() {
    let output = Command::new(env!("CARGO_BIN_EXE_mia"))
        .arg("owned-paths")
        .output()
        .expect("Failed to execute mia");

    assert!(!output.status.success());
}

#[test]
fn test_run_without_plan_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("mia.toml");
    std::fs::write(
        &config,
        format!(
            "[paths]\nmanaged_install_dir = \"{}\"\n",
            dir.path().join("managed").display()
        ),
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_mia"))
        .arg("--config")
        .arg(&config)
        .arg("run")
        .output()
        .expect("Failed to execute mia");

    assert_eq!(output.status.code(), Some(0));
    let log = std::fs::read_to_string(
        dir.path()
            .join("managed/Logs/ManagedSoftwareUpdate.log"),
    )
    .unwrap();
    assert!(log.contains("### Beginning managed installer session ###"));
    assert!(log.contains("###    End managed installer session    ###"));
}
