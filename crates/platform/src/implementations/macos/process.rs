//! macOS script, process list and power assertion implementations

use async_trait::async_trait;
use mia_errors::PlatformError;
use mia_types::EmbeddedScript;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::power::{SleepAssertion, SleepPreventer};
use crate::process::{execute, execute_checked, CommandOutput, PlatformCommand};
use crate::processes::ProcessInspector;
use crate::scripts::ScriptRunner;

/// Runs scripts as child processes and logs their output
pub struct MacOSScriptRunner;

impl MacOSScriptRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MacOSScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn log_output(item_name: &str, label: &str, output: &CommandOutput) {
    for line in output.stdout_text().lines() {
        tracing::info!(item = item_name, script = label, "{line}");
    }
    for line in output.stderr_text().lines() {
        tracing::warn!(item = item_name, script = label, "{line}");
    }
}

#[async_trait]
impl ScriptRunner for MacOSScriptRunner {
    async fn run_embedded(
        &self,
        item_name: &str,
        script: &EmbeddedScript,
    ) -> Result<i32, PlatformError> {
        let label = script.kind.label();
        let io_error = |e: std::io::Error| PlatformError::FilesystemOperationFailed {
            operation: format!("write {label} for {item_name}"),
            message: e.to_string(),
        };

        let mut file = tempfile::Builder::new()
            .prefix(&format!("mia-{label}-"))
            .tempfile()
            .map_err(io_error)?;
        file.write_all(script.body.as_bytes()).map_err(io_error)?;
        // The handle must be closed before exec or the kernel reports ETXTBSY
        let path = file.into_temp_path();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700))
            .map_err(io_error)?;

        let output = execute(&PlatformCommand::new(&path.to_string_lossy())).await?;
        log_output(item_name, label, &output);
        Ok(output.exit_code())
    }

    async fn run_executable(&self, item_name: &str, path: &Path) -> Result<i32, PlatformError> {
        let output = execute(&PlatformCommand::new(&path.to_string_lossy())).await?;
        log_output(item_name, "uninstall_script", &output);
        Ok(output.exit_code())
    }
}

/// Reads the process table through `ps`
pub struct MacOSProcessInspector;

impl MacOSProcessInspector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MacOSProcessInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessInspector for MacOSProcessInspector {
    async fn running_processes(&self) -> Result<Vec<String>, PlatformError> {
        let mut cmd = PlatformCommand::new("/bin/ps");
        cmd.args(["-axo", "comm="]);
        let output = execute_checked(&cmd).await?;
        Ok(output
            .stdout_text()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Holds an idle-sleep assertion through a `caffeinate` child
pub struct MacOSSleepPreventer;

impl MacOSSleepPreventer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MacOSSleepPreventer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SleepPreventer for MacOSSleepPreventer {
    async fn prevent_sleep(&self, reason: &str) -> Result<SleepAssertion, PlatformError> {
        let child = Command::new("/usr/bin/caffeinate")
            .arg("-i")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PlatformError::ProcessExecutionFailed {
                command: "caffeinate -i".to_string(),
                message: format!("{reason}: {e}"),
            })?;
        Ok(SleepAssertion::from_child(child))
    }
}
