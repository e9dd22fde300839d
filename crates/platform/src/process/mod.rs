//! Process execution shared by the command-backed collaborators

use mia_errors::PlatformError;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// A system tool invocation with stdin closed and output captured
#[derive(Debug, Clone)]
pub struct PlatformCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl PlatformCommand {
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Command line for error messages
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_tokio(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        command
    }
}

/// Output from command execution
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        exit_code(self.status)
    }

    #[must_use]
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Exit code of a finished process; termination by signal reports -1
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Run a command to completion, capturing its output
///
/// # Errors
///
/// Returns an error when the process cannot be spawned. A non-zero exit is
/// not an error here; callers inspect [`CommandOutput::exit_code`].
pub async fn execute(cmd: &PlatformCommand) -> Result<CommandOutput, PlatformError> {
    let output = cmd.to_tokio().output().await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PlatformError::CommandNotFound {
                command: cmd.program.clone(),
            }
        } else {
            PlatformError::ProcessExecutionFailed {
                command: cmd.display(),
                message: e.to_string(),
            }
        }
    })?;

    Ok(CommandOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Run a command and require a zero exit status
///
/// # Errors
///
/// Returns an error when the process cannot be spawned or exits non-zero.
pub async fn execute_checked(cmd: &PlatformCommand) -> Result<CommandOutput, PlatformError> {
    let output = execute(cmd).await?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(PlatformError::ProcessExecutionFailed {
            command: cmd.display(),
            message: format!(
                "exit status {}: {}",
                output.exit_code(),
                output.stderr_text()
            ),
        })
    }
}
