//! External command execution
//!
//! Setup, teardown and the suite's long-running process all go through the
//! [`CommandRunner`] trait so the runner can be driven without a shell.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command as TokioCommand};

use crate::common::{Error, Result};
use crate::suite::ExecCommand;

/// Outcome of a command that ran to completion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit code; `None` when the command was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// A spawned long-running process
///
/// The process is killed when the guard is dropped.
#[derive(Debug, Default)]
pub struct ProcessGuard {
    child: Option<Child>,
}

impl ProcessGuard {
    pub fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    /// A guard that owns no process
    pub fn detached() -> Self {
        Self::default()
    }

    /// Kill the process and wait for it to exit
    pub async fn kill(mut self) {
        if let Some(mut child) = self.child.take() {
            let pid = child.id();
            match child.kill().await {
                Ok(()) => tracing::debug!(?pid, "Process stopped"),
                Err(e) => tracing::warn!(error = %e, "Could not stop process"),
            }
        }
    }
}

/// Runs external commands for a suite
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion and capture its output
    async fn run(&self, command: &ExecCommand) -> Result<CommandOutput>;

    /// Start a command in the background
    async fn spawn(&self, command: &ExecCommand) -> Result<ProcessGuard>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Default)]
pub struct ShellCommandRunner;

impl ShellCommandRunner {
    fn command(command: &ExecCommand) -> TokioCommand {
        let mut cmd = TokioCommand::new("sh");
        cmd.arg("-c").arg(&command.command).stdin(Stdio::null());
        for (name, value) in command.env.iter() {
            cmd.env(name, value);
        }
        if let Some(dir) = &command.dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &ExecCommand) -> Result<CommandOutput> {
        tracing::debug!(command = %command.command, "Running command");
        let output = Self::command(command)
            .output()
            .await
            .map_err(|e| Error::command_failed(&command.command, e.to_string()))?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn spawn(&self, command: &ExecCommand) -> Result<ProcessGuard> {
        tracing::debug!(command = %command.command, "Starting process");
        let child = Self::command(command)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::command_failed(&command.command, e.to_string()))?;
        tracing::info!(pid = ?child.id(), command = %command.command, "Process started");
        Ok(ProcessGuard::new(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::Bindings;

    #[tokio::test]
    async fn test_run_captures_output() {
        let out = ShellCommandRunner
            .run(&ExecCommand::shell("echo hello; echo oops >&2; exit 3"))
            .await
            .unwrap();
        assert_eq!(out.status, Some(3));
        assert!(!out.success());
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_run_with_env_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let command = ExecCommand {
            command: "echo \"$GREETING\"; pwd".into(),
            env: Bindings::from_iter([("GREETING", "hi")]),
            dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let out = ShellCommandRunner.run(&command).await.unwrap();
        assert!(out.success());
        let mut lines = out.stdout.lines();
        assert_eq!(lines.next(), Some("hi"));
        let pwd = std::path::PathBuf::from(lines.next().unwrap());
        assert_eq!(
            pwd.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_spawn_and_kill() {
        let guard = ShellCommandRunner
            .spawn(&ExecCommand::shell("sleep 30"))
            .await
            .unwrap();
        guard.kill().await;
        ProcessGuard::detached().kill().await;
    }
}
