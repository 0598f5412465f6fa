//! Command runner - invokes the external build and scan tools

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Error types for command execution
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting on '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of one command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code (-1 when killed by a signal)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for command execution - allows for different implementations
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a shell command with extra environment variables
    async fn run(
        &self,
        command: &str,
        env: &[(String, String)],
        workdir: Option<&str>,
    ) -> Result<CommandOutput, RunnerError>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different POSIX shell
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self { shell: shell.into() }
    }

    #[cfg(test)]
    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        env: &[(String, String)],
        workdir: Option<&str>,
    ) -> Result<CommandOutput, RunnerError> {
        debug!("Spawning {} -c {}", self.shell, command);

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own group, so a timeout can take down everything the shell started
        #[cfg(unix)]
        cmd.process_group(0);
        for (key, value) in env {
            cmd.env(key, value);
        }
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let group = ProcessGroupGuard::new(child.id());

        let output = child.wait_with_output().await.map_err(|source| RunnerError::Wait {
            command: command.to_string(),
            source,
        })?;
        group.disarm();

        let exit_code = output.status.code().unwrap_or(-1);
        // exit code alone decides success; tools may print any bytes
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if exit_code != 0 {
            warn!("'{}' exited with code {}: {}", command, exit_code, stderr.trim());
        }

        debug!("'{}' returned {} bytes of output", command, stdout.len());

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

/// Kills the process group of a running shell if its future is dropped
/// (stage timeout) before the shell exits
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    debug!("Killing process group {}", pgid);
    // SAFETY: killpg only sends a signal to the group created at spawn
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
        debug!("Process group {} already gone", pgid);
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

/// Prints commands instead of running them
#[derive(Debug, Clone, Default)]
pub struct DryRunRunner;

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(
        &self,
        command: &str,
        _env: &[(String, String)],
        _workdir: Option<&str>,
    ) -> Result<CommandOutput, RunnerError> {
        info!("[dry-run] {}", command);
        Ok(CommandOutput::success(format!("$ {}\n", command)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_shell() {
        assert_eq!(ShellRunner::default().shell(), "sh");
        assert_eq!(ShellRunner::with_shell("bash").shell(), "bash");
    }

    #[tokio::test]
    async fn test_run_echo() {
        let runner = ShellRunner::new();
        let output = runner.run("echo hello", &[], None).await.unwrap();
        assert!(output.is_success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_exit_code_captured() {
        let runner = ShellRunner::new();
        let output = runner.run("echo oops >&2; exit 3", &[], None).await.unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_env_exported() {
        let runner = ShellRunner::new();
        let env = vec![("BUILD_NUMBER".to_string(), "42".to_string())];
        let output = runner.run("echo $BUILD_NUMBER", &env, None).await.unwrap();
        assert_eq!(output.stdout.trim(), "42");
    }

    #[tokio::test]
    async fn test_non_utf8_stdout_is_not_an_error() {
        let runner = ShellRunner::new();
        let output = runner.run("printf '\\377ok'; exit 0", &[], None).await.unwrap();
        assert!(output.is_success());
        assert!(output.stdout.ends_with("ok"));
        assert!(output.stdout.starts_with('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_dropped_run_kills_background_children() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("survived");
        let command = format!("(sleep 2; touch {}) & wait", marker.display());

        let runner = ShellRunner::new();
        let result =
            tokio::time::timeout(Duration::from_millis(300), runner.run(&command, &[], None)).await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_dry_run_echoes_command() {
        let output = DryRunRunner.run("docker push x", &[], None).await.unwrap();
        assert!(output.is_success());
        assert_eq!(output.stdout, "$ docker push x\n");
    }

    #[tokio::test]
    async fn test_missing_shell() {
        let runner = ShellRunner::with_shell("nonexistent-shell-binary");
        let result = runner.run("true", &[], None).await;
        assert!(matches!(result, Err(RunnerError::Spawn { .. })));
    }
}
