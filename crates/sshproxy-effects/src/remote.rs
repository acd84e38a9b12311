//! Remote executor backed by the system `ssh` client
//!
//! Each call spawns one `ssh` process authenticated with the unit's identity
//! file. When the target carries a password the command is wrapped in
//! `sshpass -e`, which reads the password from the environment rather than
//! the argument list.

use async_trait::async_trait;
use sshproxy_core::effects::RemoteExecutorEffects;
use sshproxy_core::{CommandOutput, ProxyError, ProxyResult, RemoteTarget};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Exit status `ssh` uses for connection and authentication failures
const SSH_FAILURE_STATUS: i32 = 255;

/// Command run to prove a session can be opened
const VERIFY_COMMAND: &str = "true";

/// Runs remote commands through the `ssh` client
#[derive(Debug, Clone)]
pub struct SshCommandExecutor {
    identity_file: PathBuf,
    ssh_program: PathBuf,
    sshpass_program: PathBuf,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl SshCommandExecutor {
    /// Executor authenticating with `identity_file`
    pub fn new(identity_file: impl Into<PathBuf>) -> Self {
        Self {
            identity_file: identity_file.into(),
            ssh_program: PathBuf::from("ssh"),
            sshpass_program: PathBuf::from("sshpass"),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(300),
        }
    }

    /// Timeout for opening the connection
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Timeout for a whole command
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Use another `ssh` binary
    pub fn with_ssh_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ssh_program = program.into();
        self
    }

    /// Arguments passed to `ssh` for `target` and `command`
    pub fn ssh_args(&self, target: &RemoteTarget, command: &str) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            self.identity_file.display().to_string(),
            "-p".to_string(),
            target.port.to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if target.has_password() {
            args.push("-o".to_string());
            args.push("PreferredAuthentications=publickey,password".to_string());
        } else {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }
        args.push(format!("{}@{}", target.username, target.hostname));
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    fn command(&self, target: &RemoteTarget, command: &str) -> Command {
        let args = self.ssh_args(target, command);
        let mut cmd = if target.has_password() {
            let mut cmd = Command::new(&self.sshpass_program);
            cmd.arg("-e").arg(&self.ssh_program).env("SSHPASS", &target.password);
            cmd
        } else {
            Command::new(&self.ssh_program)
        };
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl RemoteExecutorEffects for SshCommandExecutor {
    async fn run(&self, target: &RemoteTarget, command: &str) -> ProxyResult<CommandOutput> {
        if let Some(field) = target.missing_field() {
            return Err(ProxyError::invalid(format!("{field} is not configured")));
        }

        tracing::debug!(host = %target.hostname, user = %target.username, command, "Running remote command");
        let mut cmd = self.command(target, command);
        let output = tokio::time::timeout(self.command_timeout, cmd.output())
            .await
            .map_err(|_| {
                ProxyError::remote(format!(
                    "command timed out after {}s",
                    self.command_timeout.as_secs()
                ))
            })?
            .map_err(|e| ProxyError::remote(format!("failed to spawn ssh: {e}")))?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_status: output.status.code(),
        })
    }

    async fn verify_credentials(&self, target: &RemoteTarget) -> ProxyResult<bool> {
        let output = self.run(target, VERIFY_COMMAND).await?;
        match output.exit_status {
            Some(0) => Ok(true),
            Some(SSH_FAILURE_STATUS) => {
                tracing::info!(host = %target.hostname, stderr = %output.stderr.trim(), "SSH authentication rejected");
                Ok(false)
            }
            other => Err(ProxyError::remote(format!(
                "unexpected exit status {other:?} while verifying credentials"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_only_targets_use_batch_mode() {
        let executor = SshCommandExecutor::new("/state/ssh/id_ed25519");
        let args = executor.ssh_args(&RemoteTarget::new("10.0.0.5", "ubuntu"), "uptime");

        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"ubuntu@10.0.0.5".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("uptime"));
        assert_eq!(args[1], "/state/ssh/id_ed25519");
    }

    #[test]
    fn password_targets_allow_password_auth_without_leaking_it() {
        let executor = SshCommandExecutor::new("/id");
        let target = RemoteTarget::new("h", "u").with_password("hunter2");
        let args = executor.ssh_args(&target, "true");

        assert!(args.contains(&"PreferredAuthentications=publickey,password".to_string()));
        assert!(!args.iter().any(|a| a.contains("hunter2")));
    }

    #[tokio::test]
    async fn unconfigured_target_is_rejected_before_spawning() {
        let executor = SshCommandExecutor::new("/id").with_ssh_program("/nonexistent/ssh");
        let err = executor
            .run(&RemoteTarget::default(), "true")
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Invalid { .. }));
    }

    #[tokio::test]
    async fn missing_ssh_binary_is_a_remote_error() {
        let executor = SshCommandExecutor::new("/id").with_ssh_program("/nonexistent/ssh");
        let err = executor
            .verify_credentials(&RemoteTarget::new("h", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Remote { .. }));
    }
}
