//! Operator actions
//!
//! Actions form a closed set with fixed parameter schemas. Every action is
//! leader-only. Failures, including `NotLeader`, are reported in the
//! [`ActionOutcome`] rather than returned as errors; no action leaves the
//! unit's bootstrap state half-changed.

use crate::bootstrap::BootstrapCoordinator;
use serde::Serialize;
use serde_json::{Map, Value};
use sshproxy_core::effects::UnitEffects;
use sshproxy_core::{CommandOutput, ProxyError, ProxyResult};
use std::collections::BTreeMap;

/// Name, parameters, and summary of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSchema {
    /// Name the action is invoked by
    pub name: &'static str,
    /// Accepted parameters, all required
    pub params: &'static [&'static str],
    /// One-line help text
    pub description: &'static str,
}

/// Every action a unit accepts
pub const ACTION_SCHEMAS: &[ActionSchema] = &[
    ActionSchema {
        name: "generate-ssh-key",
        params: &[],
        description: "Ensure the cluster SSH key exists and is published",
    },
    ActionSchema {
        name: "get-ssh-public-key",
        params: &[],
        description: "Return the cluster SSH public key",
    },
    ActionSchema {
        name: "run",
        params: &["command"],
        description: "Run a command on the remote host",
    },
    ActionSchema {
        name: "verify-ssh-credentials",
        params: &[],
        description: "Check that the configured credentials open a session",
    },
    ActionSchema {
        name: "touch",
        params: &["filename"],
        description: "Create or update a file on the remote host",
    },
    ActionSchema {
        name: "reboot",
        params: &[],
        description: "Reboot the remote host",
    },
];

/// A validated action invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Ensure the cluster key exists and report its fingerprint
    GenerateSshKey,
    /// Return the local public key line
    GetSshPublicKey,
    /// Run a command on the remote host
    Run {
        /// Shell command line
        command: String,
    },
    /// Open a test session with the configured credentials
    VerifySshCredentials,
    /// Create or update a file on the remote host
    Touch {
        /// Remote path, passed to `touch` quoted
        filename: String,
    },
    /// Reboot the remote host
    Reboot,
}

impl Action {
    /// Parse an action invocation, rejecting unknown names and parameters
    pub fn parse(name: &str, params: &Map<String, Value>) -> ProxyResult<Self> {
        let schema = ACTION_SCHEMAS
            .iter()
            .find(|schema| schema.name == name)
            .ok_or_else(|| ProxyError::invalid(format!("unknown action '{name}'")))?;

        if let Some(unexpected) = params
            .keys()
            .find(|key| !schema.params.contains(&key.as_str()))
        {
            return Err(ProxyError::invalid(format!(
                "action '{name}' does not take parameter '{unexpected}'"
            )));
        }

        Ok(match name {
            "generate-ssh-key" => Self::GenerateSshKey,
            "get-ssh-public-key" => Self::GetSshPublicKey,
            "run" => Self::Run {
                command: string_param(params, "command")?,
            },
            "verify-ssh-credentials" => Self::VerifySshCredentials,
            "touch" => Self::Touch {
                filename: string_param(params, "filename")?,
            },
            _ => Self::Reboot,
        })
    }

    /// Name the action is invoked by
    pub fn name(&self) -> &'static str {
        match self {
            Self::GenerateSshKey => "generate-ssh-key",
            Self::GetSshPublicKey => "get-ssh-public-key",
            Self::Run { .. } => "run",
            Self::VerifySshCredentials => "verify-ssh-credentials",
            Self::Touch { .. } => "touch",
            Self::Reboot => "reboot",
        }
    }
}

fn string_param(params: &Map<String, Value>, key: &str) -> ProxyResult<String> {
    match params.get(key) {
        Some(Value::String(value)) if !value.is_empty() => Ok(value.clone()),
        Some(Value::String(_)) => Err(ProxyError::invalid(format!("parameter '{key}' is empty"))),
        Some(_) => Err(ProxyError::invalid(format!(
            "parameter '{key}' must be a string"
        ))),
        None => Err(ProxyError::invalid(format!("missing parameter '{key}'"))),
    }
}

/// Quote `arg` for a POSIX shell
fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Results of one action invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionOutcome {
    /// Named results, also set on failure when partial output exists
    pub results: BTreeMap<String, Value>,
    /// Failure message; `None` when the action succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ActionOutcome {
    /// Outcome of an action that failed before producing results
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            results: BTreeMap::new(),
            failure: Some(message.into()),
        }
    }

    /// Whether the command or action succeeded
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    fn with_result(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.results.insert(key.to_string(), value.into());
        self
    }

    // Remote stderr fails the action but keeps whatever was captured.
    fn from_command(output: CommandOutput) -> Self {
        let mut outcome = Self::default().with_result("output", output.stdout);
        if !output.stderr.is_empty() {
            outcome.failure = Some(output.stderr);
        }
        outcome
    }
}

/// Executes actions against one unit
pub struct ActionHandler<'a, E: UnitEffects> {
    coordinator: &'a BootstrapCoordinator<E>,
}

impl<'a, E: UnitEffects> ActionHandler<'a, E> {
    /// Handler running actions through `coordinator`
    pub fn new(coordinator: &'a BootstrapCoordinator<E>) -> Self {
        Self { coordinator }
    }

    /// Run `action` if this unit leads. Errors become the outcome's failure.
    pub async fn execute(&self, action: &Action) -> ActionOutcome {
        let effects = self.coordinator.effect_system();
        let result = match effects.require_leader().await {
            Ok(()) => self.dispatch(action).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                tracing::info!(action = action.name(), success = outcome.is_success(), "Action finished");
                outcome
            }
            Err(e) => {
                tracing::warn!(action = action.name(), error = %e, "Action failed");
                ActionOutcome::failed(e.to_string())
            }
        }
    }

    async fn dispatch(&self, action: &Action) -> ProxyResult<ActionOutcome> {
        let effects = self.coordinator.effect_system();
        match action {
            Action::GenerateSshKey => {
                let keypair = self.coordinator.ensure_cluster_key().await?;
                Ok(ActionOutcome::default().with_result("fingerprint", keypair.fingerprint()))
            }
            Action::GetSshPublicKey => {
                let public = self.coordinator.identity().public_key().await?;
                let line = String::from_utf8(public)
                    .map_err(|e| ProxyError::invalid(format!("public key is not UTF-8: {e}")))?;
                Ok(ActionOutcome::default().with_result("pubkey", line.trim_end()))
            }
            Action::Run { command } => {
                let target = effects.remote_target().await?;
                Ok(ActionOutcome::from_command(
                    effects.run(&target, command).await?,
                ))
            }
            Action::VerifySshCredentials => {
                let target = effects.remote_target().await?;
                let verified = effects.verify_credentials(&target).await?;
                Ok(ActionOutcome::default().with_result("verified", verified))
            }
            Action::Touch { filename } => {
                let target = effects.remote_target().await?;
                let output = effects
                    .run(&target, &format!("touch {}", shell_quote(filename)))
                    .await?;
                Ok(ActionOutcome::from_command(output))
            }
            Action::Reboot => {
                let target = effects.remote_target().await?;
                Ok(ActionOutcome::from_command(
                    effects.run(&target, "sudo reboot").await?,
                ))
            }
        }
    }
}
