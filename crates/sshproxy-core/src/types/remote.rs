//! Remote target configuration and command results

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Host and credentials of the machine the proxy manages
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTarget {
    /// Remote host name or address
    pub hostname: String,
    /// Login user
    pub username: String,
    /// Empty when only key authentication is used
    #[serde(default)]
    pub password: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl RemoteTarget {
    /// Target on the default SSH port without a password
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            password: String::new(),
            port: DEFAULT_SSH_PORT,
        }
    }

    /// Authenticate with `password` as well
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// First required field that is not configured
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.hostname.trim().is_empty() {
            Some("ssh-hostname")
        } else if self.username.trim().is_empty() {
            Some("ssh-username")
        } else {
            None
        }
    }

    /// Whether password authentication is configured
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }
}

impl Default for RemoteTarget {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl fmt::Debug for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTarget")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &if self.has_password() { "<set>" } else { "<unset>" })
            .field("port", &self.port)
            .finish()
    }
}

/// Output of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit status, `None` when the process was killed by a signal
    pub exit_status: Option<i32>,
}

impl CommandOutput {
    /// Exit status 0 with `stdout` and no stderr
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_status: Some(0),
        }
    }

    /// Whether the command or action succeeded
    pub fn is_success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_reported_in_order() {
        assert_eq!(RemoteTarget::default().missing_field(), Some("ssh-hostname"));
        assert_eq!(
            RemoteTarget::new("host", " ").missing_field(),
            Some("ssh-username")
        );
        assert_eq!(RemoteTarget::new("host", "ubuntu").missing_field(), None);
    }

    #[test]
    fn debug_hides_password() {
        let target = RemoteTarget::new("h", "u").with_password("hunter2");
        assert!(!format!("{target:?}").contains("hunter2"));
    }
}
