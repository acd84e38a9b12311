//! TOML configuration for one unit
//!
//! A missing file yields the defaults. Validation reports every bad field
//! at once.

use serde::{Deserialize, Serialize};
use sshproxy_core::{RemoteTarget, UnitId};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration:\n{}", format_errors(.0))]
    Invalid(Vec<ConfigValidationError>),
}

fn format_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    pub field: String,
    pub error: String,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}

/// How the unit learns whether it leads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaderSource {
    /// Leader named in `<directory_dir>/leader`
    #[default]
    File,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitSection {
    pub name: String,
    pub state_dir: PathBuf,
    pub directory_dir: PathBuf,
    pub leader: LeaderSource,
}

impl Default for UnitSection {
    fn default() -> Self {
        Self {
            name: "sshproxy/0".to_string(),
            state_dir: PathBuf::from(".sshproxy/state"),
            directory_dir: PathBuf::from(".sshproxy/cluster"),
            leader: LeaderSource::File,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSection {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            username: String::new(),
            password: String::new(),
            port: sshproxy_core::types::remote::DEFAULT_SSH_PORT,
            connect_timeout_secs: 10,
            command_timeout_secs: 300,
        }
    }
}

impl fmt::Debug for SshSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSection")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub unit: UnitSection,
    pub ssh: SshSection,
    pub log: LogSection,
}

impl ProxyConfig {
    /// Load and validate `path`; a missing file gives the defaults
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match tokio::fs::read_to_string(path).await {
            Ok(contents) => Self::parse(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };

        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = vec![];
        let mut push = |field: &str, error: String| {
            errors.push(ConfigValidationError {
                field: field.to_string(),
                error,
            });
        };

        if let Err(e) = UnitId::parse(&self.unit.name) {
            push("unit.name", e.to_string());
        }
        if self.unit.state_dir.as_os_str().is_empty() {
            push("unit.state_dir", "State directory cannot be empty".to_string());
        }
        if self.unit.directory_dir.as_os_str().is_empty() {
            push(
                "unit.directory_dir",
                "Directory path cannot be empty".to_string(),
            );
        }
        if self.ssh.port == 0 {
            push("ssh.port", "Port must be between 1 and 65535".to_string());
        }
        if !(1..=300).contains(&self.ssh.connect_timeout_secs) {
            push(
                "ssh.connect_timeout_secs",
                "Connect timeout must be between 1 and 300 seconds".to_string(),
            );
        }
        if self.ssh.command_timeout_secs == 0 {
            push(
                "ssh.command_timeout_secs",
                "Command timeout must be positive".to_string(),
            );
        }
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            push(
                "log.level",
                format!("Log level must be one of: {}", LOG_LEVELS.join(", ")),
            );
        }

        errors
    }

    /// Validated unit name
    pub fn unit_id(&self) -> Result<UnitId, ConfigError> {
        UnitId::parse(&self.unit.name).map_err(|e| {
            ConfigError::Invalid(vec![ConfigValidationError {
                field: "unit.name".to_string(),
                error: e.to_string(),
            }])
        })
    }

    pub fn remote_target(&self) -> RemoteTarget {
        let mut target = RemoteTarget::new(&self.ssh.hostname, &self.ssh.username)
            .with_password(&self.ssh.password);
        target.port = self.ssh.port;
        target
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.ssh.command_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn full_file_parses() {
        let config = ProxyConfig::parse(
            r#"
            [unit]
            name = "proxy/2"
            state_dir = "/var/lib/sshproxy"
            directory_dir = "/srv/cluster"
            leader = "always"

            [ssh]
            hostname = "10.0.0.5"
            username = "ubuntu"
            password = "secret"
            port = 2222

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.unit.leader, LeaderSource::Always);
        assert_eq!(config.unit_id().unwrap().ordinal(), 2);
        let target = config.remote_target();
        assert_eq!(target.port, 2222);
        assert!(target.has_password());
        assert!(config.validate().is_empty());
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = ProxyConfig::parse("[ssh]\nhostname = \"h\"\n").unwrap();
        assert_eq!(config.unit, UnitSection::default());
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.ssh.hostname, "h");
    }

    #[test]
    fn validation_collects_every_error() {
        let mut config = ProxyConfig::default();
        config.unit.name = "no-ordinal".to_string();
        config.ssh.port = 0;
        config.log.level = "loud".to_string();

        let fields: Vec<_> = config.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["unit.name", "ssh.port", "log.level"]);
    }

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProxyConfig::load(&dir.path().join("absent.toml"))
            .await
            .unwrap();
        assert_eq!(config, ProxyConfig::default());
    }

    #[tokio::test]
    async fn invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[log]\nlevel = \"loud\"\n")
            .await
            .unwrap();

        assert_matches!(
            ProxyConfig::load(&path).await,
            Err(ConfigError::Invalid(errors)) if errors.len() == 1
        );
    }
}
