//! Unified error system for sshproxy
//!
//! A single error type shared by every layer. Coordination conditions that are
//! expected to resolve themselves (no leadership yet, cluster not initialized)
//! are modelled separately: `NotLeader` is converted to a status at every
//! leader-gated boundary, and "not initialized" is a deferral, not an error.

use serde::{Deserialize, Serialize};

/// Unified error type for all sshproxy operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ProxyError {
    /// The local unit is not the elected leader
    #[error("not leader")]
    NotLeader,

    /// Local key material was requested before generation or adoption
    #[error("no SSH key present on this unit")]
    NoKey,

    /// Underlying crypto or OS failure while generating a keypair
    #[error("Key generation failed: {message}")]
    KeyGeneration {
        /// Error message describing the generation failure
        message: String,
    },

    /// A published key differs from the key this unit already holds
    #[error("Key conflict: {message}")]
    KeyConflict {
        /// Error message describing the conflicting material
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Write outside the caller's directory scope
    #[error("Permission denied: {message}")]
    PermissionDenied {
        /// Error message describing the permission issue
        message: String,
    },

    /// Local storage operation failed
    #[error("Storage error: {message}")]
    Storage {
        /// Error message describing the storage failure
        message: String,
    },

    /// Cluster directory read or write failed
    #[error("Directory error: {message}")]
    Directory {
        /// Error message describing the directory failure
        message: String,
    },

    /// Remote command execution failed
    #[error("Remote error: {message}")]
    Remote {
        /// Error message describing the remote failure
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl ProxyError {
    /// Create a key generation error
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }

    /// Create a key conflict error
    pub fn key_conflict(message: impl Into<String>) -> Self {
        Self::KeyConflict {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a directory error
    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
        }
    }

    /// Create a remote execution error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for the expected, recoverable "not the leader" condition
    pub fn is_not_leader(&self) -> bool {
        matches!(self, Self::NotLeader)
    }

    /// True for errors that must put the unit into a Blocked state
    pub fn blocks_unit(&self) -> bool {
        !self.is_not_leader()
    }
}

/// Standard Result type for sshproxy operations
pub type ProxyResult<T> = std::result::Result<T, ProxyError>;

impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(err.to_string()),
            _ => Self::storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_error_creation() {
        let err = ProxyError::invalid("test message");
        assert!(matches!(err, ProxyError::Invalid { .. }));
        assert_eq!(err.to_string(), "Invalid: test message");
    }

    #[test]
    fn test_not_leader_message() {
        assert_eq!(ProxyError::NotLeader.to_string(), "not leader");
        assert!(ProxyError::NotLeader.is_not_leader());
        assert!(!ProxyError::NotLeader.blocks_unit());
        assert!(ProxyError::key_conflict("x").blocks_unit());
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ProxyError::from(io_err);
        assert_matches!(err, ProxyError::PermissionDenied { .. });

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_matches!(ProxyError::from(io_err), ProxyError::Storage { .. });
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        assert_matches!(ProxyError::from(json_err), ProxyError::Serialization { .. });
    }
}
