//! Unit status surface

use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally visible status of a unit; each value replaces the previous one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "kebab-case")]
pub enum UnitStatus {
    /// Unit is ready and credentials verified
    Active,
    /// Unit is waiting on something outside its control
    Waiting(String),
    /// Unit cannot proceed until an operator intervenes
    Blocked(String),
    /// Unit is performing local work
    Maintenance(String),
}

impl UnitStatus {
    /// `Waiting` with a reason
    pub fn waiting(reason: impl Into<String>) -> Self {
        Self::Waiting(reason.into())
    }

    /// `Blocked` with a reason
    pub fn blocked(reason: impl Into<String>) -> Self {
        Self::Blocked(reason.into())
    }

    /// `Maintenance` with a reason
    pub fn maintenance(reason: impl Into<String>) -> Self {
        Self::Maintenance(reason.into())
    }

    /// Short state name: `active`, `waiting`, `blocked`, `maintenance`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Waiting(_) => "waiting",
            Self::Blocked(_) => "blocked",
            Self::Maintenance(_) => "maintenance",
        }
    }

    /// Status message; empty for `Active`
    pub fn message(&self) -> &str {
        match self {
            Self::Active => "",
            Self::Waiting(m) | Self::Blocked(m) | Self::Maintenance(m) => m,
        }
    }

    /// Whether the unit is active
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether the unit is blocked
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            other => write!(f, "{}: {}", other.name(), other.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        assert_eq!(UnitStatus::Active.to_string(), "active");
        assert_eq!(
            UnitStatus::blocked("Invalid SSH credentials.").to_string(),
            "blocked: Invalid SSH credentials."
        );
    }

    #[test]
    fn serializes_with_state_tag() {
        let json = serde_json::to_string(&UnitStatus::waiting("later")).unwrap();
        assert_eq!(json, r#"{"state":"waiting","message":"later"}"#);
        let back: UnitStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, UnitStatus::waiting("later"));
    }
}
