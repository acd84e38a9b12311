//! Hook events and handler outcomes

use crate::types::identifiers::UnitId;
use crate::{ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A lifecycle or relation notification delivered to one unit.
///
/// Notifications for a unit are processed strictly one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HookEvent {
    /// The unit was installed
    Install,
    /// The unit software was upgraded
    Upgrade,
    /// Operator configuration changed
    ConfigChanged,
    /// This unit became leader
    LeaderElected,
    /// Some bag in the peer relation changed
    PeerRelationChanged {
        /// Unit whose write triggered the notification, when known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remote_unit: Option<UnitId>,
    },
}

impl HookEvent {
    /// Relation change with no known origin
    pub fn relation_changed() -> Self {
        Self::PeerRelationChanged { remote_unit: None }
    }

    /// Relation change written by `unit`
    pub fn relation_changed_by(unit: UnitId) -> Self {
        Self::PeerRelationChanged {
            remote_unit: Some(unit),
        }
    }

    /// Hook name as used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Upgrade => "upgrade",
            Self::ConfigChanged => "config-changed",
            Self::LeaderElected => "leader-elected",
            Self::PeerRelationChanged { .. } => "relation-changed",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HookEvent {
    type Err = ProxyError;

    fn from_str(s: &str) -> ProxyResult<Self> {
        match s {
            "install" => Ok(Self::Install),
            "upgrade" | "upgrade-charm" => Ok(Self::Upgrade),
            "config-changed" => Ok(Self::ConfigChanged),
            "leader-elected" => Ok(Self::LeaderElected),
            "relation-changed" | "proxypeer-relation-changed" => Ok(Self::relation_changed()),
            other => Err(ProxyError::invalid(format!("unknown hook '{other}'"))),
        }
    }
}

/// Result of handling one notification.
///
/// `Deferred` is not a failure: it asks the runtime to deliver the same
/// notification again on a later tick because preconditions are not met yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The event was fully processed
    Handled,
    /// Processing failed with an error
    Failed(ProxyError),
    /// Preconditions are not met yet; deliver again later
    Deferred,
}

impl HandlerOutcome {
    /// Whether the event was handled
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled)
    }

    /// Whether the event must be redelivered
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }

    /// The error of a `Failed` outcome
    pub fn error(&self) -> Option<&ProxyError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProxyResult<HandlerOutcome>> for HandlerOutcome {
    fn from(result: ProxyResult<HandlerOutcome>) -> Self {
        result.unwrap_or_else(Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hook_names() {
        assert_eq!("install".parse::<HookEvent>().unwrap(), HookEvent::Install);
        assert_eq!(
            "upgrade-charm".parse::<HookEvent>().unwrap(),
            HookEvent::Upgrade
        );
        assert_eq!(
            "relation-changed".parse::<HookEvent>().unwrap(),
            HookEvent::relation_changed()
        );
        assert!("stop".parse::<HookEvent>().is_err());
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for event in [
            HookEvent::Install,
            HookEvent::Upgrade,
            HookEvent::ConfigChanged,
            HookEvent::LeaderElected,
            HookEvent::relation_changed(),
        ] {
            assert_eq!(event.name().parse::<HookEvent>().unwrap(), event);
        }
    }

    #[test]
    fn failed_result_becomes_failed_outcome() {
        let outcome: HandlerOutcome = Err(ProxyError::NoKey).into();
        assert_eq!(outcome.error(), Some(&ProxyError::NoKey));
        assert!(!outcome.is_deferred());
    }
}
