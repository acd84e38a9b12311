//! Cluster directory scopes and data bags

use crate::types::identifiers::UnitId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// String-keyed bag of values held by one directory scope
pub type DataBag = BTreeMap<String, String>;

/// Addressable scope of the cluster directory.
///
/// A `Unit` bag is written only by that unit. The `Application` bag is
/// written only by the current leader. Every unit may read every bag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// Bag owned by a single unit
    Unit(UnitId),
    /// Cluster-wide bag owned by the leader
    Application,
}

impl Scope {
    /// True if `unit` owns this scope outright (application scope is leader-owned)
    pub fn is_owned_by(&self, unit: &UnitId) -> bool {
        matches!(self, Self::Unit(owner) if owner == unit)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(unit) => write!(f, "unit:{unit}"),
            Self::Application => f.write_str("application"),
        }
    }
}

/// Build a bag from string pairs
pub fn bag_from<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> DataBag {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
