//! Unit identifiers
//!
//! Units are named by the cluster as `<application>/<ordinal>`. The name is
//! opaque to the protocol; only the application prefix and a filesystem-safe
//! stem are derived from it.

use crate::{ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cluster-assigned unit name, e.g. `sshproxy/0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnitId(String);

impl UnitId {
    /// Parse and validate a unit name
    pub fn parse(name: &str) -> ProxyResult<Self> {
        let (app, ordinal) = name
            .split_once('/')
            .ok_or_else(|| ProxyError::invalid(format!("unit name '{name}' has no '/'")))?;

        if app.is_empty() || !app.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ProxyError::invalid(format!(
                "unit name '{name}' has an invalid application part"
            )));
        }
        if ordinal.is_empty() || !ordinal.chars().all(|c| c.is_ascii_digit()) {
            return Err(ProxyError::invalid(format!(
                "unit name '{name}' has an invalid ordinal"
            )));
        }

        Ok(Self(name.to_string()))
    }

    /// Convenience constructor for `<application>/<ordinal>`
    pub fn from_parts(application: &str, ordinal: u32) -> ProxyResult<Self> {
        Self::parse(&format!("{application}/{ordinal}"))
    }

    /// Application part of the unit name
    pub fn application(&self) -> &str {
        self.0.split_once('/').map_or(self.0.as_str(), |(app, _)| app)
    }

    /// Ordinal part of the unit name
    pub fn ordinal(&self) -> u32 {
        self.0
            .split_once('/')
            .and_then(|(_, n)| n.parse().ok())
            .unwrap_or_default()
    }

    /// Name with the separator replaced, usable as a file stem
    pub fn file_stem(&self) -> String {
        self.0.replace('/', "-")
    }

    /// Borrow the raw name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for UnitId {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UnitId {
    type Error = ProxyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UnitId> for String {
    fn from(id: UnitId) -> Self {
        id.0
    }
}
