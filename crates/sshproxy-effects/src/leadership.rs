//! Leadership effect handlers
//!
//! Neither handler caches: every `is_leader` call reflects the current
//! answer of its source.

use async_trait::async_trait;
use sshproxy_core::effects::LeadershipEffects;
use sshproxy_core::UnitId;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::fs;

/// Leadership fixed by configuration, switchable at runtime
#[derive(Debug, Clone)]
pub struct StaticLeadershipHandler {
    leader: Arc<AtomicBool>,
}

impl StaticLeadershipHandler {
    /// Handler that always answers `leader`
    pub fn new(leader: bool) -> Self {
        Self {
            leader: Arc::new(AtomicBool::new(leader)),
        }
    }

    /// Change the reported leadership
    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }
}

#[async_trait]
impl LeadershipEffects for StaticLeadershipHandler {
    async fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }
}

/// Leadership read from a file naming the current leader unit.
///
/// The membership layer (or an operator) rewrites the file on failover.
/// A missing or unreadable file means nobody leads.
#[derive(Debug, Clone)]
pub struct FileLeadershipHandler {
    path: PathBuf,
    local_unit: UnitId,
}

impl FileLeadershipHandler {
    /// Leadership read from the unit id stored at `path`
    pub fn new(path: impl Into<PathBuf>, local_unit: UnitId) -> Self {
        Self {
            path: path.into(),
            local_unit,
        }
    }

    /// Unit named in the leader file, if any
    pub async fn current_leader(&self) -> Option<UnitId> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => UnitId::parse(contents.trim()).ok(),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to read leader file");
                }
                None
            }
        }
    }
}

#[async_trait]
impl LeadershipEffects for FileLeadershipHandler {
    async fn is_leader(&self) -> bool {
        self.current_leader().await.as_ref() == Some(&self.local_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshproxy_core::ProxyError;

    #[tokio::test]
    async fn static_handler_reflects_updates() {
        let gate = StaticLeadershipHandler::new(false);
        assert!(!gate.is_leader().await);
        assert_eq!(gate.require_leader().await, Err(ProxyError::NotLeader));
        gate.set_leader(true);
        assert!(gate.require_leader().await.is_ok());
    }

    #[tokio::test]
    async fn file_handler_rereads_on_every_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leader");
        let unit = UnitId::parse("sshproxy/0").unwrap();
        let gate = FileLeadershipHandler::new(&path, unit);

        assert!(!gate.is_leader().await);
        std::fs::write(&path, "sshproxy/0\n").unwrap();
        assert!(gate.is_leader().await);
        std::fs::write(&path, "sshproxy/1").unwrap();
        assert!(!gate.is_leader().await);
    }
}
