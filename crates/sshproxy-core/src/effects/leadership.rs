//! Leadership effects
//!
//! The surrounding membership layer guarantees at most one leader at any
//! instant. Callers must query on every decision point: leadership can fail
//! over between two events, so a cached answer is never authoritative.

use crate::{ProxyError, ProxyResult};
use async_trait::async_trait;

/// Leader election as seen by the local unit
#[async_trait]
pub trait LeadershipEffects: Send + Sync {
    /// Whether the local unit is the elected leader right now
    async fn is_leader(&self) -> bool;

    /// Guard for state mutations exclusive to the leader
    async fn require_leader(&self) -> ProxyResult<()> {
        if self.is_leader().await {
            Ok(())
        } else {
            Err(ProxyError::NotLeader)
        }
    }
}
