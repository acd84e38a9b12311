//! Configuration effects

use crate::types::RemoteTarget;
use crate::ProxyResult;
use async_trait::async_trait;

/// Operator configuration
#[async_trait]
pub trait ConfigEffects: Send + Sync {
    /// Currently configured remote target; re-read on every reconcile
    async fn remote_target(&self) -> ProxyResult<RemoteTarget>;
}
