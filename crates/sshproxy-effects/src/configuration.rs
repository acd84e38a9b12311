//! Static configuration handler
//!
//! Holds the remote target loaded once per process from the config file.
//! The value can be replaced, which is how a long-lived process applies a
//! config change before delivering `config-changed`.

use async_trait::async_trait;
use sshproxy_core::effects::ConfigEffects;
use sshproxy_core::{ProxyResult, RemoteTarget};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Configuration held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticConfigHandler {
    target: Arc<RwLock<RemoteTarget>>,
}

impl StaticConfigHandler {
    /// Handler serving `target`
    pub fn new(target: RemoteTarget) -> Self {
        Self {
            target: Arc::new(RwLock::new(target)),
        }
    }

    /// Replace the configured target
    pub async fn replace(&self, target: RemoteTarget) {
        *self.target.write().await = target;
    }
}

#[async_trait]
impl ConfigEffects for StaticConfigHandler {
    async fn remote_target(&self) -> ProxyResult<RemoteTarget> {
        Ok(self.target.read().await.clone())
    }
}
