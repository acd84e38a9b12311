//! In-memory storage handler

use async_trait::async_trait;
use sshproxy_core::effects::StorageEffects;
use sshproxy_core::ProxyResult;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage handler; clones share the same map
#[derive(Debug, Clone, Default)]
pub struct MemoryStorageHandler {
    data: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorageHandler {
    /// Create a new memory storage handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl StorageEffects for MemoryStorageHandler {
    async fn store(&self, key: &str, value: Vec<u8>) -> ProxyResult<()> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), value);
        Ok(())
    }

    async fn retrieve(&self, key: &str) -> ProxyResult<Option<Vec<u8>>> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> ProxyResult<bool> {
        let mut data = self.data.write().await;
        Ok(data.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> ProxyResult<bool> {
        let data = self.data.read().await;
        Ok(data.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clones_share_state() {
        let a = MemoryStorageHandler::new();
        let b = a.clone();
        a.store("k", b"v".to_vec()).await.unwrap();
        assert_eq!(b.retrieve("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(b.remove("k").await.unwrap());
        assert!(!a.exists("k").await.unwrap());
        assert!(a.is_empty().await);
    }
}
