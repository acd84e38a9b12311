//! Local persistent storage effects
//!
//! Unit-private state: key material, the bootstrap record, the deferred
//! event queue and the last reported status.

use crate::ProxyResult;
use async_trait::async_trait;

/// Unit-private key-value storage
#[async_trait]
pub trait StorageEffects: Send + Sync {
    async fn store(&self, key: &str, value: Vec<u8>) -> ProxyResult<()>;

    async fn retrieve(&self, key: &str) -> ProxyResult<Option<Vec<u8>>>;

    /// Remove `key`, returning whether it existed
    async fn remove(&self, key: &str) -> ProxyResult<bool>;

    async fn exists(&self, key: &str) -> ProxyResult<bool> {
        Ok(self.retrieve(key).await?.is_some())
    }
}
