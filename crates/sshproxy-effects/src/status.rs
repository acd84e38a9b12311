//! Status handler that logs every change and persists the last value

use async_trait::async_trait;
use sshproxy_core::effects::{StatusEffects, StorageEffects};
use sshproxy_core::{ProxyResult, UnitId, UnitStatus};
use std::sync::Arc;

/// Storage key holding the last reported status
pub const STATUS_KEY: &str = "status";

/// Logs status changes and keeps the last one in storage
pub struct TracingStatusHandler {
    unit: UnitId,
    storage: Arc<dyn StorageEffects>,
}

impl TracingStatusHandler {
    /// Handler for `unit` persisting into `storage`
    pub fn new(unit: UnitId, storage: Arc<dyn StorageEffects>) -> Self {
        Self { unit, storage }
    }
}

#[async_trait]
impl StatusEffects for TracingStatusHandler {
    async fn set_status(&self, status: UnitStatus) -> ProxyResult<()> {
        match &status {
            UnitStatus::Blocked(reason) => {
                tracing::warn!(unit = %self.unit, reason = %reason, "Unit blocked");
            }
            other => {
                tracing::info!(unit = %self.unit, status = %other, "Unit status changed");
            }
        }
        self.storage
            .store(STATUS_KEY, serde_json::to_vec(&status)?)
            .await
    }

    async fn status(&self) -> ProxyResult<Option<UnitStatus>> {
        match self.storage.retrieve(STATUS_KEY).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorageHandler;

    #[tokio::test]
    async fn status_survives_a_new_handler() {
        let storage = Arc::new(MemoryStorageHandler::new());
        let unit = UnitId::parse("sshproxy/0").unwrap();
        let status = TracingStatusHandler::new(unit.clone(), storage.clone());

        assert_eq!(status.status().await.unwrap(), None);
        status
            .set_status(UnitStatus::blocked("Invalid SSH credentials."))
            .await
            .unwrap();

        let reopened = TracingStatusHandler::new(unit, storage);
        assert_eq!(
            reopened.status().await.unwrap(),
            Some(UnitStatus::blocked("Invalid SSH credentials."))
        );
    }
}
