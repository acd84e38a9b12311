//! Unit status effects

use crate::types::UnitStatus;
use crate::ProxyResult;
use async_trait::async_trait;

/// Unit status reporting
#[async_trait]
pub trait StatusEffects: Send + Sync {
    /// Replace the unit's status
    async fn set_status(&self, status: UnitStatus) -> ProxyResult<()>;

    /// Last status set, if any
    async fn status(&self) -> ProxyResult<Option<UnitStatus>>;
}
