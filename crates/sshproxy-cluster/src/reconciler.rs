//! Remote target validation
//!
//! The reconciler's only output is the unit status. It runs after config
//! changes and after the unit obtains the cluster key.

use crate::{INVALID_CREDENTIALS, WAITING_FOR_CREDENTIALS};
use sshproxy_core::effects::{ConfigEffects, RemoteExecutorEffects, StatusEffects};
use sshproxy_core::{ProxyResult, UnitStatus};
use std::sync::Arc;

/// Derives the unit status from the remote credentials
pub struct ConfigReconciler<E: ?Sized> {
    effects: Arc<E>,
}

impl<E> ConfigReconciler<E>
where
    E: ConfigEffects + RemoteExecutorEffects + StatusEffects + ?Sized,
{
    /// Create over the given effects
    pub fn new(effects: Arc<E>) -> Self {
        Self { effects }
    }

    /// Verify the configured credentials and report the result as status.
    ///
    /// Returns the status that was set. Errors only when the status itself
    /// cannot be written or the config cannot be read.
    pub async fn reconcile(&self) -> ProxyResult<UnitStatus> {
        self.effects
            .set_status(UnitStatus::waiting(WAITING_FOR_CREDENTIALS))
            .await?;

        let target = self.effects.remote_target().await?;
        let status = if let Some(field) = target.missing_field() {
            UnitStatus::blocked(format!("Missing SSH configuration: {field}"))
        } else {
            match self.effects.verify_credentials(&target).await {
                Ok(true) => UnitStatus::Active,
                Ok(false) => UnitStatus::blocked(INVALID_CREDENTIALS),
                Err(e) => {
                    tracing::warn!(host = %target.hostname, error = %e, "Credential check failed");
                    UnitStatus::blocked(e.to_string())
                }
            }
        };

        self.effects.set_status(status.clone()).await?;
        Ok(status)
    }
}
