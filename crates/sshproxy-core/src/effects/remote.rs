//! Remote command execution effects
//!
//! The transport (session setup, authentication) is the handler's concern;
//! the protocol only runs one command at a time and checks credentials.

use crate::types::{CommandOutput, RemoteTarget};
use crate::ProxyResult;
use async_trait::async_trait;

/// Command execution on the remote host
#[async_trait]
pub trait RemoteExecutorEffects: Send + Sync {
    /// Run one command on the target
    async fn run(&self, target: &RemoteTarget, command: &str) -> ProxyResult<CommandOutput>;

    /// Authenticate against the target without side effects.
    ///
    /// `Ok(false)` means the credentials were rejected; `Err` means the check
    /// itself could not be performed.
    async fn verify_credentials(&self, target: &RemoteTarget) -> ProxyResult<bool>;
}
