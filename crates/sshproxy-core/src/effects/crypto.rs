//! Key generation effects

use crate::types::Keypair;
use crate::ProxyResult;
use async_trait::async_trait;

/// Key generation
#[async_trait]
pub trait CryptoEffects: Send + Sync {
    /// Generate a fresh SSH keypair in OpenSSH encoding.
    ///
    /// Fails with `KeyGeneration` when the underlying crypto or OS call fails.
    async fn generate_ssh_keypair(&self, comment: &str) -> ProxyResult<Keypair>;
}
