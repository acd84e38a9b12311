//! Real cryptographic handler
//!
//! Generates ed25519 keys from OS randomness and encodes them in the
//! OpenSSH formats the remote executor hands to the `ssh` client.

use async_trait::async_trait;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sshproxy_core::crypto::openssh;
use sshproxy_core::effects::CryptoEffects;
use sshproxy_core::{Keypair, ProxyError, ProxyResult};
use zeroize::Zeroizing;

/// Real cryptographic handler for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct RealCryptoHandler;

impl RealCryptoHandler {
    /// Create a new instance
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CryptoEffects for RealCryptoHandler {
    async fn generate_ssh_keypair(&self, comment: &str) -> ProxyResult<Keypair> {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng
            .try_fill_bytes(&mut seed[..])
            .map_err(|e| ProxyError::key_generation(format!("OS randomness unavailable: {e}")))?;
        let mut check = [0u8; 4];
        OsRng
            .try_fill_bytes(&mut check)
            .map_err(|e| ProxyError::key_generation(format!("OS randomness unavailable: {e}")))?;

        let signing = SigningKey::from_bytes(&seed);
        let public = openssh::public_key_line(&signing.verifying_key(), comment);
        let private = openssh::private_key_pem(&signing, comment, u32::from_be_bytes(check));

        tracing::debug!(comment, "Generated ed25519 keypair");
        Ok(Keypair::new(public.into_bytes(), private.as_bytes().to_vec()))
    }
}
