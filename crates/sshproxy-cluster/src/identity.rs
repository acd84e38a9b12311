//! Local SSH identity
//!
//! The unit's keypair lives in local storage under two keys mirroring the
//! files `ssh` reads. The store exclusively owns this material: nothing else
//! writes these keys.

use sshproxy_core::effects::{CryptoEffects, StorageEffects};
use sshproxy_core::{Keypair, ProxyError, ProxyResult};
use std::sync::Arc;

/// Storage key of the private key PEM
pub const PRIVATE_KEY_PATH: &str = "ssh/id_ed25519";
/// Storage key of the public key line
pub const PUBLIC_KEY_PATH: &str = "ssh/id_ed25519.pub";

/// What [`IdentityStore::adopt_key`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adoption {
    /// The material was stored as the local key
    Stored,
    /// The identical key was already held
    AlreadyHeld,
}

/// The local unit's SSH keypair
pub struct IdentityStore<E: ?Sized> {
    effects: Arc<E>,
}

impl<E> IdentityStore<E>
where
    E: StorageEffects + CryptoEffects + ?Sized,
{
    /// Create over the given effects
    pub fn new(effects: Arc<E>) -> Self {
        Self { effects }
    }

    /// True when both halves are present
    pub async fn has_key(&self) -> ProxyResult<bool> {
        Ok(self.effects.exists(PRIVATE_KEY_PATH).await?
            && self.effects.exists(PUBLIC_KEY_PATH).await?)
    }

    /// Generate and persist a fresh keypair.
    ///
    /// Overwrites any existing key; callers check [`has_key`](Self::has_key)
    /// first.
    pub async fn generate_key(&self, comment: &str) -> ProxyResult<Keypair> {
        let keypair = self.effects.generate_ssh_keypair(comment).await?;
        self.persist(&keypair).await?;
        tracing::info!(fingerprint = %keypair.fingerprint(), "Generated SSH keypair");
        Ok(keypair)
    }

    /// Persist externally supplied material unless a key is already held.
    ///
    /// Identical material is accepted again. Different material fails with
    /// `KeyConflict` and leaves the held key untouched.
    pub async fn adopt_key(&self, keypair: &Keypair) -> ProxyResult<Adoption> {
        keypair.validate()?;

        if let Some(held) = self.load().await? {
            if &held == keypair {
                return Ok(Adoption::AlreadyHeld);
            }
            return Err(ProxyError::key_conflict(format!(
                "local key {} differs from offered key {}",
                held.fingerprint(),
                keypair.fingerprint()
            )));
        }

        self.persist(keypair).await?;
        tracing::info!(fingerprint = %keypair.fingerprint(), "Adopted SSH keypair");
        Ok(Adoption::Stored)
    }

    /// Public key line; `NoKey` when none is held
    pub async fn public_key(&self) -> ProxyResult<Vec<u8>> {
        self.effects
            .retrieve(PUBLIC_KEY_PATH)
            .await?
            .ok_or(ProxyError::NoKey)
    }

    /// Private key PEM; `NoKey` when none is held
    pub async fn private_key(&self) -> ProxyResult<Vec<u8>> {
        self.effects
            .retrieve(PRIVATE_KEY_PATH)
            .await?
            .ok_or(ProxyError::NoKey)
    }

    /// Both halves of the held key; `NoKey` when none is held
    pub async fn keypair(&self) -> ProxyResult<Keypair> {
        self.load().await?.ok_or(ProxyError::NoKey)
    }

    /// Remove the local key. Returns whether anything was removed.
    ///
    /// The public half goes first and is written last, so an interrupted
    /// forget or persist leaves at most a lone private half, which
    /// [`has_key`](Self::has_key) ignores and the next persist overwrites.
    pub async fn forget_key(&self) -> ProxyResult<bool> {
        let public = self.effects.remove(PUBLIC_KEY_PATH).await?;
        let private = self.effects.remove(PRIVATE_KEY_PATH).await?;
        if private || public {
            tracing::warn!("Discarded local SSH keypair");
        }
        Ok(private || public)
    }

    async fn load(&self) -> ProxyResult<Option<Keypair>> {
        let private = self.effects.retrieve(PRIVATE_KEY_PATH).await?;
        let public = self.effects.retrieve(PUBLIC_KEY_PATH).await?;
        Ok(match (public, private) {
            (Some(public), Some(private)) => Some(Keypair::new(public, private)),
            _ => None,
        })
    }

    // Public half last: has_key only sees a complete pair.
    async fn persist(&self, keypair: &Keypair) -> ProxyResult<()> {
        self.effects
            .store(PRIVATE_KEY_PATH, keypair.private_key().to_vec())
            .await?;
        self.effects
            .store(PUBLIC_KEY_PATH, keypair.public_key().to_vec())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use sshproxy_effects::{MemoryStorageHandler, RealCryptoHandler};

    struct Local {
        storage: MemoryStorageHandler,
        crypto: RealCryptoHandler,
    }

    #[async_trait]
    impl StorageEffects for Local {
        async fn store(&self, key: &str, value: Vec<u8>) -> ProxyResult<()> {
            self.storage.store(key, value).await
        }
        async fn retrieve(&self, key: &str) -> ProxyResult<Option<Vec<u8>>> {
            self.storage.retrieve(key).await
        }
        async fn remove(&self, key: &str) -> ProxyResult<bool> {
            self.storage.remove(key).await
        }
    }

    #[async_trait]
    impl CryptoEffects for Local {
        async fn generate_ssh_keypair(&self, comment: &str) -> ProxyResult<Keypair> {
            self.crypto.generate_ssh_keypair(comment).await
        }
    }

    fn store() -> IdentityStore<Local> {
        IdentityStore::new(Arc::new(Local {
            storage: MemoryStorageHandler::new(),
            crypto: RealCryptoHandler::new(),
        }))
    }

    #[tokio::test]
    async fn empty_store_has_no_key() {
        let store = store();
        assert!(!store.has_key().await.unwrap());
        assert_matches!(store.public_key().await, Err(ProxyError::NoKey));
        assert_matches!(store.private_key().await, Err(ProxyError::NoKey));
    }

    #[tokio::test]
    async fn generated_key_is_readable() {
        let store = store();
        let keypair = store.generate_key("sshproxy/0").await.unwrap();

        assert!(store.has_key().await.unwrap());
        assert_eq!(store.public_key().await.unwrap(), keypair.public_key());
        assert_eq!(store.keypair().await.unwrap(), keypair);
    }

    #[tokio::test]
    async fn adoption_is_idempotent_and_detects_conflicts() {
        let leader = store();
        let published = leader.generate_key("leader").await.unwrap();
        let other = store().generate_key("other").await.unwrap();

        let follower = store();
        assert_eq!(follower.adopt_key(&published).await.unwrap(), Adoption::Stored);
        assert_eq!(
            follower.adopt_key(&published).await.unwrap(),
            Adoption::AlreadyHeld
        );
        assert_matches!(
            follower.adopt_key(&other).await,
            Err(ProxyError::KeyConflict { .. })
        );
        assert_eq!(follower.keypair().await.unwrap(), published);
    }

    #[tokio::test]
    async fn mismatched_material_is_rejected() {
        let a = store().generate_key("a").await.unwrap();
        let b = store().generate_key("b").await.unwrap();
        let spliced = Keypair::new(a.public_key(), b.private_key());

        let store = store();
        assert_matches!(
            store.adopt_key(&spliced).await,
            Err(ProxyError::Invalid { .. })
        );
        assert!(!store.has_key().await.unwrap());
    }

    #[tokio::test]
    async fn forget_removes_both_halves() {
        let store = store();
        store.generate_key("x").await.unwrap();
        assert!(store.forget_key().await.unwrap());
        assert!(!store.has_key().await.unwrap());
        assert!(!store.forget_key().await.unwrap());
    }
}
