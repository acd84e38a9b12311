//! Typed access to the peer relation bags

use crate::facts::ClusterInitialized;
use sshproxy_core::effects::{DirectoryEffects, LeadershipEffects};
use sshproxy_core::{DataBag, Keypair, ProxyError, ProxyResult, Scope, UnitId};
use std::sync::Arc;

/// Typed access to the peer relation
pub struct ClusterDirectory<E: ?Sized> {
    effects: Arc<E>,
}

impl<E> ClusterDirectory<E>
where
    E: DirectoryEffects + LeadershipEffects + ?Sized,
{
    /// Create over the given effects
    pub fn new(effects: Arc<E>) -> Self {
        Self { effects }
    }

    /// The local unit
    pub fn local_unit(&self) -> &UnitId {
        self.effects.local_unit()
    }

    /// True once the application bag holds a published key
    pub async fn is_initialized(&self) -> ProxyResult<bool> {
        Ok(self.read_initialized().await?.is_some())
    }

    /// The published [`ClusterInitialized`] fact, if any
    pub async fn read_initialized(&self) -> ProxyResult<Option<ClusterInitialized>> {
        let bag = self.effects.read_bag(&Scope::Application).await?;
        ClusterInitialized::from_bag(&bag)
    }

    /// Snapshot of the published key. May be stale by the time it is used.
    pub async fn read_application_key(&self) -> ProxyResult<Option<Keypair>> {
        Ok(self.read_initialized().await?.map(|fact| fact.keypair))
    }

    /// Publish the cluster key in the application bag.
    ///
    /// Leadership is checked immediately before the write. Publishing the
    /// key that is already published is a no-op; a different key is a
    /// conflict, since a published key never changes.
    pub async fn publish_application_key(&self, keypair: &Keypair) -> ProxyResult<()> {
        self.effects.require_leader().await?;

        if let Some(existing) = self.read_initialized().await? {
            if &existing.keypair == keypair {
                return Ok(());
            }
            return Err(ProxyError::key_conflict(format!(
                "cluster key {} already published by {}",
                existing.keypair.fingerprint(),
                existing
                    .initialized_by
                    .map(|unit| unit.to_string())
                    .unwrap_or_else(|| "an earlier leader".to_string())
            )));
        }

        let fact = ClusterInitialized::new(keypair.clone(), self.local_unit().clone());
        self.effects
            .update_bag(&Scope::Application, fact.to_bag()?)
            .await?;
        tracing::info!(
            unit = %self.local_unit(),
            fingerprint = %keypair.fingerprint(),
            "Published cluster SSH key"
        );
        Ok(())
    }

    /// Another unit's bag
    pub async fn read_unit_bag(&self, unit: &UnitId) -> ProxyResult<DataBag> {
        self.effects.read_bag(&Scope::Unit(unit.clone())).await
    }

    /// Merge `updates` into the local unit's bag
    pub async fn write_local_bag(&self, updates: DataBag) -> ProxyResult<()> {
        let scope = Scope::Unit(self.local_unit().clone());
        self.effects.update_bag(&scope, updates).await
    }

    /// Units currently in the relation
    pub async fn members(&self) -> ProxyResult<Vec<UnitId>> {
        self.effects.members().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use sshproxy_core::bag_from;
    use sshproxy_effects::{MemoryDirectory, MemoryDirectoryHandler, StaticLeadershipHandler};

    struct View {
        directory: MemoryDirectoryHandler,
        leadership: StaticLeadershipHandler,
    }

    #[async_trait]
    impl DirectoryEffects for View {
        fn local_unit(&self) -> &UnitId {
            self.directory.local_unit()
        }
        async fn read_bag(&self, scope: &Scope) -> ProxyResult<DataBag> {
            self.directory.read_bag(scope).await
        }
        async fn update_bag(&self, scope: &Scope, updates: DataBag) -> ProxyResult<()> {
            self.directory.update_bag(scope, updates).await
        }
        async fn members(&self) -> ProxyResult<Vec<UnitId>> {
            self.directory.members().await
        }
    }

    #[async_trait]
    impl LeadershipEffects for View {
        async fn is_leader(&self) -> bool {
            self.leadership.is_leader().await
        }
    }

    async fn view(backend: &MemoryDirectory, n: u32, leader: bool) -> ClusterDirectory<View> {
        let unit = UnitId::from_parts("sshproxy", n).unwrap();
        let (directory, _inbox) = backend.join(unit).await;
        ClusterDirectory::new(Arc::new(View {
            directory,
            leadership: StaticLeadershipHandler::new(leader),
        }))
    }

    fn key(tag: &str) -> Keypair {
        Keypair::new(format!("ssh-ed25519 {tag}"), format!("private {tag}"))
    }

    #[tokio::test]
    async fn publication_is_visible_to_followers() {
        let backend = MemoryDirectory::new();
        let leader = view(&backend, 0, true).await;
        let follower = view(&backend, 1, false).await;

        assert!(!follower.is_initialized().await.unwrap());
        leader.publish_application_key(&key("a")).await.unwrap();

        let fact = follower.read_initialized().await.unwrap().unwrap();
        assert_eq!(fact.keypair, key("a"));
        assert_eq!(fact.initialized_by, Some(UnitId::parse("sshproxy/0").unwrap()));
    }

    #[tokio::test]
    async fn non_leader_cannot_publish() {
        let backend = MemoryDirectory::new();
        let follower = view(&backend, 1, false).await;

        assert_matches!(
            follower.publish_application_key(&key("a")).await,
            Err(ProxyError::NotLeader)
        );
        assert_eq!(backend.write_count().await, 0);
    }

    #[tokio::test]
    async fn published_key_is_immutable() {
        let backend = MemoryDirectory::new();
        let leader = view(&backend, 0, true).await;
        leader.publish_application_key(&key("a")).await.unwrap();
        leader.publish_application_key(&key("a")).await.unwrap();
        assert_eq!(backend.write_count().await, 1);

        let successor = view(&backend, 2, true).await;
        assert_matches!(
            successor.publish_application_key(&key("b")).await,
            Err(ProxyError::KeyConflict { .. })
        );
        assert_eq!(leader.read_application_key().await.unwrap(), Some(key("a")));
    }

    #[tokio::test]
    async fn unit_bags_are_owner_written() {
        let backend = MemoryDirectory::new();
        let a = view(&backend, 0, false).await;
        let b = view(&backend, 1, false).await;

        a.write_local_bag(bag_from([("ready", "yes")])).await.unwrap();
        assert_eq!(
            b.read_unit_bag(a.local_unit()).await.unwrap(),
            bag_from([("ready", "yes")])
        );
    }
}
