//! Effect system composition
//!
//! [`UnitEffectSystem`] bundles one handler per capability behind trait
//! objects and implements every effect trait by delegation, so it satisfies
//! `UnitEffects` whatever mix of production and mock handlers it holds.
//!
//! Delegation is plain except for application-scope directory writes, which
//! are refused unless the leadership handler reports this unit as leader.

use async_trait::async_trait;
use sshproxy_core::effects::{
    ConfigEffects, CryptoEffects, DirectoryEffects, LeadershipEffects, RemoteExecutorEffects,
    StatusEffects, StorageEffects,
};
use sshproxy_core::{
    CommandOutput, DataBag, Keypair, ProxyError, ProxyResult, RemoteTarget, Scope, UnitId,
    UnitStatus,
};
use std::sync::Arc;

/// Composed effect system for one unit
#[derive(Clone)]
pub struct UnitEffectSystem {
    unit: UnitId,
    leadership: Arc<dyn LeadershipEffects>,
    crypto: Arc<dyn CryptoEffects>,
    storage: Arc<dyn StorageEffects>,
    directory: Arc<dyn DirectoryEffects>,
    remote: Arc<dyn RemoteExecutorEffects>,
    config: Arc<dyn ConfigEffects>,
    status: Arc<dyn StatusEffects>,
}

impl UnitEffectSystem {
    /// Start building an effect system for `unit`
    pub fn builder(unit: UnitId) -> UnitEffectSystemBuilder {
        UnitEffectSystemBuilder {
            unit,
            leadership: None,
            crypto: None,
            storage: None,
            directory: None,
            remote: None,
            config: None,
            status: None,
        }
    }

    /// Unit this belongs to
    pub fn unit(&self) -> &UnitId {
        &self.unit
    }
}

/// Builder for [`UnitEffectSystem`]; every capability is required
pub struct UnitEffectSystemBuilder {
    unit: UnitId,
    leadership: Option<Arc<dyn LeadershipEffects>>,
    crypto: Option<Arc<dyn CryptoEffects>>,
    storage: Option<Arc<dyn StorageEffects>>,
    directory: Option<Arc<dyn DirectoryEffects>>,
    remote: Option<Arc<dyn RemoteExecutorEffects>>,
    config: Option<Arc<dyn ConfigEffects>>,
    status: Option<Arc<dyn StatusEffects>>,
}

impl UnitEffectSystemBuilder {
    /// Leadership handler
    pub fn leadership(mut self, handler: Arc<dyn LeadershipEffects>) -> Self {
        self.leadership = Some(handler);
        self
    }

    /// Crypto handler
    pub fn crypto(mut self, handler: Arc<dyn CryptoEffects>) -> Self {
        self.crypto = Some(handler);
        self
    }

    /// Storage handler
    pub fn storage(mut self, handler: Arc<dyn StorageEffects>) -> Self {
        self.storage = Some(handler);
        self
    }

    /// Directory view; must belong to the builder's unit
    pub fn directory(mut self, handler: Arc<dyn DirectoryEffects>) -> Self {
        self.directory = Some(handler);
        self
    }

    /// Remote executor
    pub fn remote(mut self, handler: Arc<dyn RemoteExecutorEffects>) -> Self {
        self.remote = Some(handler);
        self
    }

    /// Configuration handler
    pub fn config(mut self, handler: Arc<dyn ConfigEffects>) -> Self {
        self.config = Some(handler);
        self
    }

    /// Status handler
    pub fn status(mut self, handler: Arc<dyn StatusEffects>) -> Self {
        self.status = Some(handler);
        self
    }

    /// Fails when a handler is missing or the directory view is another unit's
    pub fn build(self) -> ProxyResult<UnitEffectSystem> {
        fn required<T: ?Sized>(handler: Option<Arc<T>>, name: &str) -> ProxyResult<Arc<T>> {
            handler.ok_or_else(|| ProxyError::invalid(format!("{name} handler not configured")))
        }

        let directory = required(self.directory, "directory")?;
        if directory.local_unit() != &self.unit {
            return Err(ProxyError::invalid(format!(
                "directory view belongs to {}, not {}",
                directory.local_unit(),
                self.unit
            )));
        }

        Ok(UnitEffectSystem {
            leadership: required(self.leadership, "leadership")?,
            crypto: required(self.crypto, "crypto")?,
            storage: required(self.storage, "storage")?,
            directory,
            remote: required(self.remote, "remote executor")?,
            config: required(self.config, "config")?,
            status: required(self.status, "status")?,
            unit: self.unit,
        })
    }
}

#[async_trait]
impl LeadershipEffects for UnitEffectSystem {
    async fn is_leader(&self) -> bool {
        self.leadership.is_leader().await
    }
}

#[async_trait]
impl CryptoEffects for UnitEffectSystem {
    async fn generate_ssh_keypair(&self, comment: &str) -> ProxyResult<Keypair> {
        self.crypto.generate_ssh_keypair(comment).await
    }
}

#[async_trait]
impl StorageEffects for UnitEffectSystem {
    async fn store(&self, key: &str, value: Vec<u8>) -> ProxyResult<()> {
        self.storage.store(key, value).await
    }

    async fn retrieve(&self, key: &str) -> ProxyResult<Option<Vec<u8>>> {
        self.storage.retrieve(key).await
    }

    async fn remove(&self, key: &str) -> ProxyResult<bool> {
        self.storage.remove(key).await
    }

    async fn exists(&self, key: &str) -> ProxyResult<bool> {
        self.storage.exists(key).await
    }
}

#[async_trait]
impl DirectoryEffects for UnitEffectSystem {
    fn local_unit(&self) -> &UnitId {
        &self.unit
    }

    async fn read_bag(&self, scope: &Scope) -> ProxyResult<DataBag> {
        self.directory.read_bag(scope).await
    }

    async fn update_bag(&self, scope: &Scope, updates: DataBag) -> ProxyResult<()> {
        if matches!(scope, Scope::Application) {
            self.leadership.require_leader().await?;
        }
        self.directory.update_bag(scope, updates).await
    }

    async fn members(&self) -> ProxyResult<Vec<UnitId>> {
        self.directory.members().await
    }
}

#[async_trait]
impl RemoteExecutorEffects for UnitEffectSystem {
    async fn run(&self, target: &RemoteTarget, command: &str) -> ProxyResult<CommandOutput> {
        self.remote.run(target, command).await
    }

    async fn verify_credentials(&self, target: &RemoteTarget) -> ProxyResult<bool> {
        self.remote.verify_credentials(target).await
    }
}

#[async_trait]
impl ConfigEffects for UnitEffectSystem {
    async fn remote_target(&self) -> ProxyResult<RemoteTarget> {
        self.config.remote_target().await
    }
}

#[async_trait]
impl StatusEffects for UnitEffectSystem {
    async fn set_status(&self, status: UnitStatus) -> ProxyResult<()> {
        self.status.set_status(status).await
    }

    async fn status(&self) -> ProxyResult<Option<UnitStatus>> {
        self.status.status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MemoryDirectory, MemoryStorageHandler, RealCryptoHandler, SshCommandExecutor,
        StaticConfigHandler, StaticLeadershipHandler, TracingStatusHandler,
    };
    use sshproxy_core::bag_from;
    use sshproxy_core::effects::UnitEffects;

    fn assert_unit_effects<E: UnitEffects>(_: &E) {}

    #[tokio::test]
    async fn builds_from_production_handlers() {
        let unit = UnitId::parse("sshproxy/0").unwrap();
        let storage = Arc::new(MemoryStorageHandler::new());
        let (directory, _inbox) = MemoryDirectory::new().join(unit.clone()).await;

        let system = UnitEffectSystem::builder(unit.clone())
            .leadership(Arc::new(StaticLeadershipHandler::new(true)))
            .crypto(Arc::new(RealCryptoHandler::new()))
            .storage(storage.clone())
            .directory(Arc::new(directory))
            .remote(Arc::new(SshCommandExecutor::new("/id")))
            .config(Arc::new(StaticConfigHandler::default()))
            .status(Arc::new(TracingStatusHandler::new(unit, storage)))
            .build()
            .unwrap();

        assert_unit_effects(&system);
        assert!(system.is_leader().await);
    }

    async fn system(leader: bool, directory: &MemoryDirectory, n: u32) -> UnitEffectSystem {
        let unit = UnitId::from_parts("sshproxy", n).unwrap();
        let storage = Arc::new(MemoryStorageHandler::new());
        let (view, _inbox) = directory.join(unit.clone()).await;
        UnitEffectSystem::builder(unit.clone())
            .leadership(Arc::new(StaticLeadershipHandler::new(leader)))
            .crypto(Arc::new(RealCryptoHandler::new()))
            .storage(storage.clone())
            .directory(Arc::new(view))
            .remote(Arc::new(SshCommandExecutor::new("/id")))
            .config(Arc::new(StaticConfigHandler::default()))
            .status(Arc::new(TracingStatusHandler::new(unit, storage)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn application_bag_writes_require_leadership() {
        let directory = MemoryDirectory::new();
        let leader = system(true, &directory, 0).await;
        let follower = system(false, &directory, 1).await;

        let err = follower
            .update_bag(&Scope::Application, bag_from([("k", "v")]))
            .await
            .unwrap_err();
        assert!(err.is_not_leader());
        follower
            .update_bag(&Scope::Unit(follower.unit().clone()), bag_from([("k", "v")]))
            .await
            .unwrap();
        assert_eq!(directory.write_count().await, 1);

        leader
            .update_bag(&Scope::Application, bag_from([("k", "v")]))
            .await
            .unwrap();
        assert_eq!(
            directory.snapshot(&Scope::Application).await,
            bag_from([("k", "v")])
        );
    }

    #[tokio::test]
    async fn missing_handler_is_reported() {
        let unit = UnitId::parse("sshproxy/0").unwrap();
        let err = UnitEffectSystem::builder(unit)
            .leadership(Arc::new(StaticLeadershipHandler::new(true)))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("directory"));
    }

    #[tokio::test]
    async fn directory_view_must_match_unit() {
        let (directory, _inbox) = MemoryDirectory::new()
            .join(UnitId::parse("sshproxy/1").unwrap())
            .await;
        let err = UnitEffectSystem::builder(UnitId::parse("sshproxy/0").unwrap())
            .directory(Arc::new(directory))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, ProxyError::Invalid { .. }));
    }
}
