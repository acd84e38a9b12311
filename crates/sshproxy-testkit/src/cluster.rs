//! In-process multi-unit cluster
//!
//! Every unit gets a full [`UnitRuntime`] over mock handlers, a view of one
//! shared [`MemoryDirectory`], and its own notification inbox. Directory
//! writes land in every inbox; nothing is delivered until a test asks, so
//! tests control the interleaving completely.

use crate::mock_effects::{
    CrashSwitch, CrashingStorage, LeaderRegistry, MockCryptoHandler, MockRemoteExecutor,
    MockStatusHandler, VerifyBehavior,
};
use sshproxy_cluster::UnitRuntime;
use sshproxy_core::{
    HandlerOutcome, HookEvent, Keypair, ProxyError, ProxyResult, RemoteTarget, UnitId,
};
use sshproxy_effects::{MemoryDirectory, MemoryStorageHandler, StaticConfigHandler, UnitEffectSystem};
use std::sync::Arc;
use tokio::sync::mpsc;

const APPLICATION: &str = "sshproxy";

/// Upper bound on settle rounds; a correct cluster needs a handful
const MAX_SETTLE_ROUNDS: usize = 64;

/// One unit of a [`SimulatedCluster`]
pub struct SimulatedUnit {
    /// Unit identifier
    pub id: UnitId,
    /// Persisted state, read without going through the crash switch
    pub storage: MemoryStorageHandler,
    /// Seeded key generator
    pub crypto: MockCryptoHandler,
    /// Scripted remote host
    pub remote: MockRemoteExecutor,
    /// Status history
    pub status: MockStatusHandler,
    /// Remote target configuration
    pub config: StaticConfigHandler,
    crash: CrashSwitch,
    effects: Arc<UnitEffectSystem>,
    runtime: UnitRuntime<UnitEffectSystem>,
    inbox: mpsc::UnboundedReceiver<HookEvent>,
}

impl SimulatedUnit {
    /// The unit runtime
    pub fn runtime(&self) -> &UnitRuntime<UnitEffectSystem> {
        &self.runtime
    }

    /// The unit effect system
    pub fn effects(&self) -> &Arc<UnitEffectSystem> {
        &self.effects
    }

    /// The unit's key, if it holds one
    pub async fn keypair(&self) -> Option<Keypair> {
        self.runtime.coordinator().identity().keypair().await.ok()
    }

    /// Notifications waiting in the inbox
    pub fn queued(&self) -> usize {
        self.inbox.len()
    }

    /// Deliver the oldest inbox notification, if any
    pub async fn deliver_next(&mut self) -> ProxyResult<Option<HandlerOutcome>> {
        match self.inbox.try_recv() {
            Ok(event) => Ok(Some(self.runtime.deliver(event).await?)),
            Err(_) => Ok(None),
        }
    }

    /// Deliver `event` to a process that dies after `writes` storage writes,
    /// then restart the unit. Nothing the handler did after the cut is kept.
    pub async fn crash_during(&mut self, event: HookEvent, writes: usize) {
        self.crash.arm(writes);
        let outcome = self.runtime.deliver(event).await;
        tracing::debug!(unit = %self.id, crashed = self.crash.has_crashed(), ?outcome, "Crash point reached");
        self.crash.reset();
        self.restart();
    }

    /// Drop the in-memory runtime and build a new one over the same storage
    pub fn restart(&mut self) {
        tracing::debug!(unit = %self.id, "Restarting simulated unit");
        self.runtime = UnitRuntime::new(self.effects.clone());
    }
}

/// Units sharing one directory and one leader registry
pub struct SimulatedCluster {
    directory: MemoryDirectory,
    leaders: LeaderRegistry,
    units: Vec<SimulatedUnit>,
    seed: u64,
}

impl SimulatedCluster {
    /// Cluster of `size` units led by the first one
    pub async fn new(size: usize) -> ProxyResult<Self> {
        Self::with_seed(size, 0).await
    }

    /// Like [`new`](Self::new) with key generation seeded from `seed`
    pub async fn with_seed(size: usize, seed: u64) -> ProxyResult<Self> {
        let mut cluster = Self {
            directory: MemoryDirectory::new(),
            leaders: LeaderRegistry::default(),
            units: Vec::with_capacity(size),
            seed,
        };
        for _ in 0..size {
            cluster.add_unit().await?;
        }
        if size > 0 {
            cluster.set_leader(Some(0));
        }
        Ok(cluster)
    }

    /// Join a new unit and return its index
    pub async fn add_unit(&mut self) -> ProxyResult<usize> {
        let index = self.units.len();
        let ordinal = u32::try_from(index)
            .map_err(|_| ProxyError::invalid("too many simulated units"))?;
        let id = UnitId::from_parts(APPLICATION, ordinal)?;

        let mut seed = [0u8; 32];
        seed[..8].copy_from_slice(&self.seed.to_le_bytes());
        seed[8..12].copy_from_slice(&ordinal.to_le_bytes());

        let storage = MemoryStorageHandler::new();
        let crypto = MockCryptoHandler::with_seed(seed);
        let remote = MockRemoteExecutor::new(VerifyBehavior::Accept);
        let crash = CrashSwitch::new();
        let status = MockStatusHandler::with_crash_switch(crash.clone());
        let config = StaticConfigHandler::new(RemoteTarget::new("10.0.0.5", "ubuntu"));
        let (view, inbox) = self.directory.join(id.clone()).await;

        let effects = Arc::new(
            UnitEffectSystem::builder(id.clone())
                .leadership(Arc::new(self.leaders.handler(id.clone())))
                .crypto(Arc::new(crypto.clone()))
                .storage(Arc::new(CrashingStorage::new(storage.clone(), crash.clone())))
                .directory(Arc::new(view))
                .remote(Arc::new(remote.clone()))
                .config(Arc::new(config.clone()))
                .status(Arc::new(status.clone()))
                .build()?,
        );

        self.units.push(SimulatedUnit {
            id,
            storage,
            crypto,
            remote,
            status,
            config,
            crash,
            runtime: UnitRuntime::new(effects.clone()),
            effects,
            inbox,
        });
        Ok(index)
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Unit this belongs to
    pub fn unit(&self, index: usize) -> &SimulatedUnit {
        &self.units[index]
    }

    /// Mutable access to the unit at `index`
    pub fn unit_mut(&mut self, index: usize) -> &mut SimulatedUnit {
        &mut self.units[index]
    }

    /// All units in index order
    pub fn units(&self) -> &[SimulatedUnit] {
        &self.units
    }

    /// Shared leader registry
    pub fn leaders(&self) -> &LeaderRegistry {
        &self.leaders
    }

    /// Cluster directory access
    pub fn directory(&self) -> &MemoryDirectory {
        &self.directory
    }

    /// Make the unit at `index` leader, or nobody
    pub fn set_leader(&self, index: Option<usize>) {
        self.leaders
            .set_leader(index.map(|i| self.units[i].id.clone()));
    }

    /// Index of the current leader
    pub fn leader(&self) -> Option<usize> {
        let leader = self.leaders.leader()?;
        self.units.iter().position(|unit| unit.id == leader)
    }

    /// Deliver `event` to the unit at `index`
    pub async fn deliver(&self, index: usize, event: HookEvent) -> ProxyResult<HandlerOutcome> {
        self.units[index].runtime.deliver(event).await
    }

    /// Deliver `Install` to every unit, in index order
    pub async fn install_all(&self) -> ProxyResult<()> {
        for unit in &self.units {
            unit.runtime.deliver(HookEvent::Install).await?;
        }
        Ok(())
    }

    /// Deliver every queued notification and tick every unit until nothing
    /// changes. Returns the number of events still deferred cluster-wide.
    pub async fn settle(&mut self) -> ProxyResult<usize> {
        let mut deferred = 0;
        for _ in 0..MAX_SETTLE_ROUNDS {
            let mut delivered = false;
            for unit in &mut self.units {
                while unit.deliver_next().await?.is_some() {
                    delivered = true;
                }
            }

            deferred = 0;
            for unit in &self.units {
                deferred += unit.runtime.tick().await?;
            }

            let queued: usize = self.units.iter().map(SimulatedUnit::queued).sum();
            if !delivered && queued == 0 {
                break;
            }
        }
        Ok(deferred)
    }

    /// Key in the application bag, if published
    pub async fn published_key(&self) -> ProxyResult<Option<Keypair>> {
        match self.units.first() {
            Some(unit) => {
                unit.runtime
                    .coordinator()
                    .directory()
                    .read_application_key()
                    .await
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn leader_install_publishes_to_everyone() {
        let mut cluster = SimulatedCluster::new(3).await.unwrap();
        cluster.install_all().await.unwrap();
        assert_eq!(cluster.settle().await.unwrap(), 0);

        let published = cluster.published_key().await.unwrap().unwrap();
        for unit in cluster.units() {
            assert_eq!(unit.keypair().await, Some(published.clone()));
        }
    }

    #[tokio::test]
    async fn leaderless_cluster_stays_deferred() {
        let mut cluster = SimulatedCluster::new(2).await.unwrap();
        cluster.set_leader(None);
        cluster.install_all().await.unwrap();
        cluster
            .deliver(1, HookEvent::relation_changed())
            .await
            .unwrap();

        assert_eq!(cluster.settle().await.unwrap(), 1);
        assert_eq!(cluster.published_key().await.unwrap(), None);
    }

    #[tokio::test]
    async fn late_joiner_adopts_the_published_key() {
        let mut cluster = SimulatedCluster::new(2).await.unwrap();
        cluster.install_all().await.unwrap();
        assert_eq!(cluster.settle().await.unwrap(), 0);

        let late = cluster.add_unit().await.unwrap();
        assert_eq!(cluster.unit(late).queued(), 1);
        cluster.deliver(late, HookEvent::Install).await.unwrap();
        assert_eq!(cluster.settle().await.unwrap(), 0);

        let published = cluster.published_key().await.unwrap();
        assert!(published.is_some());
        assert_eq!(cluster.unit(late).keypair().await, published);
        assert_eq!(cluster.directory().write_count().await, 1);
    }

    #[tokio::test]
    async fn crash_keeps_only_the_writes_before_the_cut() {
        let mut cluster = SimulatedCluster::new(1).await.unwrap();
        cluster
            .unit_mut(0)
            .crash_during(HookEvent::Install, 0)
            .await;

        let unit = cluster.unit(0);
        assert!(unit.storage.is_empty().await);
        assert!(unit.status.history().iter().all(|s| !s.is_blocked()));
        assert_eq!(cluster.published_key().await.unwrap(), None);

        cluster.deliver(0, HookEvent::Install).await.unwrap();
        assert!(cluster.published_key().await.unwrap().is_some());
    }
}
