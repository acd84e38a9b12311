//! In-memory cluster directory
//!
//! One [`MemoryDirectory`] is shared by every unit of an in-process cluster.
//! Each unit joins and receives a [`MemoryDirectoryHandler`] view plus an
//! inbox. Every write that changes a bag pushes a relation-changed
//! notification into every member's inbox, including the writer's; the
//! owner of the inboxes decides delivery order. A unit joining a relation
//! that already holds data starts with one relation-changed in its inbox.

use super::{check_write_scope, merge_bag};
use async_trait::async_trait;
use sshproxy_core::effects::DirectoryEffects;
use sshproxy_core::{DataBag, HookEvent, ProxyResult, Scope, UnitId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Default)]
struct DirectoryState {
    bags: BTreeMap<Scope, DataBag>,
    members: BTreeSet<UnitId>,
    inboxes: BTreeMap<UnitId, mpsc::UnboundedSender<HookEvent>>,
    writes: u64,
}

/// Shared in-memory directory backend
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<RwLock<DirectoryState>>,
}

impl MemoryDirectory {
    /// Create a new instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `unit` to the relation, returning its view and notification inbox
    pub async fn join(
        &self,
        unit: UnitId,
    ) -> (MemoryDirectoryHandler, mpsc::UnboundedReceiver<HookEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.write().await;
        if state.bags.values().any(|bag| !bag.is_empty())
            && tx.send(HookEvent::relation_changed()).is_err()
        {
            tracing::debug!(unit = %unit, "Inbox closed, join notification dropped");
        }
        state.members.insert(unit.clone());
        state.inboxes.insert(unit.clone(), tx);
        tracing::debug!(unit = %unit, "Unit joined directory");

        (
            MemoryDirectoryHandler {
                directory: self.clone(),
                unit,
            },
            rx,
        )
    }

    /// Remove `unit` from the relation; its bag stays readable
    pub async fn leave(&self, unit: &UnitId) {
        let mut state = self.state.write().await;
        state.members.remove(unit);
        state.inboxes.remove(unit);
    }

    /// Snapshot of a bag without going through a unit view
    pub async fn snapshot(&self, scope: &Scope) -> DataBag {
        let state = self.state.read().await;
        state.bags.get(scope).cloned().unwrap_or_default()
    }

    /// Number of writes that changed some bag
    pub async fn write_count(&self) -> u64 {
        self.state.read().await.writes
    }
}

/// One unit's view of a [`MemoryDirectory`]
#[derive(Debug, Clone)]
pub struct MemoryDirectoryHandler {
    directory: MemoryDirectory,
    unit: UnitId,
}

#[async_trait]
impl DirectoryEffects for MemoryDirectoryHandler {
    fn local_unit(&self) -> &UnitId {
        &self.unit
    }

    async fn read_bag(&self, scope: &Scope) -> ProxyResult<DataBag> {
        Ok(self.directory.snapshot(scope).await)
    }

    async fn update_bag(&self, scope: &Scope, updates: DataBag) -> ProxyResult<()> {
        check_write_scope(&self.unit, scope)?;

        let mut state = self.directory.state.write().await;
        let changed = merge_bag(state.bags.entry(scope.clone()).or_default(), updates);
        if !changed {
            return Ok(());
        }
        state.writes += 1;

        for (member, inbox) in &state.inboxes {
            if inbox
                .send(HookEvent::relation_changed_by(self.unit.clone()))
                .is_err()
            {
                tracing::debug!(unit = %member, "Inbox closed, notification dropped");
            }
        }
        tracing::debug!(unit = %self.unit, scope = %scope, "Directory bag updated");
        Ok(())
    }

    async fn members(&self) -> ProxyResult<Vec<UnitId>> {
        let state = self.directory.state.read().await;
        Ok(state.members.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshproxy_core::{bag_from, ProxyError};

    fn unit(n: u32) -> UnitId {
        UnitId::from_parts("sshproxy", n).unwrap()
    }

    #[tokio::test]
    async fn writes_notify_every_member_including_writer() {
        let directory = MemoryDirectory::new();
        let (a, mut inbox_a) = directory.join(unit(0)).await;
        let (_b, mut inbox_b) = directory.join(unit(1)).await;

        a.update_bag(&Scope::Application, bag_from([("k", "v")]))
            .await
            .unwrap();

        let expected = HookEvent::relation_changed_by(unit(0));
        assert_eq!(inbox_a.try_recv().unwrap(), expected);
        assert_eq!(inbox_b.try_recv().unwrap(), expected);
        assert_eq!(directory.write_count().await, 1);
    }

    #[tokio::test]
    async fn late_joiner_is_told_about_existing_data() {
        let directory = MemoryDirectory::new();
        let (a, _) = directory.join(unit(0)).await;
        let (_, mut early) = directory.join(unit(1)).await;
        assert!(early.try_recv().is_err());

        a.update_bag(&Scope::Application, bag_from([("k", "v")]))
            .await
            .unwrap();
        let (_, mut late) = directory.join(unit(2)).await;

        assert_eq!(late.try_recv().unwrap(), HookEvent::relation_changed());
        assert!(late.try_recv().is_err());
        assert_eq!(directory.write_count().await, 1);
    }

    #[tokio::test]
    async fn unchanged_writes_do_not_notify() {
        let directory = MemoryDirectory::new();
        let (a, mut inbox) = directory.join(unit(0)).await;
        let bag: DataBag = bag_from([("k", "v")]);

        a.update_bag(&Scope::Application, bag.clone()).await.unwrap();
        a.update_bag(&Scope::Application, bag).await.unwrap();

        assert!(inbox.try_recv().is_ok());
        assert!(inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn cannot_write_another_units_bag() {
        let directory = MemoryDirectory::new();
        let (a, _) = directory.join(unit(0)).await;
        let (b, _) = directory.join(unit(1)).await;

        let err = a
            .update_bag(&Scope::Unit(unit(1)), bag_from([("k", "v")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::PermissionDenied { .. }));
        assert!(b.read_bag(&Scope::Unit(unit(1))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn members_track_join_and_leave() {
        let directory = MemoryDirectory::new();
        let (a, _) = directory.join(unit(0)).await;
        let _ = directory.join(unit(1)).await;
        assert_eq!(a.members().await.unwrap(), vec![unit(0), unit(1)]);
        directory.leave(&unit(1)).await;
        assert_eq!(a.members().await.unwrap(), vec![unit(0)]);
    }
}
