//! Cluster directory effects
//!
//! A relation-scoped key-value store shared by every unit. Handlers enforce
//! that a unit only writes its own `Unit` bag. Application-scope writes are
//! leader-only: the composed unit effect system refuses them for a
//! non-leader, and raw handlers trust their caller to have checked. Every successful write triggers a
//! relation-changed notification on every peer, including the writer,
//! at-least-once and with no ordering across peers.

use crate::types::{DataBag, Scope, UnitId};
use crate::ProxyResult;
use async_trait::async_trait;

/// One unit's view of the cluster directory
#[async_trait]
pub trait DirectoryEffects: Send + Sync {
    /// Unit this view of the directory belongs to
    fn local_unit(&self) -> &UnitId;

    /// Snapshot of one bag; absent bags read as empty
    async fn read_bag(&self, scope: &Scope) -> ProxyResult<DataBag>;

    /// Merge `updates` into a bag. An empty value removes the key.
    ///
    /// Writing another unit's bag fails with `PermissionDenied`. Writing
    /// `Scope::Application` is reserved to the current leader.
    async fn update_bag(&self, scope: &Scope, updates: DataBag) -> ProxyResult<()>;

    /// Units currently participating in the relation
    async fn members(&self) -> ProxyResult<Vec<UnitId>>;
}
