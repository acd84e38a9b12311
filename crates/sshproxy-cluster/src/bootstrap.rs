//! Bootstrap state machine
//!
//! ```text
//! Uninitialized ──▶ KeyPending(Leader)   ──publish──▶ Ready
//!               └─▶ KeyPending(Follower) ──adopt────▶ Ready
//! ```
//!
//! The coordinator holds no state of its own. Key material lives in the
//! [`IdentityStore`], the published key in the [`ClusterDirectory`], and the
//! [`BootstrapRecord`] is persisted in local storage after every transition,
//! so a unit that restarts between two hooks resumes where it stopped.
//!
//! Leadership is asked for at every decision point and never cached. The
//! one window that matters is between generating a key and publishing it:
//! a leader that loses leadership there discards its key, and a unit that
//! finds an unpublished key of its own after a restart either publishes it
//! (still leading, nothing published) or replaces it with the published one.
//! The pending record is written before the key, so a crash between the two
//! never leaves a key that looks adopted.
//!
//! Install on a unit that joins after publication adopts the published key
//! directly, leader or not.

use crate::directory::ClusterDirectory;
use crate::identity::{Adoption, IdentityStore};
use crate::reconciler::ConfigReconciler;
use crate::{GENERATING_KEYS, UPGRADING, WAITING_FOR_LEADER};
use serde::{Deserialize, Serialize};
use sshproxy_core::effects::UnitEffects;
use sshproxy_core::{HandlerOutcome, HookEvent, Keypair, ProxyError, ProxyResult, UnitStatus};
use std::fmt;
use std::sync::Arc;

/// Storage key of the persisted [`BootstrapRecord`]
pub const BOOTSTRAP_RECORD_KEY: &str = "bootstrap-record";

/// Which side of the protocol a pending unit is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Generates and publishes the key
    Leader,
    /// Waits for the leader's key
    Follower,
}

/// Position in the bootstrap state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapPhase {
    /// No hook has run yet
    #[default]
    Uninitialized,
    /// Waiting for a key, either our own publication or the leader's
    KeyPending(Role),
    /// The unit holds the cluster key
    Ready,
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::KeyPending(Role::Leader) => f.write_str("key-pending (leader)"),
            Self::KeyPending(Role::Follower) => f.write_str("key-pending (follower)"),
            Self::Ready => f.write_str("ready"),
        }
    }
}

/// Where the local key came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyOrigin {
    /// Generated by this unit as leader
    Generated {
        /// Whether the key was seen in the application bag
        published: bool,
    },
    /// Copied from the published key
    Adopted,
}

/// Bootstrap progress persisted in local storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapRecord {
    /// Current phase
    pub phase: BootstrapPhase,
    /// Origin of the held key; `None` before a key is recorded
    #[serde(default)]
    pub key_origin: Option<KeyOrigin>,
}

impl BootstrapRecord {
    /// A key was generated here and has not been seen published yet
    pub fn awaiting_publication(&self) -> bool {
        matches!(
            self.key_origin,
            Some(KeyOrigin::Generated { published: false })
        )
    }

    fn ready(key_origin: KeyOrigin) -> Self {
        Self {
            phase: BootstrapPhase::Ready,
            key_origin: Some(key_origin),
        }
    }

    fn waiting_for_leader() -> Self {
        Self {
            phase: BootstrapPhase::KeyPending(Role::Follower),
            key_origin: None,
        }
    }
}

/// Drives one unit through the bootstrap protocol
pub struct BootstrapCoordinator<E: UnitEffects> {
    effects: Arc<E>,
    identity: IdentityStore<E>,
    directory: ClusterDirectory<E>,
    reconciler: ConfigReconciler<E>,
}

impl<E: UnitEffects> BootstrapCoordinator<E> {
    /// Create over the given effects
    pub fn new(effects: Arc<E>) -> Self {
        Self {
            identity: IdentityStore::new(effects.clone()),
            directory: ClusterDirectory::new(effects.clone()),
            reconciler: ConfigReconciler::new(effects.clone()),
            effects,
        }
    }

    /// Effects this coordinator runs on
    pub fn effect_system(&self) -> &Arc<E> {
        &self.effects
    }

    /// Local key store
    pub fn identity(&self) -> &IdentityStore<E> {
        &self.identity
    }

    /// Cluster directory access
    pub fn directory(&self) -> &ClusterDirectory<E> {
        &self.directory
    }

    /// Credential reconciler
    pub fn reconciler(&self) -> &ConfigReconciler<E> {
        &self.reconciler
    }

    /// The persisted record, or the initial one if none was written yet
    pub async fn record(&self) -> ProxyResult<BootstrapRecord> {
        match self.effects.retrieve(BOOTSTRAP_RECORD_KEY).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(BootstrapRecord::default()),
        }
    }

    async fn save_record(&self, record: &BootstrapRecord) -> ProxyResult<()> {
        tracing::debug!(unit = %self.directory.local_unit(), phase = %record.phase, "Bootstrap record updated");
        self.effects
            .store(BOOTSTRAP_RECORD_KEY, serde_json::to_vec(record)?)
            .await
    }

    /// Handle one notification
    pub async fn handle(&self, event: &HookEvent) -> HandlerOutcome {
        tracing::debug!(unit = %self.directory.local_unit(), event = %event, "Handling event");
        let result = match event {
            HookEvent::Install | HookEvent::LeaderElected => self.on_install().await,
            HookEvent::Upgrade => self.on_upgrade().await,
            HookEvent::ConfigChanged => self.on_config_changed().await,
            HookEvent::PeerRelationChanged { .. } => self.on_relation_changed().await,
        };
        result.into()
    }

    async fn on_install(&self) -> ProxyResult<HandlerOutcome> {
        match self.ensure_cluster_key().await {
            Ok(_) => Ok(HandlerOutcome::Handled),
            Err(e) if e.is_not_leader() => {
                tracing::info!(unit = %self.directory.local_unit(), "Not leader, waiting for the cluster key");
                self.effects
                    .set_status(UnitStatus::waiting(WAITING_FOR_LEADER))
                    .await?;
                self.save_record(&BootstrapRecord::waiting_for_leader())
                    .await?;
                Ok(HandlerOutcome::Handled)
            }
            Err(e) => Err(e),
        }
    }

    async fn on_upgrade(&self) -> ProxyResult<HandlerOutcome> {
        self.effects
            .set_status(UnitStatus::maintenance(UPGRADING))
            .await?;
        let outcome = self.on_install().await?;
        if self.identity.has_key().await? {
            self.effects.set_status(UnitStatus::Active).await?;
        }
        Ok(outcome)
    }

    async fn on_config_changed(&self) -> ProxyResult<HandlerOutcome> {
        self.reconciler.reconcile().await?;
        Ok(HandlerOutcome::Handled)
    }

    async fn on_relation_changed(&self) -> ProxyResult<HandlerOutcome> {
        let Some(published) = self.directory.read_application_key().await? else {
            tracing::debug!(unit = %self.directory.local_unit(), "Cluster not initialized, deferring");
            return Ok(HandlerOutcome::Deferred);
        };

        let record = self.record().await?;
        let origin = match self.identity.adopt_key(&published).await {
            Ok(Adoption::Stored) => KeyOrigin::Adopted,
            Ok(Adoption::AlreadyHeld) => match record.key_origin {
                Some(KeyOrigin::Generated { .. }) => KeyOrigin::Generated { published: true },
                _ => KeyOrigin::Adopted,
            },
            Err(ProxyError::KeyConflict { .. }) if record.awaiting_publication() => {
                self.replace_unpublished(&published).await?;
                KeyOrigin::Adopted
            }
            Err(e) => return Err(e),
        };
        self.save_record(&BootstrapRecord::ready(origin)).await?;

        self.reconciler.reconcile().await?;
        Ok(HandlerOutcome::Handled)
    }

    /// Make sure this unit holds the cluster key, adopting the published key
    /// or, when this unit leads and nothing is published, generating and
    /// publishing one.
    ///
    /// Never replaces a key the unit already holds. Fails with `NotLeader`
    /// when a key would have to be generated by a non-leader.
    pub async fn ensure_cluster_key(&self) -> ProxyResult<Keypair> {
        let record = self.record().await?;

        if self.identity.has_key().await? {
            return match record.key_origin {
                Some(KeyOrigin::Generated { published: false }) => self.resume_publication().await,
                None => self.confirm_unrecorded_key().await,
                Some(origin) => {
                    if record.phase != BootstrapPhase::Ready {
                        self.save_record(&BootstrapRecord::ready(origin)).await?;
                    }
                    self.identity.keypair().await
                }
            };
        }

        if let Some(published) = self.directory.read_application_key().await? {
            tracing::info!(unit = %self.directory.local_unit(), "Cluster key already published, adopting it");
            self.identity.adopt_key(&published).await?;
            self.save_record(&BootstrapRecord::ready(KeyOrigin::Adopted))
                .await?;
            self.effects.set_status(UnitStatus::Active).await?;
            return Ok(published);
        }

        self.effects.require_leader().await?;
        self.effects
            .set_status(UnitStatus::maintenance(GENERATING_KEYS))
            .await?;

        // Recorded before the key exists so a crash in between resumes
        // publication instead of treating the key as adopted
        self.save_record(&BootstrapRecord {
            phase: BootstrapPhase::KeyPending(Role::Leader),
            key_origin: Some(KeyOrigin::Generated { published: false }),
        })
        .await?;
        let keypair = self
            .identity
            .generate_key(self.directory.local_unit().as_str())
            .await?;

        self.publish(keypair).await
    }

    /// A key is held but no record says where it came from
    async fn confirm_unrecorded_key(&self) -> ProxyResult<Keypair> {
        let local = self.identity.keypair().await?;
        match self.directory.read_application_key().await? {
            Some(published) if published == local => {
                self.save_record(&BootstrapRecord::ready(KeyOrigin::Adopted))
                    .await?;
                Ok(local)
            }
            Some(published) => Err(ProxyError::key_conflict(format!(
                "local key {} differs from published key {}",
                local.fingerprint(),
                published.fingerprint()
            ))),
            None => {
                tracing::info!(unit = %self.directory.local_unit(), "Publishing unrecorded local key");
                self.save_record(&BootstrapRecord {
                    phase: BootstrapPhase::KeyPending(Role::Leader),
                    key_origin: Some(KeyOrigin::Generated { published: false }),
                })
                .await?;
                self.publish(local).await
            }
        }
    }

    /// A key generated here was never seen published
    async fn resume_publication(&self) -> ProxyResult<Keypair> {
        let local = self.identity.keypair().await?;
        match self.directory.read_application_key().await? {
            Some(published) if published == local => {
                self.save_record(&BootstrapRecord::ready(KeyOrigin::Generated {
                    published: true,
                }))
                .await?;
                Ok(local)
            }
            Some(published) => {
                self.replace_unpublished(&published).await?;
                self.save_record(&BootstrapRecord::ready(KeyOrigin::Adopted))
                    .await?;
                Ok(published)
            }
            None => {
                tracing::info!(unit = %self.directory.local_unit(), "Resuming publication of local key");
                self.publish(local).await
            }
        }
    }

    async fn publish(&self, keypair: Keypair) -> ProxyResult<Keypair> {
        match self.directory.publish_application_key(&keypair).await {
            Ok(()) => {
                self.save_record(&BootstrapRecord::ready(KeyOrigin::Generated {
                    published: true,
                }))
                .await?;
                self.effects.set_status(UnitStatus::Active).await?;
                Ok(keypair)
            }
            Err(e) if e.is_not_leader() => {
                tracing::warn!(unit = %self.directory.local_unit(), "Lost leadership before publishing, discarding key");
                self.identity.forget_key().await?;
                self.save_record(&BootstrapRecord::waiting_for_leader())
                    .await?;
                Err(e)
            }
            Err(ProxyError::KeyConflict { .. }) => {
                let published = self
                    .directory
                    .read_application_key()
                    .await?
                    .ok_or_else(|| ProxyError::internal("conflicting cluster key vanished"))?;
                self.replace_unpublished(&published).await?;
                self.save_record(&BootstrapRecord::ready(KeyOrigin::Adopted))
                    .await?;
                self.effects.set_status(UnitStatus::Active).await?;
                Ok(published)
            }
            Err(e) => Err(e),
        }
    }

    async fn replace_unpublished(&self, published: &Keypair) -> ProxyResult<()> {
        tracing::warn!(
            unit = %self.directory.local_unit(),
            fingerprint = %published.fingerprint(),
            "Replacing unpublished local key with the published cluster key"
        );
        self.identity.forget_key().await?;
        self.identity.adopt_key(published).await?;
        Ok(())
    }
}
