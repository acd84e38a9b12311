//! Per-unit event delivery
//!
//! Notifications for one unit are handled strictly one at a time. A
//! notification whose handler returns `Deferred` is kept in a queue that is
//! persisted in local storage and re-delivered, in order, before the next
//! notification and on every [`tick`](UnitRuntime::tick). Deferral has no
//! retry bound.

use crate::actions::{Action, ActionHandler, ActionOutcome};
use crate::bootstrap::{BootstrapCoordinator, BootstrapPhase};
use serde::Serialize;
use serde_json::{Map, Value};
use sshproxy_core::effects::UnitEffects;
use sshproxy_core::{HandlerOutcome, HookEvent, ProxyResult, UnitId, UnitStatus};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Storage key of the persisted deferred queue
pub const DEFERRED_EVENTS_KEY: &str = "deferred-events";

/// Snapshot of a unit for operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    /// Unit the report describes
    pub unit: UnitId,
    /// Last reported status
    pub status: Option<UnitStatus>,
    /// Current phase
    pub phase: BootstrapPhase,
    /// Fingerprint of the held key
    pub fingerprint: Option<String>,
    /// Events waiting for redelivery
    pub deferred: Vec<HookEvent>,
}

/// Delivers events and actions to one unit
pub struct UnitRuntime<E: UnitEffects> {
    coordinator: BootstrapCoordinator<E>,
    // Serializes deliveries when the runtime is shared between tasks
    delivery: Mutex<()>,
}

impl<E: UnitEffects> UnitRuntime<E> {
    /// Create over the given effects
    pub fn new(effects: Arc<E>) -> Self {
        Self {
            coordinator: BootstrapCoordinator::new(effects),
            delivery: Mutex::new(()),
        }
    }

    /// The bootstrap coordinator
    pub fn coordinator(&self) -> &BootstrapCoordinator<E> {
        &self.coordinator
    }

    /// Unit this belongs to
    pub fn unit(&self) -> &UnitId {
        self.coordinator.directory().local_unit()
    }

    /// Re-deliver deferred events, then deliver `event`
    pub async fn deliver(&self, event: HookEvent) -> ProxyResult<HandlerOutcome> {
        let _guard = self.delivery.lock().await;
        self.redeliver().await?;

        let outcome = self.dispatch(&event).await?;
        if outcome.is_deferred() {
            let mut queue = self.load_deferred().await?;
            if !queue.contains(&event) {
                queue.push(event);
                self.save_deferred(&queue).await?;
            }
        }
        Ok(outcome)
    }

    /// Re-deliver deferred events. Returns how many remain deferred.
    pub async fn tick(&self) -> ProxyResult<usize> {
        let _guard = self.delivery.lock().await;
        self.redeliver().await
    }

    /// Events currently deferred, oldest first
    pub async fn pending_deferred(&self) -> ProxyResult<Vec<HookEvent>> {
        self.load_deferred().await
    }

    /// Parse and execute an action
    pub async fn run_action(&self, name: &str, params: &Map<String, Value>) -> ActionOutcome {
        let _guard = self.delivery.lock().await;
        match Action::parse(name, params) {
            Ok(action) => ActionHandler::new(&self.coordinator).execute(&action).await,
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }

    /// Snapshot of the unit for operators
    pub async fn report(&self) -> ProxyResult<UnitReport> {
        let effects = self.coordinator.effect_system();
        let identity = self.coordinator.identity();
        let fingerprint = if identity.has_key().await? {
            Some(identity.keypair().await?.fingerprint())
        } else {
            None
        };

        Ok(UnitReport {
            unit: self.unit().clone(),
            status: effects.status().await?,
            phase: self.coordinator.record().await?.phase,
            fingerprint,
            deferred: self.load_deferred().await?,
        })
    }

    async fn redeliver(&self) -> ProxyResult<usize> {
        let queue = self.load_deferred().await?;
        if queue.is_empty() {
            return Ok(0);
        }

        tracing::debug!(unit = %self.unit(), pending = queue.len(), "Re-delivering deferred events");
        let mut remaining = Vec::with_capacity(queue.len());
        for event in queue {
            if self.dispatch(&event).await?.is_deferred() {
                remaining.push(event);
            }
        }
        self.save_deferred(&remaining).await?;
        Ok(remaining.len())
    }

    async fn dispatch(&self, event: &HookEvent) -> ProxyResult<HandlerOutcome> {
        let outcome = self.coordinator.handle(event).await;
        if let HandlerOutcome::Failed(e) = &outcome {
            tracing::error!(unit = %self.unit(), event = %event, error = %e, "Event handler failed");
            if e.blocks_unit() {
                self.coordinator
                    .effect_system()
                    .set_status(UnitStatus::blocked(e.to_string()))
                    .await?;
            }
        }
        Ok(outcome)
    }

    async fn load_deferred(&self) -> ProxyResult<Vec<HookEvent>> {
        match self
            .coordinator
            .effect_system()
            .retrieve(DEFERRED_EVENTS_KEY)
            .await?
        {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save_deferred(&self, queue: &[HookEvent]) -> ProxyResult<()> {
        let effects = self.coordinator.effect_system();
        if queue.is_empty() {
            effects.remove(DEFERRED_EVENTS_KEY).await?;
            return Ok(());
        }
        effects
            .store(DEFERRED_EVENTS_KEY, serde_json::to_vec(queue)?)
            .await
    }
}
