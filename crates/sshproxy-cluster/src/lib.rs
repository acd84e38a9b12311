//! # sshproxy-cluster - Layer 4: Credential Bootstrap Protocol
//!
//! Makes a cluster of peer units agree on one SSH keypair. The elected
//! leader generates the key and publishes it in the application bag of the
//! cluster directory; every other unit adopts it when it observes the
//! publication.
//!
//! ## Components
//!
//! - [`IdentityStore`]: the local unit's key material
//! - [`ClusterDirectory`]: typed access to the peer relation bags
//! - [`BootstrapCoordinator`]: the bootstrap state machine
//! - [`ConfigReconciler`]: credential verification and status
//! - [`actions`]: typed operator actions
//! - [`UnitRuntime`]: one-at-a-time delivery with persisted deferral
//!
//! Everything is generic over the effect traits in `sshproxy-core`; nothing
//! here performs I/O directly.

#![forbid(unsafe_code)]

pub mod actions;
pub mod bootstrap;
pub mod directory;
pub mod facts;
pub mod identity;
pub mod reconciler;
pub mod runtime;

pub use actions::{Action, ActionHandler, ActionOutcome, ACTION_SCHEMAS};
pub use bootstrap::{BootstrapCoordinator, BootstrapPhase, BootstrapRecord, KeyOrigin, Role};
pub use directory::ClusterDirectory;
pub use facts::ClusterInitialized;
pub use identity::{Adoption, IdentityStore};
pub use reconciler::ConfigReconciler;
pub use runtime::{UnitReport, UnitRuntime};

/// Status reported while a follower waits for the leader's key
pub const WAITING_FOR_LEADER: &str = "Waiting for leader to populate the keys";
/// Status reported while the leader generates the cluster key
pub const GENERATING_KEYS: &str = "Generating SSH keys...";
/// Status reported for the duration of an upgrade
pub const UPGRADING: &str = "Upgrading charm";
/// Status reported while credentials are being verified
pub const WAITING_FOR_CREDENTIALS: &str = "Waiting for SSH credentials";
/// Status reported when the remote rejects the configured credentials
pub const INVALID_CREDENTIALS: &str = "Invalid SSH credentials.";
