//! # sshproxy-effects - Layer 3: Effect Handlers
//!
//! Stateless, single-unit implementations of the effect traits defined in
//! `sshproxy-core`, plus [`UnitEffectSystem`] which composes one handler per
//! capability into a value implementing `UnitEffects`.
//!
//! ## Handlers
//!
//! - **Storage**: [`FilesystemStorageHandler`], [`MemoryStorageHandler`]
//! - **Crypto**: [`RealCryptoHandler`] (ed25519, OpenSSH encoding)
//! - **Leadership**: [`StaticLeadershipHandler`], [`FileLeadershipHandler`]
//! - **Directory**: [`FilesystemDirectoryHandler`], [`MemoryDirectory`]
//! - **Remote**: [`SshCommandExecutor`] (system `ssh` client)
//! - **Config**: [`StaticConfigHandler`]
//! - **Status**: [`TracingStatusHandler`]
//!
//! Deterministic mocks belong in `sshproxy-testkit`, not here.

#![forbid(unsafe_code)]

pub mod configuration;
pub mod crypto;
pub mod directory;
pub mod leadership;
pub mod remote;
pub mod status;
pub mod storage;
pub mod system;

pub use configuration::StaticConfigHandler;
pub use crypto::RealCryptoHandler;
pub use directory::{FilesystemDirectoryHandler, MemoryDirectory, MemoryDirectoryHandler};
pub use leadership::{FileLeadershipHandler, StaticLeadershipHandler};
pub use remote::SshCommandExecutor;
pub use status::TracingStatusHandler;
pub use storage::{FilesystemStorageHandler, MemoryStorageHandler};
pub use system::{UnitEffectSystem, UnitEffectSystemBuilder};
