//! Effect trait definitions
//!
//! Every capability the bootstrap protocol consumes is an injected effect.
//! Handlers live in `sshproxy-effects` (production) and `sshproxy-testkit`
//! (deterministic mocks). Protocol code is generic over [`UnitEffects`], the
//! composition of all of them, so tests can swap any single capability.

pub mod config;
pub mod crypto;
pub mod directory;
pub mod leadership;
pub mod remote;
pub mod status;
pub mod storage;

pub use config::ConfigEffects;
pub use crypto::CryptoEffects;
pub use directory::DirectoryEffects;
pub use leadership::LeadershipEffects;
pub use remote::RemoteExecutorEffects;
pub use status::StatusEffects;
pub use storage::StorageEffects;

/// Composed effects required by a unit running the bootstrap protocol
pub trait UnitEffects:
    LeadershipEffects
    + CryptoEffects
    + StorageEffects
    + DirectoryEffects
    + RemoteExecutorEffects
    + ConfigEffects
    + StatusEffects
    + Send
    + Sync
{
}

/// Blanket implementation for any type that implements all required traits.
impl<T> UnitEffects for T where
    T: LeadershipEffects
        + CryptoEffects
        + StorageEffects
        + DirectoryEffects
        + RemoteExecutorEffects
        + ConfigEffects
        + StatusEffects
        + Send
        + Sync
{
}
