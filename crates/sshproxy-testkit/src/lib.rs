//! # sshproxy-testkit - Layer 8: Test Infrastructure
//!
//! Deterministic mock effect handlers, an in-process multi-unit cluster
//! simulation, and proptest strategies for schedules of hook deliveries.
//!
//! Production handlers live in `sshproxy-effects`; everything here trades
//! realism for reproducibility: key generation is seeded, leadership can be
//! moved at an exact query, and the remote host is scripted.

#![forbid(unsafe_code)]

pub mod cluster;
pub mod mock_effects;
pub mod strategies;

pub use cluster::{SimulatedCluster, SimulatedUnit};
pub use mock_effects::{
    CrashSwitch, CrashingStorage, LeaderRegistry, MockCryptoHandler, MockLeadershipHandler,
    MockRemoteExecutor, MockStatusHandler, VerifyBehavior,
};
pub use strategies::{arb_schedule, Step};
