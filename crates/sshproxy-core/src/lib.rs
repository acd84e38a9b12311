//! # sshproxy-core - Layer 1: Types, Errors, Effect Interfaces
//!
//! Foundation crate for the sshproxy credential bootstrap. A cluster of peer
//! units agrees on exactly one SSH keypair: the elected leader generates it and
//! publishes it through the cluster directory, every other unit adopts it.
//!
//! ## What Belongs Here
//!
//! - Domain types: [`UnitId`], [`Keypair`], [`Scope`], [`UnitStatus`], [`HookEvent`]
//! - The unified [`ProxyError`] and [`ProxyResult`]
//! - Effect traits describing every capability the protocol consumes
//! - Pure OpenSSH key encoding helpers
//!
//! ## What Does NOT Belong Here
//!
//! - Effect handler implementations (belong in `sshproxy-effects`)
//! - Protocol state machines (belong in `sshproxy-cluster`)
//! - Mocks and simulation (belong in `sshproxy-testkit`)

#![forbid(unsafe_code)]

pub mod crypto;
pub mod effects;
pub mod errors;
pub mod types;

pub use errors::{ProxyError, ProxyResult};
pub use types::{
    bag_from, CommandOutput, DataBag, HandlerOutcome, HookEvent, Keypair, RemoteTarget, Scope, UnitId,
    UnitStatus,
};
