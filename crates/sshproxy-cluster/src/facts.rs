//! Cluster lifecycle facts
//!
//! [`ClusterInitialized`] is emitted once, by the leader, after the cluster
//! key is generated. It is stored in the application bag rather than sent as
//! a message, so any unit can observe it any number of times and consuming
//! it is idempotent.

use sshproxy_core::{bag_from, DataBag, Keypair, ProxyError, ProxyResult, UnitId};

/// Application bag key holding the public key line
pub const PUBLIC_KEY_FIELD: &str = "ssh-public-key";
/// Application bag key holding the private key PEM
pub const PRIVATE_KEY_FIELD: &str = "ssh-private-key";
/// Application bag key naming the publishing leader
pub const INITIALIZED_BY_FIELD: &str = "initialized-by";
/// Application bag key holding the public key fingerprint
pub const FINGERPRINT_FIELD: &str = "ssh-key-fingerprint";

/// The cluster key has been generated and published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInitialized {
    /// The cluster key
    pub keypair: Keypair,
    /// Leader that published the key; absent in bags written by older units
    pub initialized_by: Option<UnitId>,
}

impl ClusterInitialized {
    /// Fact for `keypair` published by `initialized_by`
    pub fn new(keypair: Keypair, initialized_by: UnitId) -> Self {
        Self {
            keypair,
            initialized_by: Some(initialized_by),
        }
    }

    /// Bag entries recording this fact
    pub fn to_bag(&self) -> ProxyResult<DataBag> {
        let fingerprint = self.keypair.fingerprint();
        let mut bag = bag_from([
            (PUBLIC_KEY_FIELD, self.keypair.public_key_str()?),
            (PRIVATE_KEY_FIELD, self.keypair.private_key_str()?),
            (FINGERPRINT_FIELD, fingerprint.as_str()),
        ]);
        if let Some(leader) = &self.initialized_by {
            bag.insert(INITIALIZED_BY_FIELD.to_string(), leader.to_string());
        }
        Ok(bag)
    }

    /// Read the fact out of an application bag.
    ///
    /// `None` until both key halves are present.
    pub fn from_bag(bag: &DataBag) -> ProxyResult<Option<Self>> {
        let public = bag.get(PUBLIC_KEY_FIELD).filter(|v| !v.is_empty());
        let private = bag.get(PRIVATE_KEY_FIELD).filter(|v| !v.is_empty());
        let (Some(public), Some(private)) = (public, private) else {
            return Ok(None);
        };

        let initialized_by = bag
            .get(INITIALIZED_BY_FIELD)
            .map(String::as_str)
            .map(UnitId::parse)
            .transpose()
            .map_err(|e| ProxyError::directory(format!("bad {INITIALIZED_BY_FIELD}: {e}")))?;

        Ok(Some(Self {
            keypair: Keypair::new(public.as_bytes(), private.as_bytes()),
            initialized_by,
        }))
    }
}
