//! SSH keypair material
//!
//! Both halves are stored as the exact bytes written to disk: the OpenSSH
//! public key line and the OpenSSH private key PEM. Equality is byte
//! equality of both halves, compared in constant time.

use crate::crypto::openssh;
use crate::{ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// An SSH keypair shared by every unit of the cluster
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct Keypair {
    public_key: Vec<u8>,
    private_key: Vec<u8>,
}

impl Keypair {
    /// Wrap raw key material
    pub fn new(public_key: impl Into<Vec<u8>>, private_key: impl Into<Vec<u8>>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }

    /// Public half as stored
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Private half as stored
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    /// Public half as UTF-8 text
    pub fn public_key_str(&self) -> ProxyResult<&str> {
        std::str::from_utf8(&self.public_key)
            .map_err(|e| ProxyError::invalid(format!("public key is not UTF-8: {e}")))
    }

    /// Private half as UTF-8 text
    pub fn private_key_str(&self) -> ProxyResult<&str> {
        std::str::from_utf8(&self.private_key)
            .map_err(|e| ProxyError::invalid(format!("private key is not UTF-8: {e}")))
    }

    /// OpenSSH-style `SHA256:` fingerprint of the public key.
    ///
    /// Material that is not an OpenSSH public line is hashed as raw bytes.
    pub fn fingerprint(&self) -> String {
        let blob = self
            .public_key_str()
            .ok()
            .and_then(|line| openssh::decode_public_key_line(line).ok());
        match blob {
            Some(blob) => openssh::fingerprint(&blob),
            None => openssh::fingerprint(&self.public_key),
        }
    }

    /// Check that both halves parse and describe the same ed25519 key
    pub fn validate(&self) -> ProxyResult<()> {
        let public_blob = openssh::decode_public_key_line(self.public_key_str()?)?;
        let private_blob = openssh::private_key_public_blob(self.private_key_str()?)?;
        if public_blob != private_blob {
            return Err(ProxyError::invalid(
                "public key does not match private key",
            ));
        }
        Ok(())
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        let public = self.public_key.ct_eq(&other.public_key);
        let private = self.private_key.ct_eq(&other.private_key);
        (public & private).into()
    }
}

impl Eq for Keypair {}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("fingerprint", &self.fingerprint())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_covers_both_halves() {
        let a = Keypair::new("pub", "priv");
        assert_eq!(a, Keypair::new("pub", "priv"));
        assert_ne!(a, Keypair::new("pub", "other"));
        assert_ne!(a, Keypair::new("other", "priv"));
        assert_ne!(a, Keypair::new("pub", "privx"));
    }

    #[test]
    fn debug_redacts_private_half() {
        let pair = Keypair::new("pub", "super-secret");
        let rendered = format!("{pair:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn fingerprint_of_raw_material_is_stable() {
        let a = Keypair::new("not an ssh key", "x");
        let b = Keypair::new("not an ssh key", "y");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(a.fingerprint().starts_with("SHA256:"));
    }

    #[test]
    fn validate_rejects_garbage() {
        assert!(Keypair::new("pub", "priv").validate().is_err());
    }
}
