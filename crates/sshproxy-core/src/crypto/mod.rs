//! Pure cryptographic encodings
//!
//! Key generation itself is an effect (`CryptoEffects`); this module only
//! holds deterministic encoding and parsing.

pub mod openssh;
