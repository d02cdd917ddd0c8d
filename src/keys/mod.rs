//! Key material and the key functions exposed by the database collaborator.
//!
//! `KeyMaterial` is a fixed 32-byte value. It is zeroized on drop and never
//! printed by its `Debug` impl.

mod resolver;

pub use resolver::*;

use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length in bytes of every key handled by the session.
pub const KEY_LEN: usize = 32;

/// BLAKE3 context string for passphrase derivation. Changing it changes every derived key.
const DERIVATION_CONTEXT: &str = "polarysdb-cli 2024 key derivation";

/// Fixed-length key material used to open and operate on a database.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; KEY_LEN]);

impl KeyMaterial {
    /// The all-zero key. Only produced for the explicit empty-key sentinel.
    pub fn empty() -> Self {
        Self([0u8; KEY_LEN])
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Builds a key from a slice, returning `None` unless it is exactly `KEY_LEN` bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; KEY_LEN] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Lowercase hex encoding, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// Generates fresh random key material from the OS RNG.
///
/// Never returns the all-zero key; that value is reserved for the empty-key sentinel.
pub fn generate_key() -> KeyMaterial {
    loop {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        let key = KeyMaterial::from_bytes(bytes);
        if !key.is_empty() {
            return key;
        }
    }
}

/// Deterministically derives key material from arbitrary bytes.
pub fn generate_key_from_bytes(bytes: &[u8]) -> KeyMaterial {
    KeyMaterial::from_bytes(blake3::derive_key(DERIVATION_CONTEXT, bytes))
}
