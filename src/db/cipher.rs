//! AES-256-GCM sealing of snapshots.

use super::{StoreError, StoreResult};
use crate::keys::KeyMaterial;
use crate::models::{SealedSnapshot, SEALED_FORMAT_VERSION};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use std::path::Path;

/// Size of AES-GCM nonce in bytes
const NONCE_SIZE: usize = 12;

pub(crate) fn seal(key: &KeyMaterial, plaintext: &[u8]) -> StoreResult<SealedSnapshot> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| StoreError::Encrypt)?;

    Ok(SealedSnapshot {
        format_version: SEALED_FORMAT_VERSION,
        nonce: hex::encode(nonce),
        ciphertext: hex::encode(ciphertext),
    })
}

/// Decrypts `sealed`. `origin` names the file in errors.
pub(crate) fn unseal(
    key: &KeyMaterial,
    sealed: &SealedSnapshot,
    origin: &Path,
) -> StoreResult<Vec<u8>> {
    let decrypt_err = || StoreError::Decrypt(origin.to_path_buf());

    if sealed.format_version != SEALED_FORMAT_VERSION {
        return Err(decrypt_err());
    }
    let nonce = hex::decode(&sealed.nonce).map_err(|_| decrypt_err())?;
    if nonce.len() != NONCE_SIZE {
        return Err(decrypt_err());
    }
    let ciphertext = hex::decode(&sealed.ciphertext).map_err(|_| decrypt_err())?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
        .map_err(|_| decrypt_err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;

    #[test]
    fn test_unseal_with_wrong_key_fails() {
        let sealed = seal(&generate_key(), b"{\"entries\":{}}").unwrap();
        let result = unseal(&generate_key(), &sealed, Path::new("db.dat"));
        assert!(matches!(result, Err(StoreError::Decrypt(_))));
    }

    #[test]
    fn test_unseal_rejects_tampered_ciphertext() {
        let key = generate_key();
        let mut sealed = seal(&key, b"payload").unwrap();
        let mut bytes = hex::decode(&sealed.ciphertext).unwrap();
        bytes[0] ^= 0xff;
        sealed.ciphertext = hex::encode(bytes);

        assert!(unseal(&key, &sealed, Path::new("db.dat")).is_err());
    }

    #[test]
    fn test_each_seal_uses_a_fresh_nonce() {
        let key = generate_key();
        let a = seal(&key, b"payload").unwrap();
        let b = seal(&key, b"payload").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(unseal(&key, &a, Path::new("x")).unwrap(), b"payload");
    }
}
