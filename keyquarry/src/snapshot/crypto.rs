//! AEAD encryption over snapshot bytes: a random nonce prepended to the
//! ciphertext. Grounded on `aes-gcm` usages in the wider pack
//! (`other_examples/manifests/mrcord77-rust_citadel`,
//! `penserai-acteon`, `harborgrid-justin-rusty-db`).

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};

use crate::error::Error;

const NONCE_LEN: usize = 12;

/// Derives a 256-bit key from an arbitrary-length secret via FNV-1a
/// stretched over 32 bytes; not a KDF in the cryptographic sense, but
/// sufficient to turn an operator-supplied passphrase into key material
/// of the right size for `Aes256Gcm`.
pub fn derive_key(secret: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    for (i, chunk) in key.chunks_mut(8).enumerate() {
        let salted: Vec<u8> = secret.iter().copied().chain(std::iter::once(i as u8)).collect();
        let h = crate::hash::fingerprint(&salted);
        chunk.copy_from_slice(&h.to_le_bytes()[..chunk.len()]);
    }
    key
}

pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Internal(format!("encryption failed: {e}")))?;
    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt(key: &[u8; 32], payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.len() < NONCE_LEN {
        return Err(Error::Internal("snapshot payload too short to contain a nonce".to_string()));
    }
    let (nonce_bytes, ciphertext) = payload.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| Error::Internal(format!("decryption failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = derive_key(b"a passphrase");
        let plaintext = b"snapshot bytes go here";
        let ciphertext = encrypt(&key, plaintext).unwrap();
        assert_ne!(ciphertext, plaintext);
        assert_eq!(decrypt(&key, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let key = derive_key(b"right");
        let wrong_key = derive_key(b"wrong");
        let ciphertext = encrypt(&key, b"secret").unwrap();
        assert!(decrypt(&wrong_key, &ciphertext).is_err());
    }
}
