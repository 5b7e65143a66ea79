//! # Envelope Encryption
//!
//! XChaCha20-Poly1305 wrapper used for ciphered serialization envelopes.
//! The 24-byte nonce is random per envelope and travels in front of the
//! ciphertext; the Poly1305 tag makes tampering detectable.

use crate::error::{Result, WireError};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;

pub struct Crypto {
    cipher: XChaCha20Poly1305,
}

impl Crypto {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Crypto {
            cipher: XChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Fresh random nonce from the OS entropy source.
    pub fn generate_nonce() -> Result<[u8; NONCE_LEN]> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::fill(&mut nonce).map_err(|_| WireError::EncryptionFailure)?;
        Ok(nonce)
    }

    pub fn encrypt(&self, plaintext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
        self.cipher
            .encrypt(XNonce::from_slice(nonce), plaintext)
            .map_err(|_| WireError::EncryptionFailure)
    }

    pub fn decrypt(&self, ciphertext: &[u8], nonce: &[u8; NONCE_LEN]) -> Result<Vec<u8>> {
        self.cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .map_err(|_| WireError::DecryptionFailure)
    }
}
