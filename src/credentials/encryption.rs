//! AES-256-GCM sealing for credential blobs.
//!
//! A sealed blob is `base64(nonce || ciphertext)`, so one column holds
//! everything needed to open it. The master key is 32 bytes, provided
//! base64-encoded through configuration.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Size of the encryption key in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes (96 bits, standard for GCM)
const NONCE_SIZE: usize = 12;

/// Decode a base64 master key and check it is exactly 32 bytes.
pub fn validate_key(key_base64: &str) -> Result<Vec<u8>> {
    let key_bytes = BASE64
        .decode(key_base64.trim())
        .context("Failed to decode base64 encryption key")?;

    if key_bytes.len() != KEY_SIZE {
        return Err(anyhow!(
            "Encryption key must be {} bytes (256 bits), got {} bytes",
            KEY_SIZE,
            key_bytes.len()
        ));
    }

    Ok(key_bytes)
}

/// Seals and opens credential blobs with one master key.
#[derive(Clone)]
pub struct BlobCipher {
    cipher: Aes256Gcm,
}

impl BlobCipher {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(anyhow!("Encryption key must be {} bytes", KEY_SIZE));
        }
        let cipher =
            Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(sealed))
    }

    /// Decrypt a blob produced by [`BlobCipher::seal`].
    ///
    /// Fails on a wrong key, truncation, or any tampering.
    pub fn open(&self, sealed: &str) -> Result<String> {
        let bytes = BASE64
            .decode(sealed)
            .context("Failed to decode sealed credential")?;
        if bytes.len() <= NONCE_SIZE {
            return Err(anyhow!("Sealed credential is too short"));
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| anyhow!("Decryption failed (wrong key or corrupted data): {}", e))?;

        String::from_utf8(plaintext).context("Decrypted credential is not valid UTF-8")
    }
}
