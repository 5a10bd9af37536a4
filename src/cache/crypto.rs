//! Whole-payload encryption for cache entries
//!
//! AES-256-GCM with a random 96-bit nonce prepended to the ciphertext. The
//! 256-bit key is the SHA-256 digest of the configured passphrase.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::CacheError;

const NONCE_LEN: usize = 12;

/// Symmetric cipher for cache payloads
#[derive(Clone)]
pub struct CacheCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CacheCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CacheCipher(..)")
    }
}

impl CacheCipher {
    pub fn new(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Encrypt and return `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CacheError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| CacheError::Encrypt(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt `nonce || ciphertext`. `path` is only used for error context.
    pub fn decrypt(&self, path: &Path, data: &[u8]) -> Result<Vec<u8>, CacheError> {
        let decrypt_error = |reason: &str| CacheError::Decrypt {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        if data.len() < NONCE_LEN {
            return Err(decrypt_error("entry shorter than nonce"));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| decrypt_error("authentication failed (wrong key or corrupted entry)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let cipher = CacheCipher::new("passphrase");
        let sealed = cipher.encrypt(b"{\"scans\": []}").unwrap();

        assert_eq!(sealed.len(), NONCE_LEN + 13 + 16);
        assert_ne!(&sealed[NONCE_LEN..NONCE_LEN + 13], b"{\"scans\": []}");

        let opened = cipher.decrypt(Path::new("x"), &sealed).unwrap();
        assert_eq!(opened, b"{\"scans\": []}");
    }

    #[test]
    fn test_nonce_is_random() {
        let cipher = CacheCipher::new("passphrase");
        let a = cipher.encrypt(b"same").unwrap();
        let b = cipher.encrypt(b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_is_decrypt_error() {
        let sealed = CacheCipher::new("one").encrypt(b"payload").unwrap();
        let err = CacheCipher::new("two")
            .decrypt(Path::new("scan/1/scan.json"), &sealed)
            .unwrap_err();
        match err {
            CacheError::Decrypt { path, .. } => assert_eq!(path, Path::new("scan/1/scan.json")),
            other => panic!("Expected decrypt error, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_is_decrypt_error() {
        let err = CacheCipher::new("k")
            .decrypt(Path::new("x"), &[1, 2, 3])
            .unwrap_err();
        assert!(matches!(err, CacheError::Decrypt { .. }));
    }
}
