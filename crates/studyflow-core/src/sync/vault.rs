//! Credential encryption.
//!
//! OAuth tokens are stored encrypted with ChaCha20-Poly1305 under the
//! key from application config. Ciphertext format is
//! `base64(nonce || ciphertext)` with a fresh random nonce per call.
//! Decryption failures surface as credential failures so callers send
//! the user back through OAuth instead of retrying.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};

use crate::error::{AuthorizationError, Result};
use crate::sync::types::OAuthTokens;

const NONCE_LEN: usize = 12;

/// Encrypts and decrypts stored OAuth credentials.
pub struct TokenVault {
    cipher: ChaCha20Poly1305,
}

impl TokenVault {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(&key.into()),
        }
    }

    /// Encrypt arbitrary plaintext to `base64(nonce || ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AuthorizationError::CredentialFailure(format!("encrypt: {e}")))?;
        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypt `base64(nonce || ciphertext)` back to plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = BASE64
            .decode(encoded.trim())
            .map_err(|e| AuthorizationError::CredentialFailure(format!("bad encoding: {e}")))?;
        if combined.len() <= NONCE_LEN {
            return Err(
                AuthorizationError::CredentialFailure("ciphertext too short".to_string()).into(),
            );
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                AuthorizationError::CredentialFailure(
                    "decryption failed; re-authorization required".to_string(),
                )
            })?;
        String::from_utf8(plaintext)
            .map_err(|e| AuthorizationError::CredentialFailure(format!("bad utf8: {e}")).into())
    }

    /// Serialize and encrypt a token set.
    pub fn encrypt_tokens(&self, tokens: &OAuthTokens) -> Result<String> {
        let json = serde_json::to_string(tokens)?;
        self.encrypt(&json)
    }

    /// Decrypt and deserialize a token set.
    pub fn decrypt_tokens(&self, encoded: &str) -> Result<OAuthTokens> {
        let json = self.decrypt(encoded)?;
        serde_json::from_str(&json).map_err(|e| {
            AuthorizationError::CredentialFailure(format!("bad token payload: {e}")).into()
        })
    }
}
