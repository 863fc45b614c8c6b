use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;

use crate::engine::errors::SerdeError;

pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 over page payloads. Each frame is `nonce | ciphertext`
/// with a fresh random nonce.
#[derive(Clone)]
pub struct PageCipher {
    key: Key,
}

impl PageCipher {
    pub fn new(key: Key) -> Self {
        Self { key }
    }

    /// Fresh random key, used for one spill file and never persisted.
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self::new(Key::from_slice(&bytes).to_owned())
    }

    pub fn from_hex(raw: &str) -> Result<Self, SerdeError> {
        let bytes = hex::decode(raw.trim())
            .map_err(|e| SerdeError::Encryption(format!("invalid hex key: {e}")))?;
        if bytes.len() != KEY_LEN {
            return Err(SerdeError::Encryption(format!(
                "key must be {} bytes, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }
        Ok(Self::new(Key::from_slice(&bytes).to_owned()))
    }

    pub fn encrypt(&self, payload: &[u8]) -> Result<Vec<u8>, SerdeError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = ChaCha20Poly1305::new(&self.key);
        let ciphertext = cipher
            .encrypt(nonce, payload)
            .map_err(|e| SerdeError::Encryption(format!("encrypt page failed: {e}")))?;

        let mut frame = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        frame.extend_from_slice(&nonce_bytes);
        frame.extend_from_slice(&ciphertext);
        Ok(frame)
    }

    pub fn decrypt(&self, frame: &[u8]) -> Result<Vec<u8>, SerdeError> {
        if frame.len() < NONCE_LEN {
            return Err(SerdeError::Encryption(
                "encrypted page too small for nonce".into(),
            ));
        }
        let (nonce_bytes, ciphertext) = frame.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(&self.key);
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| SerdeError::Encryption(format!("decrypt page failed: {e}")))
    }
}

impl std::fmt::Debug for PageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PageCipher(..)")
    }
}
