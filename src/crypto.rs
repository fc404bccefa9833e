// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Symmetric encryption of OAuth tokens at rest.
//!
//! Tokens are sealed with AES-256-GCM under a server secret. The output layout
//! is `base64(nonce || ciphertext || tag)` so a single string column holds
//! everything needed to open it again.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// Size of the encryption key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Encrypts and decrypts token strings with a caller-supplied key.
pub trait Encryptor: Send + Sync {
    fn encrypt(&self, plaintext: &str, key: &[u8]) -> Result<String, AppError>;
    fn decrypt(&self, ciphertext: &str, key: &[u8]) -> Result<String, AppError>;
}

/// Available encryptor implementations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EncryptorKind {
    #[default]
    AesGcm,
}

impl EncryptorKind {
    pub fn build(self) -> Arc<dyn Encryptor> {
        match self {
            EncryptorKind::AesGcm => Arc::new(AesGcmEncryptor::new()),
        }
    }
}

impl std::str::FromStr for EncryptorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "aes" | "aes-gcm" => Ok(EncryptorKind::AesGcm),
            other => Err(format!("unknown encryptor type '{}'", other)),
        }
    }
}

/// AES-256-GCM with a random nonce per call.
#[derive(Clone)]
pub struct AesGcmEncryptor {
    rng: SystemRandom,
}

impl AesGcmEncryptor {
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
        }
    }

    /// Zero-pad or truncate `key` to exactly 256 bits.
    fn sealing_key(key: &[u8]) -> Result<LessSafeKey, AppError> {
        let mut material = [0u8; KEY_SIZE];
        let len = key.len().min(KEY_SIZE);
        material[..len].copy_from_slice(&key[..len]);

        let unbound = UnboundKey::new(&AES_256_GCM, &material)
            .map_err(|_| AppError::Encryption("Failed to create cipher".to_string()))?;
        Ok(LessSafeKey::new(unbound))
    }
}

impl Default for AesGcmEncryptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Encryptor for AesGcmEncryptor {
    fn encrypt(&self, plaintext: &str, key: &[u8]) -> Result<String, AppError> {
        let key = Self::sealing_key(key)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| AppError::Encryption("Failed to generate nonce".to_string()))?;

        let mut in_out = plaintext.as_bytes().to_vec();
        key.seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| AppError::Encryption("Encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);

        Ok(BASE64.encode(sealed))
    }

    fn decrypt(&self, ciphertext: &str, key: &[u8]) -> Result<String, AppError> {
        let key = Self::sealing_key(key)?;

        let buf = BASE64
            .decode(ciphertext)
            .map_err(|e| AppError::Encryption(format!("Base64 decode failed: {}", e)))?;

        if buf.len() < NONCE_LEN {
            return Err(AppError::InvalidNonceSize);
        }

        let (nonce_bytes, sealed) = buf.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce_bytes)
            .map_err(|_| AppError::InvalidNonceSize)?;

        let mut in_out = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| {
                AppError::Encryption("Decryption failed (wrong key or corrupted data)".to_string())
            })?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| AppError::Encryption("Decrypted data is not valid UTF-8".to_string()))
    }
}
