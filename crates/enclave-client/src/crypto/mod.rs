// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Key material, key agreement and the encrypted envelope

pub mod envelope;
pub mod kdf;

use crate::error::CryptoError;
use p256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey, SecretKey};
use std::fmt::{Debug, Formatter};
use zeroize::Zeroizing;

/// Retries for a scalar outside the curve order, which valid random input
/// essentially never produces
const KEY_GENERATION_ATTEMPTS: usize = 8;

/// A P-256 key pair used for exactly one handshake
pub struct EphemeralKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Wrap an existing secret key
    pub fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// The public half
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The public half, SEC1 uncompressed
    pub fn public_key_bytes(&self) -> Vec<u8> {
        encode_public_key(&self.public)
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// SEC1 uncompressed encoding of `key`
pub fn encode_public_key(key: &PublicKey) -> Vec<u8> {
    key.to_encoded_point(false).as_bytes().to_vec()
}

/// Source of randomness and ephemeral keys
pub trait CryptoProvider: Send + Sync + 'static {
    /// Fill `dest` with cryptographically secure random bytes
    fn fill_random(&self, dest: &mut [u8]) -> Result<(), CryptoError>;

    /// Generate a fresh ephemeral key pair
    fn generate_key_pair(&self) -> Result<EphemeralKeyPair, CryptoError> {
        for _ in 0..KEY_GENERATION_ATTEMPTS {
            let mut bytes = Zeroizing::new([0u8; 32]);
            self.fill_random(&mut bytes[..])?;
            if let Ok(secret) = SecretKey::from_slice(&bytes[..]) {
                return Ok(EphemeralKeyPair::from_secret(secret));
            }
        }
        Err(CryptoError::InvalidKey(
            "random source produced no valid scalar".into(),
        ))
    }
}

/// [`CryptoProvider`] backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct OsCryptoProvider;

impl CryptoProvider for OsCryptoProvider {
    fn fill_random(&self, dest: &mut [u8]) -> Result<(), CryptoError> {
        getrandom::fill(dest).map_err(|e| CryptoError::RandomSource(e.to_string()))
    }
}
