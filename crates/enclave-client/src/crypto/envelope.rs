// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! AES-256-GCM envelopes exchanged over an attested session

use crate::error::CryptoError;
use crate::session::{AttestationSession, IV_LEN};
use aes_gcm::{
    aead::{generic_array::GenericArray, AeadInPlace},
    Aes256Gcm, Key, KeyInit,
};

/// AES-GCM tag length
pub const MAC_LEN: usize = 16;

/// One encrypted request or response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// the session's request id, authenticated as associated data
    pub request_id: Vec<u8>,
    /// the nonce
    pub iv: [u8; IV_LEN],
    /// the detached authentication tag
    pub mac: [u8; MAC_LEN],
    /// the ciphertext
    pub ciphertext: Vec<u8>,
    /// transport cookies of the session
    pub cookies: Vec<String>,
}

impl EncryptedEnvelope {
    /// Assemble an envelope from untrusted parts, rejecting malformed IV or tag lengths
    pub fn from_parts(
        request_id: Vec<u8>,
        iv: &[u8],
        mac: &[u8],
        ciphertext: Vec<u8>,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            request_id,
            iv: iv.try_into().map_err(|_| CryptoError::MacInvalid)?,
            mac: mac.try_into().map_err(|_| CryptoError::MacInvalid)?,
            ciphertext,
            cookies: Vec::new(),
        })
    }
}

/// Encrypts requests with the client key and decrypts responses with the server key
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeCodec;

impl EnvelopeCodec {
    /// Encrypt `plaintext` for the enclave of `session` under a fresh IV
    pub fn encrypt(
        session: &AttestationSession,
        plaintext: &[u8],
    ) -> Result<EncryptedEnvelope, CryptoError> {
        let iv = session.next_iv()?;
        let (ciphertext, mac) = seal(
            session.keys().client(),
            &iv,
            session.request_id(),
            plaintext,
        )?;
        Ok(EncryptedEnvelope {
            request_id: session.request_id().to_vec(),
            iv,
            mac,
            ciphertext,
            cookies: session.cookies().to_vec(),
        })
    }

    /// Decrypt a response of the enclave of `session`.
    ///
    /// The session's request id is the associated data, whatever the envelope claims.
    pub fn decrypt(
        session: &AttestationSession,
        envelope: &EncryptedEnvelope,
    ) -> Result<Vec<u8>, CryptoError> {
        open(
            session.keys().server(),
            &envelope.iv,
            session.request_id(),
            &envelope.ciphertext,
            &envelope.mac,
        )
    }
}

pub(crate) fn seal(
    key: &[u8; 32],
    iv: &[u8; IV_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; MAC_LEN]), CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(iv), aad, &mut buffer)
        .map_err(|_| CryptoError::Encryption)?;
    let mut mac = [0u8; MAC_LEN];
    mac.copy_from_slice(&tag);
    Ok((buffer, mac))
}

pub(crate) fn open(
    key: &[u8; 32],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    mac: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if iv.len() != IV_LEN || mac.len() != MAC_LEN {
        return Err(CryptoError::MacInvalid);
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(iv),
            aad,
            &mut buffer,
            GenericArray::from_slice(mac),
        )
        .map_err(|_| CryptoError::MacInvalid)?;
    Ok(buffer)
}
