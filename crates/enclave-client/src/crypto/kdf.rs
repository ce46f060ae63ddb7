// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Ephemeral ECDH and derivation of the per-direction session keys

use crate::attestation::AttestationProof;
use crate::crypto::{envelope, CryptoProvider, EphemeralKeyPair};
use crate::error::CryptoError;
use crate::session::{AttestationSession, SessionPolicy};
use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

const SESSION_INFO_LABEL: &[u8] = b"enclave-client session v1";

const KEY_LEN: usize = 32;

/// The client to server and server to client AES-256 keys
pub struct SessionKeys {
    client: Zeroizing<[u8; KEY_LEN]>,
    server: Zeroizing<[u8; KEY_LEN]>,
}

impl SessionKeys {
    pub(crate) fn new(client: [u8; KEY_LEN], server: [u8; KEY_LEN]) -> Self {
        Self {
            client: Zeroizing::new(client),
            server: Zeroizing::new(server),
        }
    }

    /// key of the client to server direction
    pub(crate) fn client(&self) -> &[u8; KEY_LEN] {
        &self.client
    }

    /// key of the server to client direction
    pub(crate) fn server(&self) -> &[u8; KEY_LEN] {
        &self.server
    }
}

/// A value the server encrypted under its direction key during the handshake
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SealedBox {
    /// the nonce
    pub iv: Vec<u8>,
    /// the ciphertext
    pub ciphertext: Vec<u8>,
    /// the detached tag
    pub mac: Vec<u8>,
}

fn length_prefix(len: usize) -> Result<[u8; 4], CryptoError> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| CryptoError::KeyDerivation)
}

/// HKDF-SHA256 over the ECDH secret.
///
/// The salt binds both public keys, the info binds the enclave name and the
/// attested quote, so keys never repeat across handshakes.
pub(crate) fn derive_keys(
    shared_secret: &[u8],
    client_public_key: &[u8],
    server_public_key: &[u8],
    enclave_name: &str,
    quote_digest: &[u8; 32],
) -> Result<SessionKeys, CryptoError> {
    let mut salt = Vec::with_capacity(client_public_key.len() + server_public_key.len());
    salt.extend_from_slice(client_public_key);
    salt.extend_from_slice(server_public_key);

    let mut info = SESSION_INFO_LABEL.to_vec();
    info.extend_from_slice(&length_prefix(enclave_name.len())?);
    info.extend_from_slice(enclave_name.as_bytes());
    info.extend_from_slice(quote_digest);

    let mut okm = Zeroizing::new([0u8; 2 * KEY_LEN]);
    Hkdf::<Sha256>::new(Some(&salt), shared_secret)
        .expand(&info, &mut okm[..])
        .map_err(|_| CryptoError::KeyDerivation)?;

    let mut client = [0u8; KEY_LEN];
    let mut server = [0u8; KEY_LEN];
    client.copy_from_slice(&okm[..KEY_LEN]);
    server.copy_from_slice(&okm[KEY_LEN..]);
    Ok(SessionKeys::new(client, server))
}

/// Finish the handshake with an attested enclave: agree on keys, confirm
/// them by opening the server's sealed request id and build the session.
pub fn derive_session(
    client_key_pair: EphemeralKeyPair,
    proof: AttestationProof,
    sealed_request_id: &SealedBox,
    cookies: Vec<String>,
    policy: SessionPolicy,
    crypto: &impl CryptoProvider,
) -> Result<AttestationSession, CryptoError> {
    let shared = p256::ecdh::diffie_hellman(
        client_key_pair.secret().to_nonzero_scalar(),
        proof.server_public_key().as_affine(),
    );
    let keys = derive_keys(
        shared.raw_secret_bytes().as_slice(),
        &client_key_pair.public_key_bytes(),
        proof.server_public_key_bytes(),
        proof.enclave_name(),
        proof.quote_digest(),
    )?;

    let request_id = envelope::open(
        keys.server(),
        &sealed_request_id.iv,
        &[],
        &sealed_request_id.ciphertext,
        &sealed_request_id.mac,
    )?;

    let mut iv_prefix = [0u8; 4];
    crypto.fill_random(&mut iv_prefix)?;

    debug!(enclave = proof.enclave_name(), "session keys confirmed");
    Ok(AttestationSession::new(
        proof.enclave_name().to_string(),
        client_key_pair,
        *proof.server_public_key(),
        keys,
        request_id,
        cookies,
        policy,
        iv_prefix,
    ))
}
