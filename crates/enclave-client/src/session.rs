// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! The negotiated state of one attested enclave channel

use crate::crypto::{encode_public_key, kdf::SessionKeys, EphemeralKeyPair};
use crate::error::CryptoError;
use p256::PublicKey;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// AES-GCM nonce length
pub const IV_LEN: usize = 12;

/// Lifetime limits of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// how long a session is used before re-attesting
    pub validity: Duration,
    /// how many envelopes one session may encrypt
    pub max_messages: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            validity: Duration::from_secs(10 * 60),
            max_messages: 1 << 32,
        }
    }
}

/// A live session with one enclave.
///
/// Never mutated after the handshake, apart from the atomic message and
/// in-flight counters. A superseded session is dropped, not updated.
pub struct AttestationSession {
    enclave_name: String,
    client_key_pair: EphemeralKeyPair,
    server_public_key: PublicKey,
    keys: SessionKeys,
    request_id: Vec<u8>,
    cookies: Vec<String>,
    created_at: Instant,
    policy: SessionPolicy,
    iv_prefix: [u8; 4],
    messages: AtomicU64,
    in_flight: AtomicUsize,
}

impl AttestationSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        enclave_name: String,
        client_key_pair: EphemeralKeyPair,
        server_public_key: PublicKey,
        keys: SessionKeys,
        request_id: Vec<u8>,
        cookies: Vec<String>,
        policy: SessionPolicy,
        iv_prefix: [u8; 4],
    ) -> Self {
        Self {
            enclave_name,
            client_key_pair,
            server_public_key,
            keys,
            request_id,
            cookies,
            created_at: Instant::now(),
            policy,
            iv_prefix,
            messages: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// The enclave this session is bound to
    pub fn enclave_name(&self) -> &str {
        &self.enclave_name
    }

    /// The request id issued by the enclave during the handshake
    pub fn request_id(&self) -> &[u8] {
        &self.request_id
    }

    /// Transport cookies to send with every request
    pub fn cookies(&self) -> &[String] {
        &self.cookies
    }

    /// The client ephemeral key pair of the handshake
    pub fn client_key_pair(&self) -> &EphemeralKeyPair {
        &self.client_key_pair
    }

    /// The attested server ephemeral key, SEC1 uncompressed
    pub fn server_public_key_bytes(&self) -> Vec<u8> {
        encode_public_key(&self.server_public_key)
    }

    /// When the handshake finished
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Whether the validity window has elapsed
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.policy.validity
    }

    /// Number of envelopes encrypted so far
    pub fn messages_sent(&self) -> u64 {
        self.messages.load(Ordering::Relaxed).min(self.policy.max_messages)
    }

    /// Number of requests currently using this session
    pub fn requests_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub(crate) fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Allocate the IV of the next envelope: the per-session prefix followed
    /// by the big-endian message counter.
    pub(crate) fn next_iv(&self) -> Result<[u8; IV_LEN], CryptoError> {
        let counter = self.messages.fetch_add(1, Ordering::Relaxed);
        if counter >= self.policy.max_messages {
            return Err(CryptoError::IvExhaustion(self.policy.max_messages));
        }
        let mut iv = [0u8; IV_LEN];
        iv[..4].copy_from_slice(&self.iv_prefix);
        iv[4..].copy_from_slice(&counter.to_be_bytes());
        Ok(iv)
    }

    pub(crate) fn begin_request(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlight(&self.in_flight)
    }
}

impl Debug for AttestationSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationSession")
            .field("enclave_name", &self.enclave_name)
            .field("request_id", &hex::encode(&self.request_id))
            .field("created_at", &self.created_at)
            .field("messages_sent", &self.messages_sent())
            .finish_non_exhaustive()
    }
}

/// Marks a request in progress until dropped
pub(crate) struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
