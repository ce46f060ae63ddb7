// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! The attestation client: session cache, handshakes and encrypted requests

pub mod service;
pub mod transport;

use self::{
    service::{DiscoveryFeedback, EnclaveToken, RequestBody},
    transport::{
        EnclaveRequest, FeedbackRequest, QuoteRequest, RemoteAttestationAuth, TokenRequest,
        Transport,
    },
};
use crate::attestation::{chain::parse_chain_pem, AttestationValidator, Evidence};
use crate::crypto::{
    envelope::{EncryptedEnvelope, EnvelopeCodec},
    kdf::derive_session,
    CryptoProvider, OsCryptoProvider,
};
use crate::error::{Error, NetworkError, Result};
use crate::quote::Quote;
use crate::registry::{EnclaveDescriptor, EnclaveRegistry, ServiceKind};
use crate::session::{AttestationSession, SessionPolicy};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

/// Tunables of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// lifetime limits of every established session
    pub session: SessionPolicy,
    /// upper bound of a single transport call
    pub transport_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            session: SessionPolicy::default(),
            transport_timeout: Duration::from_secs(30),
        }
    }
}

/// Observable state of the session with one enclave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// no session and no handshake
    Unattested,
    /// a handshake is running
    Handshaking,
    /// a session is cached and idle
    Established,
    /// a cached session has requests in flight
    Requesting,
    /// the cached session outlived its validity
    Expired,
}

/// What a request is for, selecting the body shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// a contact discovery query over `address_count` addresses
    ContactDiscovery {
        /// number of addresses in the plaintext
        address_count: u32,
    },
    /// a key backup request
    KeyBackup,
}

impl RequestKind {
    /// The service this kind of request is served by
    pub fn service(&self) -> ServiceKind {
        match self {
            RequestKind::ContactDiscovery { .. } => ServiceKind::ContactDiscovery,
            RequestKind::KeyBackup => ServiceKind::KeyBackup,
        }
    }
}

type Handshake = Shared<BoxFuture<'static, Result<Arc<AttestationSession>>>>;

enum Slot {
    Established(Arc<AttestationSession>),
    Handshaking { id: u64, handshake: Handshake },
}

struct Inner<T, C> {
    registry: EnclaveRegistry,
    validator: AttestationValidator,
    transport: T,
    crypto: C,
    config: ClientConfig,
    slots: Mutex<HashMap<String, Slot>>,
    next_handshake: AtomicU64,
}

/// Establishes attested sessions with enclaves and sends encrypted requests.
///
/// At most one session per enclave is cached. Concurrent callers share a
/// single handshake, which runs in its own task and is cached when it
/// finishes even if every caller stopped waiting.
pub struct AttestationClient<T, C = OsCryptoProvider> {
    inner: Arc<Inner<T, C>>,
}

impl<T, C> Clone for AttestationClient<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Transport, C: CryptoProvider> AttestationClient<T, C> {
    /// Create a client with an empty session cache
    pub fn new(
        registry: EnclaveRegistry,
        validator: AttestationValidator,
        transport: T,
        crypto: C,
        config: ClientConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                validator,
                transport,
                crypto,
                config,
                slots: Mutex::new(HashMap::new()),
                next_handshake: AtomicU64::new(0),
            }),
        }
    }

    /// The registry the client resolves enclave names with
    pub fn registry(&self) -> &EnclaveRegistry {
        &self.inner.registry
    }

    /// The cached session with `enclave_name`, attesting the enclave first if needed
    pub async fn session(
        &self,
        enclave_name: &str,
        auth: &RemoteAttestationAuth,
    ) -> Result<Arc<AttestationSession>> {
        self.inner.registry.lookup(enclave_name)?;
        let handshake = {
            let mut slots = self.inner.lock_slots();
            match slots.get(enclave_name) {
                Some(Slot::Established(session)) if !session.is_expired() => {
                    return Ok(session.clone())
                }
                Some(Slot::Handshaking { handshake, .. }) => handshake.clone(),
                _ => {
                    let id = self.inner.next_handshake.fetch_add(1, Ordering::Relaxed);
                    let handshake = self.start_handshake(enclave_name, auth, id);
                    slots.insert(
                        enclave_name.to_string(),
                        Slot::Handshaking {
                            id,
                            handshake: handshake.clone(),
                        },
                    );
                    handshake
                }
            }
        };
        handshake.await
    }

    fn start_handshake(
        &self,
        enclave_name: &str,
        auth: &RemoteAttestationAuth,
        id: u64,
    ) -> Handshake {
        let inner = self.inner.clone();
        let name = enclave_name.to_string();
        let auth = auth.clone();
        let span = info_span!("handshake", enclave = %name, id);
        let task = tokio::spawn(
            async move {
                let result = AssertUnwindSafe(inner.handshake(&name, auth))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(Error::Internal("handshake panicked".into())))
                    .map(Arc::new);
                inner.finish_handshake(&name, id, &result);
                result
            }
            .instrument(span),
        );

        let inner = self.inner.clone();
        let name = enclave_name.to_string();
        async move {
            task.await.unwrap_or_else(|e| {
                let result = Err(Error::Internal(format!("handshake task failed: {e}")));
                inner.finish_handshake(&name, id, &result);
                result
            })
        }
        .boxed()
        .shared()
    }

    /// Encrypt `plaintext`, send it to `enclave_name` and decrypt the reply.
    ///
    /// A reply that fails authentication, an exhausted IV budget or a
    /// rejected session drop the session, and the request is retried once
    /// on a freshly attested one.
    pub async fn request(
        &self,
        enclave_name: &str,
        auth: &RemoteAttestationAuth,
        kind: RequestKind,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        self.serving(enclave_name, kind.service())?;

        let span = info_span!("request", enclave = enclave_name, service = %kind.service());
        async {
            let session = self.session(enclave_name, auth).await?;
            match self
                .inner
                .exchange(enclave_name, &session, auth, kind, plaintext)
                .await
            {
                Err(e) if e.invalidates_session() => {
                    warn!("session unusable, re-attesting once: {e}");
                    self.inner.invalidate(enclave_name, &session);
                    let session = self.session(enclave_name, auth).await?;
                    self.inner
                        .exchange(enclave_name, &session, auth, kind, plaintext)
                        .await
                        .inspect_err(|e| {
                            if e.invalidates_session() {
                                self.inner.invalidate(enclave_name, &session);
                            }
                        })
                }
                result => result,
            }
        }
        .instrument(span)
        .await
    }

    fn serving(&self, enclave_name: &str, service: ServiceKind) -> Result<&EnclaveDescriptor> {
        let descriptor = self.inner.registry.lookup(enclave_name)?;
        if descriptor.service != service {
            return Err(Error::ServiceMismatch {
                enclave: enclave_name.to_string(),
                requested: service.as_str(),
            });
        }
        Ok(descriptor)
    }

    /// [`Self::request`] that gives up with [`Error::Cancelled`] once `token` fires.
    ///
    /// A handshake the request started keeps running and is cached.
    pub async fn request_with_cancellation(
        &self,
        token: &CancellationToken,
        enclave_name: &str,
        auth: &RemoteAttestationAuth,
        kind: RequestKind,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(enclave = enclave_name, "request cancelled");
                Err(Error::Cancelled)
            }
            result = self.request(enclave_name, auth, kind, plaintext) => result,
        }
    }

    /// Run an encrypted contact discovery query
    pub async fn discover_contacts(
        &self,
        enclave_name: &str,
        auth: &RemoteAttestationAuth,
        address_count: u32,
        encrypted_addresses: &[u8],
    ) -> Result<Vec<u8>> {
        self.request(
            enclave_name,
            auth,
            RequestKind::ContactDiscovery { address_count },
            encrypted_addresses,
        )
        .await
    }

    /// Send an opaque key backup request
    pub async fn key_backup_request(
        &self,
        enclave_name: &str,
        auth: &RemoteAttestationAuth,
        request: &[u8],
    ) -> Result<Vec<u8>> {
        self.request(enclave_name, auth, RequestKind::KeyBackup, request)
            .await
    }

    /// Fetch the token of the key backup session with `enclave_name`.
    ///
    /// The token call carries the cookies of the attested session, which is
    /// established first if needed and re-attested once if it was rejected.
    pub async fn key_backup_token(
        &self,
        enclave_name: &str,
        auth: &RemoteAttestationAuth,
    ) -> Result<EnclaveToken> {
        self.serving(enclave_name, ServiceKind::KeyBackup)?;

        let span = info_span!("token", enclave = enclave_name);
        async {
            let session = self.session(enclave_name, auth).await?;
            match self.inner.fetch_token(&session, auth).await {
                Err(e) if e.invalidates_session() => {
                    warn!("token request rejected, re-attesting once: {e}");
                    self.inner.invalidate(enclave_name, &session);
                    let session = self.session(enclave_name, auth).await?;
                    self.inner.fetch_token(&session, auth).await
                }
                result => result,
            }
        }
        .instrument(span)
        .await
    }

    /// Report the outcome of a contact discovery to the service
    pub async fn send_discovery_feedback(
        &self,
        auth: &RemoteAttestationAuth,
        feedback: DiscoveryFeedback,
    ) -> Result<()> {
        debug!(status = ?feedback.status, "sending discovery feedback");
        self.inner
            .with_timeout(self.inner.transport.send_feedback(FeedbackRequest {
                auth: auth.clone(),
                feedback,
            }))
            .await?;
        Ok(())
    }

    /// The state of the session with `enclave_name`
    pub fn session_state(&self, enclave_name: &str) -> SessionState {
        match self.inner.lock_slots().get(enclave_name) {
            None => SessionState::Unattested,
            Some(Slot::Handshaking { .. }) => SessionState::Handshaking,
            Some(Slot::Established(session)) if session.is_expired() => SessionState::Expired,
            Some(Slot::Established(session)) if session.requests_in_flight() > 0 => {
                SessionState::Requesting
            }
            Some(Slot::Established(_)) => SessionState::Established,
        }
    }

    /// Drop the cached session with `enclave_name`, returning whether there was one.
    ///
    /// A running handshake is not affected.
    pub fn invalidate_session(&self, enclave_name: &str) -> bool {
        let mut slots = self.inner.lock_slots();
        if matches!(slots.get(enclave_name), Some(Slot::Established(_))) {
            slots.remove(enclave_name);
            info!(enclave = enclave_name, "session invalidated");
            true
        } else {
            false
        }
    }
}

impl<T: Transport, C: CryptoProvider> Inner<T, C> {
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn with_timeout<R>(
        &self,
        call: impl Future<Output = std::result::Result<R, NetworkError>>,
    ) -> std::result::Result<R, NetworkError> {
        tokio::time::timeout(self.config.transport_timeout, call)
            .await
            .map_err(|_| NetworkError::Timeout)?
    }

    async fn handshake(
        &self,
        enclave_name: &str,
        auth: RemoteAttestationAuth,
    ) -> Result<AttestationSession> {
        let descriptor = self.registry.lookup(enclave_name)?;
        let key_pair = self.crypto.generate_key_pair()?;
        debug!("requesting quote");
        let response = self
            .with_timeout(self.transport.fetch_quote(QuoteRequest {
                enclave_name: enclave_name.to_string(),
                service: descriptor.service,
                client_public_key: key_pair.public_key_bytes(),
                auth,
            }))
            .await?;

        let quote = Quote::parse(&response.quote)?;
        let cert_chain = parse_chain_pem(&response.certificates)?;
        let evidence = Evidence {
            cert_chain: &cert_chain,
            signature: &response.signature,
            attested_at: response.attested_at,
        };
        let proof = self.validator.validate(
            &quote,
            descriptor,
            &response.server_ephemeral_public,
            &evidence,
            SystemTime::now(),
        )?;

        let session = derive_session(
            key_pair,
            proof,
            &response.sealed_request_id,
            response.cookies,
            self.config.session,
            &self.crypto,
        )?;
        info!("session established");
        Ok(session)
    }

    fn finish_handshake(
        &self,
        enclave_name: &str,
        id: u64,
        result: &Result<Arc<AttestationSession>>,
    ) {
        let mut slots = self.lock_slots();
        let current = matches!(
            slots.get(enclave_name),
            Some(Slot::Handshaking { id: running, .. }) if *running == id
        );
        if !current {
            return;
        }
        match result {
            Ok(session) => {
                slots.insert(
                    enclave_name.to_string(),
                    Slot::Established(session.clone()),
                );
            }
            Err(e) => {
                slots.remove(enclave_name);
                warn!("handshake failed: {e}");
            }
        }
    }

    fn invalidate(&self, enclave_name: &str, session: &Arc<AttestationSession>) {
        let mut slots = self.lock_slots();
        let cached = matches!(
            slots.get(enclave_name),
            Some(Slot::Established(cached)) if Arc::ptr_eq(cached, session)
        );
        if cached {
            slots.remove(enclave_name);
        }
    }

    async fn fetch_token(
        &self,
        session: &AttestationSession,
        auth: &RemoteAttestationAuth,
    ) -> Result<EnclaveToken> {
        let token = self
            .with_timeout(self.transport.fetch_token(TokenRequest {
                enclave_name: session.enclave_name().to_string(),
                auth: auth.clone(),
                cookies: session.cookies().to_vec(),
            }))
            .await?;
        debug!(tries = token.tries, "key backup token received");
        Ok(token)
    }

    async fn exchange(
        &self,
        enclave_name: &str,
        session: &AttestationSession,
        auth: &RemoteAttestationAuth,
        kind: RequestKind,
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        debug_assert_eq!(session.enclave_name(), enclave_name);
        let _in_flight = session.begin_request();
        let mut envelope = EnvelopeCodec::encrypt(session, plaintext)?;
        let cookies = std::mem::take(&mut envelope.cookies);
        let body = match kind {
            RequestKind::ContactDiscovery { address_count } => {
                RequestBody::contact_discovery(envelope, address_count)
            }
            RequestKind::KeyBackup => RequestBody::key_backup(envelope),
        };

        let response = self
            .with_timeout(self.transport.send_request(EnclaveRequest {
                enclave_name: enclave_name.to_string(),
                auth: auth.clone(),
                cookies,
                body,
            }))
            .await?;

        let reply = EncryptedEnvelope::from_parts(
            session.request_id().to_vec(),
            &response.iv,
            &response.mac,
            response.ciphertext,
        )?;
        Ok(EnvelopeCodec::decrypt(session, &reply)?)
    }
}
