// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! The seam between the attestation client and the network

use crate::client::service::{DiscoveryFeedback, EnclaveResponse, EnclaveToken, RequestBody};
use crate::crypto::kdf::SealedBox;
use crate::error::NetworkError;
use crate::registry::ServiceKind;
use async_trait::async_trait;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::SystemTime;

/// Credentials for the remote attestation endpoints
#[derive(Clone, PartialEq, Eq, Default)]
pub struct RemoteAttestationAuth {
    /// user name
    pub username: String,
    /// password
    pub password: String,
}

impl Debug for RemoteAttestationAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteAttestationAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Ask an enclave for a quote binding a fresh server key
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    /// the enclave to attest
    pub enclave_name: String,
    /// which service front end to contact
    pub service: ServiceKind,
    /// the client ephemeral key, SEC1 uncompressed
    pub client_public_key: Vec<u8>,
    /// the credentials
    pub auth: RemoteAttestationAuth,
}

/// The handshake reply of an enclave
#[derive(Debug, Clone)]
pub struct QuoteResponse {
    /// the server ephemeral key, SEC1 uncompressed
    pub server_ephemeral_public: Vec<u8>,
    /// the raw quote
    pub quote: Vec<u8>,
    /// PEM certificate chain of the attestation signer, leaf first
    pub certificates: String,
    /// detached signature over the quote header
    pub signature: Vec<u8>,
    /// when the attestation service vouched for the quote
    pub attested_at: Option<SystemTime>,
    /// the request id, sealed with the server direction key
    pub sealed_request_id: SealedBox,
    /// cookies to echo on every request of the session
    pub cookies: Vec<String>,
}

/// One encrypted request to an enclave
#[derive(Debug, Clone)]
pub struct EnclaveRequest {
    /// the enclave the request is routed to
    pub enclave_name: String,
    /// the credentials
    pub auth: RemoteAttestationAuth,
    /// cookies of the session
    pub cookies: Vec<String>,
    /// the encrypted body
    pub body: RequestBody,
}

/// Fetch the key backup token of an attested session
#[derive(Debug, Clone)]
pub struct TokenRequest {
    /// the key backup enclave
    pub enclave_name: String,
    /// the credentials
    pub auth: RemoteAttestationAuth,
    /// cookies of the session
    pub cookies: Vec<String>,
}

/// Report how a discovery went
#[derive(Debug, Clone)]
pub struct FeedbackRequest {
    /// the credentials
    pub auth: RemoteAttestationAuth,
    /// the report
    pub feedback: DiscoveryFeedback,
}

/// Delivers handshakes and requests to the enclave front ends.
///
/// Implementations own retries of transient network failures; whatever
/// they return is final for the client.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Run the remote attestation handshake
    async fn fetch_quote(&self, request: QuoteRequest) -> Result<QuoteResponse, NetworkError>;

    /// Send an encrypted request
    async fn send_request(&self, request: EnclaveRequest)
        -> Result<EnclaveResponse, NetworkError>;

    /// Fetch the token of a key backup session
    async fn fetch_token(&self, request: TokenRequest) -> Result<EnclaveToken, NetworkError>;

    /// Deliver discovery feedback
    async fn send_feedback(&self, request: FeedbackRequest) -> Result<(), NetworkError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch_quote(&self, request: QuoteRequest) -> Result<QuoteResponse, NetworkError> {
        (**self).fetch_quote(request).await
    }

    async fn send_request(
        &self,
        request: EnclaveRequest,
    ) -> Result<EnclaveResponse, NetworkError> {
        (**self).send_request(request).await
    }

    async fn fetch_token(&self, request: TokenRequest) -> Result<EnclaveToken, NetworkError> {
        (**self).fetch_token(request).await
    }

    async fn send_feedback(&self, request: FeedbackRequest) -> Result<(), NetworkError> {
        (**self).send_feedback(request).await
    }
}
