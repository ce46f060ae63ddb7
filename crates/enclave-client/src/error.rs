// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Error types of the attestation client

pub use crate::quote::error::ParseError;
use thiserror::Error;

/// A quote failed to prove the enclave identity or the session binding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum AttestationError {
    #[error("{field} mismatch: got {got}, expected {expected}")]
    MrenclaveMismatch {
        field: &'static str,
        got: String,
        expected: String,
    },
    #[error("debug quote rejected for enclave `{0}`")]
    DebugQuoteRejected(String),
    #[error("signature invalid: {0}")]
    SignatureInvalid(String),
    #[error("report data does not bind the server ephemeral key")]
    ReportDataMismatch,
    #[error("attestation is stale: {0}")]
    StaleAttestation(String),
}

/// Failures of the symmetric channel or key material
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CryptoError {
    #[error("message authentication failed")]
    MacInvalid,
    #[error("session exhausted its {0} message budget")]
    IvExhaustion(u64),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("key derivation failed")]
    KeyDerivation,
    #[error("encryption failed")]
    Encryption,
    #[error("random source failed: {0}")]
    RandomSource(String),
}

/// Final failures reported by the transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum NetworkError {
    #[error("transport timed out")]
    Timeout,
    #[error("service unreachable: {0}")]
    Unreachable(String),
    #[error("server error {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("server rejected the session")]
    Unauthorized,
}

/// Enclave registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum RegistryError {
    #[error("enclave `{0}` not found")]
    NotFound(String),
    #[error("enclave `{0}` configured twice")]
    Duplicate(String),
    #[error("enclave `{name}`: invalid {field}")]
    InvalidValue { name: String, field: &'static str },
}

/// Everything the attestation client can fail with
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Attestation(#[from] AttestationError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("enclave `{enclave}` does not serve {requested} requests")]
    ServiceMismatch {
        enclave: String,
        requested: &'static str,
    },
    #[error("request cancelled")]
    Cancelled,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

/// A shorthand for results of this crate
pub type Result<T> = std::result::Result<T, Error>;

/// What a consuming feature should show for an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// the service cannot be trusted or reached right now
    Unavailable,
    /// a later attempt may succeed
    RetryLater,
    /// the caller gave up
    Cancelled,
}

impl Error {
    /// Errors after which the cached session must not be used again
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            Error::Crypto(CryptoError::MacInvalid | CryptoError::IvExhaustion(_))
                | Error::Network(NetworkError::Unauthorized)
        )
    }

    /// Collapse the error kind into the generic state a user gets to see
    pub fn availability(&self) -> Availability {
        match self {
            Error::Network(_) => Availability::RetryLater,
            Error::Cancelled => Availability::Cancelled,
            _ => Availability::Unavailable,
        }
    }

    pub(crate) fn config(e: impl ToString) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::config(e)
    }
}
