// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Remote attestation client for contact discovery and key backup enclaves.
//!
//! Verifies SGX quotes against pinned enclave identities, agrees on session
//! keys bound to the attested quote and exchanges AES-GCM envelopes with the
//! enclave over a caller supplied [`client::transport::Transport`].

#![deny(missing_docs)]
#![deny(clippy::all)]

pub mod attestation;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod log;
pub mod quote;
pub mod registry;
pub mod session;

#[cfg(test)]
mod test_support;

pub use client::{AttestationClient, ClientConfig, RequestKind, SessionState};
pub use error::{Error, Result};
