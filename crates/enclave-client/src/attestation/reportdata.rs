// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Binding of a server ephemeral key into the quote's report data.
//!
//! +--------------------------------------------+----------------------+
//! | SHA-256 of the SEC1 public key (32 bytes)  | zeros (32 bytes)     |
//! +--------------------------------------------+----------------------+

use sha2::{Digest, Sha256};

/// Report data length of an SGX quote
pub const REPORT_DATA_LENGTH: usize = 64;

const HASH_LENGTH: usize = 32;

/// The hash of the key that a quote binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    hash: [u8; HASH_LENGTH],
}

impl KeyBinding {
    /// The binding of an encoded public key
    pub fn for_key(public_key: &[u8]) -> Self {
        Self {
            hash: Sha256::digest(public_key).into(),
        }
    }

    /// Whether `report_data` carries exactly this binding
    pub fn matches(&self, report_data: &[u8; REPORT_DATA_LENGTH]) -> bool {
        let (hash, rest) = report_data.split_at(HASH_LENGTH);
        hash == self.hash && rest.iter().all(|b| *b == 0)
    }
}

impl From<KeyBinding> for [u8; REPORT_DATA_LENGTH] {
    fn from(binding: KeyBinding) -> Self {
        let mut bytes = [0u8; REPORT_DATA_LENGTH];
        bytes[..HASH_LENGTH].copy_from_slice(&binding.hash);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_only_one_key() {
        let binding = KeyBinding::for_key(b"server key");
        let report_data: [u8; REPORT_DATA_LENGTH] = binding.into();
        assert!(binding.matches(&report_data));
        assert!(!KeyBinding::for_key(b"other key").matches(&report_data));
    }

    #[test]
    fn trailing_bytes_must_be_zero() {
        let binding = KeyBinding::for_key(b"server key");
        let mut report_data: [u8; REPORT_DATA_LENGTH] = binding.into();
        report_data[63] = 1;
        assert!(!binding.matches(&report_data));
    }
}
