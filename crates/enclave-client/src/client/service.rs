// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! JSON bodies of the contact discovery and key backup enclave requests
//! and of the plain service calls around them

use crate::crypto::envelope::EncryptedEnvelope;
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

/// Encrypted contact discovery query
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDiscoveryRequest {
    /// the session request id
    #[serde_as(as = "Base64")]
    pub request_id: Vec<u8>,
    /// number of addresses in the encrypted data
    pub address_count: u32,
    /// the encrypted address data
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
    /// the nonce
    #[serde_as(as = "Base64")]
    pub iv: Vec<u8>,
    /// the authentication tag
    #[serde_as(as = "Base64")]
    pub mac: Vec<u8>,
}

/// Encrypted key backup request
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyBackupRequest {
    /// the session request id
    #[serde_as(as = "Base64")]
    pub request_id: Vec<u8>,
    /// the encrypted opaque request
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
    /// the nonce
    #[serde_as(as = "Base64")]
    pub iv: Vec<u8>,
    /// the authentication tag
    #[serde_as(as = "Base64")]
    pub mac: Vec<u8>,
}

/// Encrypted reply of an enclave
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclaveResponse {
    /// the nonce
    #[serde_as(as = "Base64")]
    pub iv: Vec<u8>,
    /// the ciphertext
    #[serde(rename = "data")]
    #[serde_as(as = "Base64")]
    pub ciphertext: Vec<u8>,
    /// the authentication tag
    #[serde_as(as = "Base64")]
    pub mac: Vec<u8>,
}

/// Key backup token of an attested session
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnclaveToken {
    /// identifies the backup inside the enclave
    #[serde_as(as = "Base64")]
    pub backup_id: Vec<u8>,
    /// token the next backup request has to present
    #[serde_as(as = "Base64")]
    pub token: Vec<u8>,
    /// remaining PIN attempts
    pub tries: u32,
}

/// Outcome of a discovery, reported back to the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedbackStatus {
    /// the discovery succeeded
    Ok,
    /// the enclave answered differently than the legacy lookup
    Mismatch,
    /// the enclave could not be attested
    AttestationError,
    /// anything else went wrong
    UnexpectedError,
}

impl FeedbackStatus {
    /// The status describing the outcome of a discovery
    pub fn for_result<T>(result: &crate::error::Result<T>) -> Self {
        use crate::error::Error;
        match result {
            Ok(_) => FeedbackStatus::Ok,
            Err(Error::Attestation(_) | Error::Parse(_)) => FeedbackStatus::AttestationError,
            Err(_) => FeedbackStatus::UnexpectedError,
        }
    }
}

/// Discovery feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryFeedback {
    /// the outcome
    pub status: FeedbackStatus,
    /// free form details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The body of one enclave request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// contact discovery
    ContactDiscovery(ContactDiscoveryRequest),
    /// key backup
    KeyBackup(KeyBackupRequest),
}

impl RequestBody {
    /// JSON encoding for the transport
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            RequestBody::ContactDiscovery(r) => serde_json::to_vec(r),
            RequestBody::KeyBackup(r) => serde_json::to_vec(r),
        }
    }

    pub(crate) fn contact_discovery(envelope: EncryptedEnvelope, address_count: u32) -> Self {
        RequestBody::ContactDiscovery(ContactDiscoveryRequest {
            request_id: envelope.request_id,
            address_count,
            data: envelope.ciphertext,
            iv: envelope.iv.to_vec(),
            mac: envelope.mac.to_vec(),
        })
    }

    pub(crate) fn key_backup(envelope: EncryptedEnvelope) -> Self {
        RequestBody::KeyBackup(KeyBackupRequest {
            request_id: envelope.request_id,
            data: envelope.ciphertext,
            iv: envelope.iv.to_vec(),
            mac: envelope.mac.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contact_discovery_json() {
        let body = RequestBody::ContactDiscovery(ContactDiscoveryRequest {
            request_id: b"id".to_vec(),
            address_count: 3,
            data: vec![1, 2, 3],
            iv: vec![0; 12],
            mac: vec![0xff; 16],
        });
        let value: serde_json::Value = serde_json::from_slice(&body.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "requestId": "aWQ=",
                "addressCount": 3,
                "data": "AQID",
                "iv": "AAAAAAAAAAAAAAAA",
                "mac": "/////////////////////w==",
            })
        );
    }

    #[test]
    fn key_backup_json_has_no_address_count() {
        let body = RequestBody::KeyBackup(KeyBackupRequest {
            request_id: b"id".to_vec(),
            data: vec![1],
            iv: vec![0; 12],
            mac: vec![0; 16],
        });
        let value: serde_json::Value = serde_json::from_slice(&body.to_json().unwrap()).unwrap();
        assert!(value.get("addressCount").is_none());
        assert_eq!(value["requestId"], "aWQ=");
    }

    #[test]
    fn response_from_json() {
        let response: EnclaveResponse =
            serde_json::from_str(r#"{"iv":"AAAAAAAAAAAAAAAA","data":"AQID","mac":"AA=="}"#)
                .unwrap();
        assert_eq!(response.iv, vec![0; 12]);
        assert_eq!(response.ciphertext, vec![1, 2, 3]);
        assert_eq!(response.mac, vec![0]);
    }

    #[test]
    fn token_from_json() {
        let token: EnclaveToken =
            serde_json::from_str(r#"{"backupId":"AQI=","token":"/w==","tries":10}"#).unwrap();
        assert_eq!(token.backup_id, vec![1, 2]);
        assert_eq!(token.token, vec![0xff]);
        assert_eq!(token.tries, 10);
    }

    #[test]
    fn feedback_json() {
        let feedback = DiscoveryFeedback {
            status: FeedbackStatus::AttestationError,
            reason: None,
        };
        assert_eq!(
            serde_json::to_value(&feedback).unwrap(),
            json!({ "status": "attestation-error" })
        );
        let feedback = DiscoveryFeedback {
            status: FeedbackStatus::Ok,
            reason: Some("fine".into()),
        };
        assert_eq!(
            serde_json::to_value(&feedback).unwrap(),
            json!({ "status": "ok", "reason": "fine" })
        );
    }

    #[test]
    fn feedback_status_for_result() {
        use crate::error::{AttestationError, Error, NetworkError};
        assert_eq!(FeedbackStatus::for_result(&Ok(())), FeedbackStatus::Ok);
        assert_eq!(
            FeedbackStatus::for_result::<()>(&Err(Error::Attestation(
                AttestationError::ReportDataMismatch
            ))),
            FeedbackStatus::AttestationError
        );
        assert_eq!(
            FeedbackStatus::for_result::<()>(&Err(Error::Network(NetworkError::Timeout))),
            FeedbackStatus::UnexpectedError
        );
    }
}
