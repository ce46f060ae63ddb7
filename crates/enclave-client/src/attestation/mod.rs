// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Verify that a quote comes from the expected enclave and binds the
//! server's ephemeral key

pub mod chain;
pub mod reportdata;

use self::{chain::TrustAnchor, reportdata::KeyBinding};
use crate::error::AttestationError;
use crate::quote::Quote;
use crate::registry::EnclaveDescriptor;
use p256::PublicKey;
use std::time::{Duration, SystemTime};
use tracing::{error, info};
use x509_cert::Certificate;

/// Accepted age of an attestation timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    /// oldest accepted attestation
    pub max_age: Duration,
    /// how far in the future a timestamp may be
    pub max_clock_skew: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            max_clock_skew: Duration::from_secs(5 * 60),
        }
    }
}

/// The signature bundle the transport delivers with a quote
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    /// certificate chain, leaf first
    pub cert_chain: &'a [Certificate],
    /// detached signature of the leaf over the quote header
    pub signature: &'a [u8],
    /// when the attestation service vouched for the quote, if known
    pub attested_at: Option<SystemTime>,
}

/// A quote that passed every check, ready for key agreement
#[derive(Debug, Clone)]
pub struct AttestationProof {
    enclave_name: String,
    server_public_key: PublicKey,
    server_public_key_bytes: Vec<u8>,
    quote_digest: [u8; 32],
}

impl AttestationProof {
    /// The attested enclave
    pub fn enclave_name(&self) -> &str {
        &self.enclave_name
    }

    /// The server ephemeral key the quote binds
    pub fn server_public_key(&self) -> &PublicKey {
        &self.server_public_key
    }

    /// The server ephemeral key as it was attested
    pub fn server_public_key_bytes(&self) -> &[u8] {
        &self.server_public_key_bytes
    }

    /// SHA-256 of the attested quote header
    pub fn quote_digest(&self) -> &[u8; 32] {
        &self.quote_digest
    }
}

/// Checks quotes against an [`EnclaveDescriptor`] and a trust anchor
#[derive(Debug, Clone)]
pub struct AttestationValidator {
    anchor: TrustAnchor,
    freshness: FreshnessPolicy,
}

impl AttestationValidator {
    /// Create a validator trusting `anchor`
    pub fn new(anchor: TrustAnchor, freshness: FreshnessPolicy) -> Self {
        Self { anchor, freshness }
    }

    /// Validate `quote` for `descriptor`, binding it to `server_public_key`.
    ///
    /// The checks run in a fixed order and stop at the first failure:
    /// identity, debug mode, signature chain, key binding, freshness.
    /// Every failure is logged as a security event.
    pub fn validate(
        &self,
        quote: &Quote,
        descriptor: &EnclaveDescriptor,
        server_public_key: &[u8],
        evidence: &Evidence<'_>,
        now: SystemTime,
    ) -> Result<AttestationProof, AttestationError> {
        self.check(quote, descriptor, server_public_key, evidence, now)
            .map_err(|e| {
                error!(
                    target: "security",
                    enclave = %descriptor.name,
                    mrenclave = %hex::encode(quote.mrenclave),
                    "enclave attestation rejected: {e}"
                );
                e
            })
    }

    fn check(
        &self,
        quote: &Quote,
        descriptor: &EnclaveDescriptor,
        server_public_key: &[u8],
        evidence: &Evidence<'_>,
        now: SystemTime,
    ) -> Result<AttestationProof, AttestationError> {
        if quote.mrenclave != descriptor.mrenclave {
            return Err(AttestationError::MrenclaveMismatch {
                field: "mrenclave",
                got: hex::encode(quote.mrenclave),
                expected: hex::encode(descriptor.mrenclave),
            });
        }
        if let Some(mrsigner) = descriptor.mrsigner {
            if quote.mrsigner != mrsigner {
                return Err(AttestationError::MrenclaveMismatch {
                    field: "mrsigner",
                    got: hex::encode(quote.mrsigner),
                    expected: hex::encode(mrsigner),
                });
            }
        }

        if quote.is_debug_quote() && !descriptor.allow_debug {
            return Err(AttestationError::DebugQuoteRejected(descriptor.name.clone()));
        }

        let leaf = self.anchor.verify_chain(evidence.cert_chain, now)?;
        let header = quote.header_bytes();
        chain::verify_detached(leaf, &header, evidence.signature)?;

        if !KeyBinding::for_key(server_public_key).matches(&quote.report_data) {
            return Err(AttestationError::ReportDataMismatch);
        }
        let parsed_key = PublicKey::from_sec1_bytes(server_public_key)
            .map_err(|_| AttestationError::ReportDataMismatch)?;

        if let Some(attested_at) = evidence.attested_at {
            self.check_freshness(attested_at, now)?;
        }

        info!(enclave = %descriptor.name, "enclave attested");
        Ok(AttestationProof {
            enclave_name: descriptor.name.clone(),
            server_public_key: parsed_key,
            server_public_key_bytes: server_public_key.to_vec(),
            quote_digest: quote.digest(),
        })
    }

    fn check_freshness(
        &self,
        attested_at: SystemTime,
        now: SystemTime,
    ) -> Result<(), AttestationError> {
        match now.duration_since(attested_at) {
            Ok(age) if age > self.freshness.max_age => Err(AttestationError::StaleAttestation(
                format!("attested {}s ago", age.as_secs()),
            )),
            Ok(_) => Ok(()),
            Err(e) if e.duration() > self.freshness.max_clock_skew => {
                Err(AttestationError::StaleAttestation(format!(
                    "attested {}s in the future",
                    e.duration().as_secs()
                )))
            }
            Err(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ServiceKind;
    use crate::test_support::{server_key, test_quote, TestPki};
    use tracing_test::traced_test;

    struct Fixture {
        pki: TestPki,
        validator: AttestationValidator,
        chain: Vec<Certificate>,
        descriptor: EnclaveDescriptor,
        server_key: Vec<u8>,
    }

    impl Fixture {
        fn new() -> Self {
            let pki = TestPki::new("Attestation Root");
            let validator = AttestationValidator::new(pki.anchor(), FreshnessPolicy::default());
            let chain = pki.chain();
            Self {
                pki,
                validator,
                chain,
                descriptor: EnclaveDescriptor {
                    name: "cds".into(),
                    service: ServiceKind::ContactDiscovery,
                    mrenclave: [0xaa; 32],
                    mrsigner: None,
                    allow_debug: false,
                },
                server_key: server_key(),
            }
        }

        fn quote(&self) -> Quote {
            test_quote([0xaa; 32], &self.server_key)
        }

        fn validate_signed(&self, quote: &Quote) -> Result<AttestationProof, AttestationError> {
            let signature = self.pki.sign(&quote.header_bytes());
            self.validate_with(quote, &signature, None)
        }

        fn validate_with(
            &self,
            quote: &Quote,
            signature: &[u8],
            attested_at: Option<SystemTime>,
        ) -> Result<AttestationProof, AttestationError> {
            let evidence = Evidence {
                cert_chain: &self.chain,
                signature,
                attested_at,
            };
            self.validator.validate(
                quote,
                &self.descriptor,
                &self.server_key,
                &evidence,
                SystemTime::now(),
            )
        }
    }

    #[test]
    fn valid_quote() {
        let fixture = Fixture::new();
        let quote = fixture.quote();
        let proof = fixture.validate_signed(&quote).unwrap();
        assert_eq!(proof.enclave_name(), "cds");
        assert_eq!(proof.server_public_key_bytes(), fixture.server_key.as_slice());
        assert_eq!(proof.quote_digest(), &quote.digest());
    }

    #[test]
    fn other_enclave_rejected_despite_valid_signature() {
        let fixture = Fixture::new();
        let quote = test_quote([0xbb; 32], &fixture.server_key);
        assert!(matches!(
            fixture.validate_signed(&quote),
            Err(AttestationError::MrenclaveMismatch {
                field: "mrenclave",
                ..
            })
        ));
        assert!(matches!(
            fixture.validate_with(&quote, b"garbage", None),
            Err(AttestationError::MrenclaveMismatch { .. })
        ));
    }

    #[test]
    fn pinned_mrsigner() {
        let mut fixture = Fixture::new();
        let quote = fixture.quote();
        fixture.descriptor.mrsigner = Some(quote.mrsigner);
        assert!(fixture.validate_signed(&quote).is_ok());
        fixture.descriptor.mrsigner = Some([0x01; 32]);
        assert!(matches!(
            fixture.validate_signed(&quote),
            Err(AttestationError::MrenclaveMismatch {
                field: "mrsigner",
                ..
            })
        ));
    }

    #[test]
    fn debug_quote_rejected() {
        let mut fixture = Fixture::new();
        let mut quote = fixture.quote();
        quote.flags |= crate::quote::DEBUG_FLAG;
        assert_eq!(
            fixture.validate_signed(&quote).unwrap_err(),
            AttestationError::DebugQuoteRejected("cds".into())
        );
        fixture.descriptor.allow_debug = true;
        assert!(fixture.validate_signed(&quote).is_ok());
    }

    #[test]
    fn signature_over_other_quote() {
        let fixture = Fixture::new();
        let quote = fixture.quote();
        let mut other = quote.clone();
        other.isv_svn += 1;
        let signature = fixture.pki.sign(&other.header_bytes());
        assert!(matches!(
            fixture.validate_with(&quote, &signature, None),
            Err(AttestationError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn untrusted_chain() {
        let mut fixture = Fixture::new();
        let impostor = TestPki::new("Attestation Root");
        fixture.chain = impostor.chain();
        let quote = fixture.quote();
        let signature = impostor.sign(&quote.header_bytes());
        assert!(matches!(
            fixture.validate_with(&quote, &signature, None),
            Err(AttestationError::SignatureInvalid(_))
        ));
    }

    #[test]
    fn quote_bound_to_other_key() {
        let fixture = Fixture::new();
        let quote = test_quote([0xaa; 32], &server_key());
        assert_eq!(
            fixture.validate_signed(&quote).unwrap_err(),
            AttestationError::ReportDataMismatch
        );
    }

    #[test]
    fn bound_key_must_be_a_point() {
        let mut fixture = Fixture::new();
        fixture.server_key = vec![0x04; 65];
        let quote = fixture.quote();
        assert_eq!(
            fixture.validate_signed(&quote).unwrap_err(),
            AttestationError::ReportDataMismatch
        );
    }

    #[test]
    fn freshness_window() {
        let fixture = Fixture::new();
        let quote = fixture.quote();
        let signature = fixture.pki.sign(&quote.header_bytes());
        let now = SystemTime::now();

        let recent = now - Duration::from_secs(60);
        assert!(fixture.validate_with(&quote, &signature, Some(recent)).is_ok());

        let old = now - Duration::from_secs(2 * 24 * 60 * 60);
        assert!(matches!(
            fixture.validate_with(&quote, &signature, Some(old)),
            Err(AttestationError::StaleAttestation(_))
        ));

        let future = now + Duration::from_secs(60 * 60);
        assert!(matches!(
            fixture.validate_with(&quote, &signature, Some(future)),
            Err(AttestationError::StaleAttestation(_))
        ));
    }

    #[test]
    #[traced_test]
    fn rejection_is_logged() {
        let fixture = Fixture::new();
        let mut quote = fixture.quote();
        quote.flags |= crate::quote::DEBUG_FLAG;
        assert!(fixture.validate_signed(&quote).is_err());
        assert!(logs_contain("enclave attestation rejected"));
    }
}
