// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2026 Matter Labs

//! Certificate chain and detached signature verification

use crate::error::AttestationError;
use const_oid::db::rfc5912::{
    ECDSA_WITH_SHA_256, ID_EC_PUBLIC_KEY, RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION,
};
use p256::pkcs8::DecodePublicKey;
use sha2::Sha256;
use signature::Verifier;
use std::time::SystemTime;
use tracing::{debug, trace};
use x509_cert::{
    der::{DecodePem, Encode},
    ext::pkix::{BasicConstraints, KeyUsage},
    spki::{ObjectIdentifier, SubjectPublicKeyInfoOwned},
    Certificate,
};

fn invalid(msg: impl ToString) -> AttestationError {
    AttestationError::SignatureInvalid(msg.to_string())
}

/// The attestation authority's root certificate
#[derive(Debug, Clone)]
pub struct TrustAnchor {
    root: Certificate,
    root_der: Vec<u8>,
}

impl TrustAnchor {
    /// Load a self-signed root certificate from PEM
    pub fn from_pem(pem: impl AsRef<[u8]>) -> Result<Self, AttestationError> {
        let root = Certificate::from_pem(pem.as_ref()).map_err(invalid)?;
        Self::new(root)
    }

    /// Use `root` as trust anchor, which must be self-signed
    pub fn new(root: Certificate) -> Result<Self, AttestationError> {
        verify_issued_by(&root, &root)
            .map_err(|e| invalid(format!("trusted root is not self-signed: {e}")))?;
        check_ca(&root, 0)?;
        let root_der = root.to_der().map_err(invalid)?;
        Ok(Self { root, root_der })
    }

    /// The root certificate
    pub fn certificate(&self) -> &Certificate {
        &self.root
    }

    /// Verify `chain` (leaf first) up to this root at time `now` and return the leaf.
    ///
    /// The chain may end with the root itself or with a certificate issued by it.
    pub fn verify_chain<'a>(
        &self,
        chain: &'a [Certificate],
        now: SystemTime,
    ) -> Result<&'a Certificate, AttestationError> {
        let leaf = chain.first().ok_or_else(|| invalid("empty certificate chain"))?;

        check_validity(&self.root, now)?;
        for cert in chain {
            check_validity(cert, now)?;
        }
        for (depth, pair) in chain.windows(2).enumerate() {
            check_ca(&pair[1], depth)?;
            verify_issued_by(&pair[0], &pair[1])?;
        }

        let last = &chain[chain.len() - 1];
        if last.to_der().map_err(invalid)? != self.root_der {
            check_ca(&self.root, chain.len() - 1)?;
            verify_issued_by(last, &self.root)?;
        }
        debug!(len = chain.len(), "certificate chain verified");
        Ok(leaf)
    }
}

/// Parse a PEM bundle into certificates
pub fn parse_chain_pem(pem: impl AsRef<[u8]>) -> Result<Vec<Certificate>, AttestationError> {
    Certificate::load_pem_chain(pem.as_ref()).map_err(invalid)
}

fn check_validity(cert: &Certificate, now: SystemTime) -> Result<(), AttestationError> {
    let validity = &cert.tbs_certificate.validity;
    if now < validity.not_before.to_system_time() {
        return Err(invalid(format!(
            "certificate `{}` not yet valid",
            cert.tbs_certificate.subject
        )));
    }
    if now > validity.not_after.to_system_time() {
        return Err(invalid(format!(
            "certificate `{}` expired",
            cert.tbs_certificate.subject
        )));
    }
    Ok(())
}

/// `issuer` must be a CA allowed to have `intermediates` CA certificates below it.
fn check_ca(issuer: &Certificate, intermediates: usize) -> Result<(), AttestationError> {
    let tbs = &issuer.tbs_certificate;
    match tbs.get::<BasicConstraints>().map_err(invalid)? {
        Some((_, BasicConstraints { ca: true, path_len_constraint })) => {
            if let Some(max) = path_len_constraint {
                if intermediates > usize::from(max) {
                    return Err(invalid(format!(
                        "path length constraint of `{}` exceeded",
                        tbs.subject
                    )));
                }
            }
        }
        _ => {
            return Err(invalid(format!(
                "certificate `{}` is not a CA",
                tbs.subject
            )))
        }
    }
    if let Some((_, usage)) = tbs.get::<KeyUsage>().map_err(invalid)? {
        if !usage.key_cert_sign() {
            return Err(invalid(format!(
                "certificate `{}` may not sign certificates",
                tbs.subject
            )));
        }
    }
    Ok(())
}

fn verify_issued_by(cert: &Certificate, issuer: &Certificate) -> Result<(), AttestationError> {
    if cert.tbs_certificate.issuer != issuer.tbs_certificate.subject {
        return Err(invalid(format!(
            "certificate `{}` not issued by `{}`",
            cert.tbs_certificate.subject, issuer.tbs_certificate.subject
        )));
    }
    let tbs = cert.tbs_certificate.to_der().map_err(invalid)?;
    let signature = cert
        .signature
        .as_bytes()
        .ok_or_else(|| invalid("certificate signature has unused bits"))?;
    verify_with(
        &issuer.tbs_certificate.subject_public_key_info,
        cert.signature_algorithm.oid,
        &tbs,
        signature,
    )
}

/// Verify a detached SHA-256 signature over `message` with the key of `cert`.
///
/// ECDSA P-256 keys take DER encoded signatures, RSA keys PKCS#1 v1.5.
pub fn verify_detached(
    cert: &Certificate,
    message: &[u8],
    signature: &[u8],
) -> Result<(), AttestationError> {
    let spki = &cert.tbs_certificate.subject_public_key_info;
    let algorithm = if spki.algorithm.oid == ID_EC_PUBLIC_KEY {
        ECDSA_WITH_SHA_256
    } else if spki.algorithm.oid == RSA_ENCRYPTION {
        SHA_256_WITH_RSA_ENCRYPTION
    } else {
        return Err(invalid(format!(
            "unsupported key algorithm {}",
            spki.algorithm.oid
        )));
    };
    verify_with(spki, algorithm, message, signature)
}

fn verify_with(
    spki: &SubjectPublicKeyInfoOwned,
    algorithm: ObjectIdentifier,
    message: &[u8],
    signature: &[u8],
) -> Result<(), AttestationError> {
    trace!(%algorithm, "verifying signature");
    let spki_der = spki.to_der().map_err(invalid)?;
    if algorithm == ECDSA_WITH_SHA_256 {
        let key = p256::ecdsa::VerifyingKey::from_public_key_der(&spki_der).map_err(invalid)?;
        let signature = p256::ecdsa::Signature::from_der(signature).map_err(invalid)?;
        key.verify(message, &signature).map_err(invalid)
    } else if algorithm == SHA_256_WITH_RSA_ENCRYPTION {
        let key = rsa::RsaPublicKey::from_public_key_der(&spki_der).map_err(invalid)?;
        let signature = rsa::pkcs1v15::Signature::try_from(signature).map_err(invalid)?;
        rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key)
            .verify(message, &signature)
            .map_err(invalid)
    } else {
        Err(invalid(format!("unsupported signature algorithm {algorithm}")))
    }
}
